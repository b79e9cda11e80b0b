//! User profiles: one row per user, joined into follower and liker lists.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile not found")]
    NotFound,
    #[error("User profile already exists")]
    AlreadyExists,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "id")]
    pub profile_id: String,
    pub user_id: String,
    pub firstname: String,
    pub lastname: String,
    pub gender: i64,
    pub avatar_url: String,
    pub address: String,
    pub email: String,
    #[serde(rename = "phone")]
    pub phone_number: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub firstname: String,
    pub lastname: String,
    pub gender: i64,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub address: String,
    pub email: String,
    #[serde(default, rename = "phone")]
    pub phone_number: String,
}

/// Empty strings and a missing gender leave the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    pub gender: Option<i64>,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "phone")]
    pub phone_number: String,
}

fn check_gender(gender: i64) -> Result<(), ProfileError> {
    if (0..=2).contains(&gender) {
        Ok(())
    } else {
        Err(ProfileError::InvalidInput("gender must be one of 0, 1, 2".to_string()))
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

type ProfileRow = (
    String,
    String,
    String,
    String,
    i64,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
);

const SELECT_PROFILE: &str = "SELECT profile_id, user_id, firstname, lastname, gender, avatar_url, address, email,
        phone_number, created_at, updated_at
 FROM profiles WHERE user_id = ?";

fn profile_from_row(row: ProfileRow) -> Profile {
    let (profile_id, user_id, firstname, lastname, gender, avatar_url, address, email, phone_number, created_at, updated_at) =
        row;
    Profile {
        profile_id,
        user_id,
        firstname,
        lastname,
        gender,
        avatar_url,
        address,
        email,
        phone_number,
        created_at,
        updated_at,
    }
}

pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_profile(&self, user_id: &str, new: NewProfile) -> Result<Profile, ProfileError> {
        if new.firstname.trim().is_empty() || new.lastname.trim().is_empty() {
            return Err(ProfileError::InvalidInput("firstname and lastname are required".to_string()));
        }
        if new.email.trim().is_empty() {
            return Err(ProfileError::InvalidInput("email is required".to_string()));
        }
        check_gender(new.gender)?;

        let profile = Profile {
            profile_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            firstname: new.firstname.trim().to_string(),
            lastname: new.lastname.trim().to_string(),
            gender: new.gender,
            avatar_url: new.avatar_url,
            address: new.address,
            email: new.email.trim().to_string(),
            phone_number: new.phone_number,
            created_at: Utc::now().to_rfc3339(),
            updated_at: None,
        };

        let result = sqlx::query(
            "INSERT INTO profiles (profile_id, user_id, firstname, lastname, gender, avatar_url, address,
                                   email, phone_number, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&profile.profile_id)
        .bind(&profile.user_id)
        .bind(&profile.firstname)
        .bind(&profile.lastname)
        .bind(profile.gender)
        .bind(&profile.avatar_url)
        .bind(&profile.address)
        .bind(&profile.email)
        .bind(&profile.phone_number)
        .bind(&profile.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(user_id = %user_id, profile_id = %profile.profile_id, "[Profile] Created");
                Ok(profile)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(ProfileError::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Profile, ProfileError> {
        let row: Option<ProfileRow> = sqlx::query_as(SELECT_PROFILE)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(profile_from_row).ok_or(ProfileError::NotFound)
    }

    pub async fn update_profile(&self, user_id: &str, patch: ProfilePatch) -> Result<Profile, ProfileError> {
        if let Some(gender) = patch.gender {
            check_gender(gender)?;
        }

        let result = sqlx::query(
            "UPDATE profiles SET
                firstname = COALESCE(?, firstname),
                lastname = COALESCE(?, lastname),
                gender = COALESCE(?, gender),
                avatar_url = COALESCE(?, avatar_url),
                address = COALESCE(?, address),
                email = COALESCE(?, email),
                phone_number = COALESCE(?, phone_number),
                updated_at = ?
             WHERE user_id = ?",
        )
        .bind(non_empty(&patch.firstname))
        .bind(non_empty(&patch.lastname))
        .bind(patch.gender)
        .bind(non_empty(&patch.avatar_url))
        .bind(non_empty(&patch.address))
        .bind(non_empty(&patch.email))
        .bind(non_empty(&patch.phone_number))
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ProfileError::NotFound);
        }

        info!(user_id = %user_id, "[Profile] Updated");
        self.get_profile(user_id).await
    }
}
