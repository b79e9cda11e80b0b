//! Route table
//!
//! Three groups: public, bearer-required, and bearer-optional (guests get no
//! `Ctx`). The auth middleware is attached with `route_layer` per group.

use crate::auth::middleware::{mw_optional_auth, mw_require_auth};
use crate::config::AppState;
use crate::handlers::{auth, graph, posts, profile};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/health", get(health_check));

    let protected = Router::new()
        .route("/follow", post(graph::toggle_follow))
        .route("/users/{user_id}/followers", get(graph::followers))
        .route("/users/{user_id}/following", get(graph::following))
        .route("/users/{user_id}/follow-counts", get(graph::follow_counts))
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{post_id}/comments",
            get(posts::comments)
                .post(posts::create_comment)
                .put(posts::update_comment),
        )
        .route("/newsfeed", get(posts::newsfeed))
        .route("/{post_id}/like", post(graph::toggle_like))
        .route(
            "/profile",
            get(profile::get_profile)
                .post(profile::create_profile)
                .put(profile::update_profile),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), mw_require_auth));

    let guest_friendly = Router::new()
        .route("/{post_id}/likers", get(graph::likers))
        .route_layer(middleware::from_fn_with_state(state.clone(), mw_optional_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(guest_friendly)
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK - Social Server"
}
