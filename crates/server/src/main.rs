#[tokio::main]
async fn main() -> anyhow::Result<()> {
    social_server::run().await
}
