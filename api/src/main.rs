#[tokio::main]
async fn main() -> anyhow::Result<()> {
    what2play_api::run().await
}
