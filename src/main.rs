#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rhetor::app::run().await
}
