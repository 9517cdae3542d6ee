#[tokio::main]
async fn main() -> anyhow::Result<()> {
    loopmemory::app::run().await
}
