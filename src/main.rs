use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    penny::run().await
}
