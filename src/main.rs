use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    stim_bridge::run().await
}
