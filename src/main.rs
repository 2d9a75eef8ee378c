use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    formflow_cli::cli::app::run().await
}
