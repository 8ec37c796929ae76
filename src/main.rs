#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ten_harness::cli::run_cli().await
}
