//! Entry point for the `hostlink` binary.

use hostlink::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hostlink::init_logging();
    cli::run().await
}
