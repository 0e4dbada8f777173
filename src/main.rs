//! Aegis CLI entry point.

use aegis_lib::cli::{self, Cli};
use aegis_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
