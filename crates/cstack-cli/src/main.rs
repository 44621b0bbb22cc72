//! `cstack` operator tool

mod cli;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    cli.init_tracing();
    cli.run(&mut std::io::stdout().lock()).await
}
