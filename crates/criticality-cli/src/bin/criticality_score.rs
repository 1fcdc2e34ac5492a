use anyhow::Result;
use clap::Parser;
use criticality_cli::{init_tracing, run, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli)
}
