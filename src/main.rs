use anyhow::Result;
use ccooler::cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    ccooler::logging::init(cli.verbose, cli.quiet);
    cli.run()
}
