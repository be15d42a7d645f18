//! uiver CLI entry point

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use uiver::commands::{run_init, run_promote, run_watch, CommandContext};
use uiver::{Cli, Commands};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run(cli: &Cli) -> uiver::Result<String> {
    let ctx = CommandContext::from_cli(cli);
    match &cli.command {
        Commands::Init(args) => run_init(args, &ctx),
        Commands::Watch(args) => run_watch(args, &ctx),
        Commands::Promote(args) => run_promote(args, &ctx),
    }
}

/// Logs go to stderr; stdout carries command output only
fn init_tracing(verbose: bool) {
    let default = if verbose { "uiver=debug" } else { "uiver=info" };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = default.parse() {
        filter = filter.add_directive(directive);
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
