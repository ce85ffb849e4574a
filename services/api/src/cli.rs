use crate::commands::{run_notify, run_seed_check, NotifyArgs, SeedCheckArgs};
use crate::server;
use apprenticeship::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Apprenticeship Registry",
    about = "Serve and operate the apprenticeship records backend",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and delivery worker (default command)
    Serve(ServeArgs),
    /// Inspect reference data seed files
    Seed {
        #[command(subcommand)]
        command: SeedCommand,
    },
    /// Send a one-off message through the configured notifier
    Notify(NotifyArgs),
}

#[derive(Subcommand, Debug)]
enum SeedCommand {
    /// Validate a seed file and print a summary of its contents
    Check(SeedCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Seed {
            command: SeedCommand::Check(args),
        } => run_seed_check(args),
        Command::Notify(args) => run_notify(args).await,
    }
}
