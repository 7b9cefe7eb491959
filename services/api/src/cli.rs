use crate::server;
use clap::{Args, Parser, Subcommand};
use school_records::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "School Records",
    about = "Serve and maintain the school secretariat records core",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Apply pending schema migrations and exit
    Migrate(MigrateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured SQLite database path (`:memory:` for a scratch database)
    #[arg(long)]
    pub(crate) database: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct MigrateArgs {
    /// Override the configured SQLite database path
    #[arg(long)]
    pub(crate) database: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Migrate(args) => server::migrate(args),
    }
}
