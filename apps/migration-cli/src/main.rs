use clap::{Parser, ValueEnum};
use db_infra::config::db::{DbKind, RuntimeEnv};
use db_infra::infra::db::orchestrate_migration;
use migration::MigrationCommand;

#[derive(Clone, Copy, ValueEnum)]
enum Command {
    Up,
    Down,
    Fresh,
    Reset,
    Refresh,
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Env {
    Prod,
    Test,
}

/// In-memory sqlite is not offered: the database would vanish with the process.
#[derive(Clone, Copy, ValueEnum)]
enum Db {
    Postgres,
    SqliteFile,
}

#[derive(Parser)]
#[command(name = "migration-cli")]
#[command(about = "Arena database migration tool")]
struct Args {
    #[arg(value_enum)]
    command: Command,

    /// Runtime environment
    #[arg(short, long, value_enum, default_value = "test")]
    env: Env,

    /// Database type
    #[arg(short, long, value_enum, default_value = "postgres")]
    db: Db,
}

impl From<Command> for MigrationCommand {
    fn from(c: Command) -> Self {
        match c {
            Command::Up => MigrationCommand::Up,
            Command::Down => MigrationCommand::Down,
            Command::Fresh => MigrationCommand::Fresh,
            Command::Reset => MigrationCommand::Reset,
            Command::Refresh => MigrationCommand::Refresh,
            Command::Status => MigrationCommand::Status,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .without_time()
        .with_target(false)
        .with_env_filter("migration=info,db_infra=info,sqlx=warn")
        .init();

    let args = Args::parse();

    let env = match args.env {
        Env::Prod => RuntimeEnv::Prod,
        Env::Test => RuntimeEnv::Test,
    };
    let db_kind = match args.db {
        Db::Postgres => DbKind::Postgres,
        Db::SqliteFile => DbKind::SqliteFile,
    };

    if let Err(e) = orchestrate_migration(env, db_kind, args.command.into()).await {
        eprintln!("Migration failed: {e}");
        std::process::exit(1);
    }
}
