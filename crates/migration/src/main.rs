use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;

#[derive(Parser, Debug)]
#[command(name = "migration")]
#[command(about = "Apply or roll back the splitledger schema")]
struct Cli {
    /// Database connection string.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./splitledger.db?mode=rwc"
    )]
    database_url: String,

    /// Defaults to `up` when omitted.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Apply pending migrations.
    Up {
        /// Apply at most this many migrations.
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations (the last one by default).
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Drop every table and re-apply all migrations.
    Fresh,
    /// List migrations and whether they are applied.
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter("sea_orm_migration=info,migration=info")
        .with_writer(std::io::stderr)
        .init();

    let db = Database::connect(&cli.database_url).await?;
    let command = cli.command.unwrap_or(Command::Up { steps: None });
    tracing::info!(?command, "running migration command");

    match command {
        Command::Up { steps } => Migrator::up(&db, steps).await?,
        Command::Down { steps } => Migrator::down(&db, Some(steps)).await?,
        Command::Fresh => Migrator::fresh(&db).await?,
        Command::Status => Migrator::status(&db).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_defaults_to_up() {
        let cli = Cli::try_parse_from(["migration", "--database-url", "sqlite::memory:"]).unwrap();
        assert_eq!(cli.database_url, "sqlite::memory:");
        assert_eq!(cli.command, None);
    }

    #[test]
    fn down_takes_a_step_count() {
        let cli = Cli::try_parse_from(["migration", "down", "--steps", "2"]).unwrap();
        assert_eq!(cli.command, Some(Command::Down { steps: 2 }));

        let cli = Cli::try_parse_from(["migration", "down"]).unwrap();
        assert_eq!(cli.command, Some(Command::Down { steps: 1 }));

        assert!(Cli::try_parse_from(["migration", "sideways"]).is_err());
    }
}
