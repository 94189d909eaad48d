use std::{collections::HashMap, process::ExitCode};

use clap::Parser;
use engine::{Engine, EngineError, Money, RecordExpenseCmd, SplitPolicy};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use uuid::Uuid;

use cli::{Cli, Command, ExpenseCommand, GroupCommand, UserCommand};

mod cli;
mod settings;

type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Exit status for errors caused by the caller's input.
const EXIT_CLIENT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match settings::Settings::new() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("invalid settings: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "splitledger={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    let engine = match connect(&url).await {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!("failed to initialize database: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&engine, cli.command, cli.json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            exit_code(err.as_ref())
        }
    }
}

/// Client errors exit with [`EXIT_CLIENT`], everything else with 1.
fn exit_code(err: &(dyn std::error::Error + Send + Sync + 'static)) -> ExitCode {
    match err.downcast_ref::<EngineError>() {
        Some(err) if err.is_client_error() => ExitCode::from(EXIT_CLIENT),
        _ => ExitCode::FAILURE,
    }
}

async fn connect(url: &str) -> AppResult<Engine> {
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(Engine::builder().database(database).build().await?)
}

async fn run(engine: &Engine, command: Command, json: bool) -> AppResult<()> {
    match command {
        Command::User(user) => match user.command {
            UserCommand::Create { name } => {
                let user = engine.add_user(&name).await?;
                emit(json, &user, || format!("{}\t{}", user.id, user.name))
            }
            UserCommand::Show { user_id } => {
                let user = engine.user(user_id).await?;
                emit(json, &user, || format!("{}\t{}", user.id, user.name))
            }
        },
        Command::Group(group) => match group.command {
            GroupCommand::Create { name, members } => {
                let group = engine.create_group(&name, &members).await?;
                emit(json, &group, || format!("{}\t{}", group.id, group.name))
            }
            GroupCommand::AddMember { group_id, user_id } => {
                let membership = engine.add_member(group_id, user_id).await?;
                emit(json, &membership, || {
                    format!(
                        "{}\t{}\t{}",
                        membership.group_id,
                        membership.user_id,
                        membership.role.as_str()
                    )
                })
            }
            GroupCommand::Members { group_id } => {
                let mut members: Vec<Uuid> = engine.members_of(group_id).await?.into_iter().collect();
                members.sort();
                emit(json, &members, || {
                    members
                        .iter()
                        .map(Uuid::to_string)
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            GroupCommand::Show { group_id } => {
                let group = engine.group(group_id).await?;
                let memberships = engine.memberships(group_id).await?;
                let view = serde_json::json!({ "group": group, "memberships": memberships });
                emit(json, &view, || {
                    let mut lines = vec![format!("{}\t{}", group.id, group.name)];
                    lines.extend(
                        memberships
                            .iter()
                            .map(|m| format!("  {}\t{}", m.user_id, m.role.as_str())),
                    );
                    lines.join("\n")
                })
            }
        },
        Command::Expense(expense) => match expense.command {
            ExpenseCommand::Record(args) => {
                let amount: Money = args.amount.parse()?;
                let shares = (!args.shares.is_empty()).then_some(args.shares);
                let policy = SplitPolicy::from_parts(&args.split, shares)?;
                let cmd = RecordExpenseCmd::new(args.group, args.payer, amount, args.description)
                    .policy(policy);
                let expense = engine.record_expense(cmd).await?;
                emit(json, &expense, || {
                    let mut lines = vec![format!(
                        "{}\t{}\t{}",
                        expense.id, expense.amount, expense.description
                    )];
                    lines.extend(expense.splits.iter().map(|entry| {
                        format!("  {}\t{}\t{}", entry.user_id, entry.amount, entry.kind.as_str())
                    }));
                    lines.join("\n")
                })
            }
            ExpenseCommand::List { group_id } => {
                let expenses = engine.expenses_for_group(group_id).await?;
                emit(json, &expenses, || {
                    expenses
                        .iter()
                        .map(|e| {
                            format!(
                                "{}\t{}\t{}\t{}\t{}",
                                e.created_at.to_rfc3339(),
                                e.id,
                                e.amount,
                                e.policy.as_str(),
                                e.description
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
        },
        Command::Balances { group_id } => {
            let balances = engine.balances(group_id).await?;
            let names: HashMap<Uuid, String> = engine
                .members(group_id)
                .await?
                .into_iter()
                .map(|user| (user.id, user.name))
                .collect();
            let mut rows: Vec<(Uuid, Money)> = balances.into_iter().collect();
            rows.sort_by_key(|(user_id, _)| *user_id);
            emit(json, &rows, || {
                rows.iter()
                    .map(|(user_id, balance)| {
                        let name = names.get(user_id).map(String::as_str).unwrap_or("?");
                        format!("{user_id}\t{name}\t{balance}")
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Check { group_id } => {
            engine.check_group_ledger(group_id).await?;
            emit(json, &serde_json::json!({ "ok": true }), || "ok".to_string())
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_get_their_own_exit_code() {
        let not_found: Box<dyn std::error::Error + Send + Sync> =
            Box::new(EngineError::NotFound("group".to_string()));
        assert_eq!(exit_code(not_found.as_ref()), ExitCode::from(EXIT_CLIENT));

        let defect: Box<dyn std::error::Error + Send + Sync> =
            Box::new(EngineError::Invariant("sum".to_string()));
        assert_eq!(exit_code(defect.as_ref()), ExitCode::FAILURE);

        let io: Box<dyn std::error::Error + Send + Sync> = "broken pipe".into();
        assert_eq!(exit_code(io.as_ref()), ExitCode::FAILURE);
    }
}
