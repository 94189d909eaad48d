use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "splitledger")]
#[command(about = "Track shared expenses and balances inside groups")]
pub struct Cli {
    /// Database connection string; overrides the `database` setting.
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    User(User),
    Group(Group),
    Expense(Expense),
    /// Net balance of every member of a group.
    Balances { group_id: Uuid },
    /// Re-verify the zero-sum invariant of every expense in a group.
    Check { group_id: Uuid },
}

#[derive(Args, Debug)]
pub struct User {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    Create {
        #[arg(long)]
        name: String,
    },
    Show {
        user_id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct Group {
    #[command(subcommand)]
    pub command: GroupCommand,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    Create {
        #[arg(long)]
        name: String,
        /// Initial member; repeat for several.
        #[arg(long = "member")]
        members: Vec<Uuid>,
    },
    AddMember {
        group_id: Uuid,
        user_id: Uuid,
    },
    Members {
        group_id: Uuid,
    },
    Show {
        group_id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct Expense {
    #[command(subcommand)]
    pub command: ExpenseCommand,
}

#[derive(Subcommand, Debug)]
pub enum ExpenseCommand {
    Record(RecordArgs),
    List { group_id: Uuid },
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    #[arg(long)]
    pub group: Uuid,
    #[arg(long)]
    pub payer: Uuid,
    /// Decimal amount, e.g. `100` or `12.50`.
    #[arg(long)]
    pub amount: String,
    #[arg(long)]
    pub description: String,
    /// `equal` or `percentage`.
    #[arg(long, default_value = "equal")]
    pub split: String,
    /// `<USER_ID>=<PERCENT>`, required for percentage splits.
    #[arg(long = "share", value_parser = parse_share)]
    pub shares: Vec<(Uuid, f64)>,
}

fn parse_share(raw: &str) -> Result<(Uuid, f64), String> {
    let (user, percent) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <USER_ID>=<PERCENT>, got {raw}"))?;
    let user = Uuid::parse_str(user.trim()).map_err(|err| format!("invalid user id: {err}"))?;
    let percent = percent
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|err| format!("invalid percentage: {err}"))?;
    Ok((user, percent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_pairs() {
        let id = Uuid::new_v4();
        assert_eq!(parse_share(&format!("{id}=60")).unwrap(), (id, 60.0));
        assert_eq!(parse_share(&format!("{id} = 12.5%")).unwrap(), (id, 12.5));
        assert!(parse_share("60").is_err());
        assert!(parse_share(&format!("{id}=lots")).is_err());
    }

    #[test]
    fn record_command_parses() {
        let group = Uuid::new_v4();
        let payer = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "splitledger",
            "expense",
            "record",
            "--group",
            &group.to_string(),
            "--payer",
            &payer.to_string(),
            "--amount",
            "50.00",
            "--description",
            "dinner",
            "--split",
            "percentage",
            "--share",
            &format!("{payer}=100"),
        ])
        .unwrap();
        let Command::Expense(Expense {
            command: ExpenseCommand::Record(args),
        }) = cli.command
        else {
            panic!("expected expense record");
        };
        assert_eq!(args.group, group);
        assert_eq!(args.shares, vec![(payer, 100.0)]);
    }
}
