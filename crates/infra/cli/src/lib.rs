//! # Novel Admin CLI
//!
//! Runs console operations against a memory backend persisted as a JSON
//! snapshot. Every command except `user add` signs in first, so the
//! sign-in is recorded as a visit like any other console session.

mod output;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use novel_admin::{AdminConfig, AdminConsole, ConfigError, Confirmation, load_config};
use novel_admin_adapter_memory::MemoryBackend;
use novel_admin_core::error::AdminError;
use novel_admin_core::types::{Banner, Category, Credentials, Profile, Role, WithdrawalStatus, new_id};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub use output::render;

#[derive(Parser, Debug)]
#[command(
    name = "novel-admin",
    about = "Back-office console for the novel platform",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file (defaults apply if it does not exist)
    #[arg(long, short, global = true, env = "NOVEL_ADMIN_CONFIG", default_value = "novel-admin.toml")]
    pub config: PathBuf,

    /// Snapshot file, overriding `backend.snapshot_path`
    #[arg(long, global = true, env = "NOVEL_ADMIN_DATA")]
    pub data: Option<PathBuf>,

    /// Console account email
    #[arg(long, global = true, env = "NOVEL_ADMIN_EMAIL")]
    pub email: Option<String>,

    /// Console account password
    #[arg(long, global = true, env = "NOVEL_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Output as JSON
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Accounts and balances
    User {
        #[command(subcommand)]
        subcommand: UserCommand,
    },
    /// Visit statistics and platform totals
    Stats {
        #[command(subcommand)]
        subcommand: StatsCommand,
    },
    /// Book categories
    Category {
        #[command(subcommand)]
        subcommand: CategoryCommand,
    },
    /// Home page banners
    Banner {
        #[command(subcommand)]
        subcommand: BannerCommand,
    },
    /// Book chapters
    Chapters {
        #[command(subcommand)]
        subcommand: ChaptersCommand,
    },
    /// Coin transactions
    Transactions {
        #[command(subcommand)]
        subcommand: TransactionsCommand,
    },
    /// Author payout requests
    Withdrawal {
        #[command(subcommand)]
        subcommand: WithdrawalCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register an account without signing in (for seeding a fresh snapshot)
    Add {
        email: String,
        #[arg(long = "new-password")]
        new_password: String,
        #[arg(long, value_enum, default_value_t = RoleArg::User)]
        role: RoleArg,
        #[arg(long)]
        username: Option<String>,
    },
    /// List members, newest first
    List {
        /// Filter by email substring
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
    /// Add coins to (or, with a negative amount, deduct from) a balance
    Balance {
        user_id: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
        #[arg(long)]
        note: String,
    },
    /// Change a member's role
    Role {
        user_id: String,
        #[arg(value_enum)]
        role: RoleArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum StatsCommand {
    /// Daily visits and unique visitors over whole UTC days
    Visits {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Platform totals plus the visit trend ending today
    Summary {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    List,
    Add { name: String },
    Rename { id: String, name: String },
    /// Move one position towards the top
    Up { id: String },
    /// Move one position towards the bottom
    Down { id: String },
    /// Close gaps left by deletions
    Compact,
    Delete {
        id: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BannerCommand {
    List,
    Up { id: String },
    Down { id: String },
    Compact,
    /// Show or hide a banner
    Active {
        id: String,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChaptersCommand {
    /// Import chapters from a CSV file
    Import {
        #[arg(long)]
        book: String,
        file: PathBuf,
    },
    /// List chapters in reading order
    List {
        #[arg(long)]
        book: String,
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum TransactionsCommand {
    /// Export transactions as CSV
    Export {
        #[arg(long)]
        user: Option<String>,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum WithdrawalCommand {
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
    Approve { id: String },
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },
    /// Mark an approved withdrawal as paid out
    Paid { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Admin,
    Editor,
    User,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::Editor => Role::Editor,
            RoleArg::User => Role::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl From<StatusArg> for WithdrawalStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => WithdrawalStatus::Pending,
            StatusArg::Approved => WithdrawalStatus::Approved,
            StatusArg::Rejected => WithdrawalStatus::Rejected,
            StatusArg::Paid => WithdrawalStatus::Paid,
        }
    }
}

/// CLI failure.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Admin(#[from] AdminError),
    #[error("{0}")]
    Usage(String),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Admin(err) if err.is_user_error() => 2,
            _ => 1,
        }
    }
}

/// Loads the configuration file, falling back to defaults if it is absent.
pub fn load_settings(path: &Path) -> Result<AdminConfig, CliError> {
    if !path.exists() {
        return Ok(AdminConfig::default());
    }
    Ok(load_config(path)?)
}

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Runs one command and returns what to print.
///
/// The snapshot is written back after every successful command.
pub async fn run(cli: Cli, config: AdminConfig) -> Result<String, CliError> {
    let snapshot = cli
        .data
        .clone()
        .unwrap_or_else(|| config.backend.snapshot_path.clone());
    let backend = MemoryBackend::open(&snapshot)
        .await?
        .with_public_base_url(config.console.public_base_url.clone());
    tracing::debug!(snapshot = %snapshot.display(), "backend opened");

    let output = match cli.command {
        Commands::User {
            subcommand:
                UserCommand::Add {
                    email,
                    new_password,
                    role,
                    username,
                },
        } => {
            let mut profile = Profile::new(new_id(), email).with_role(role.into());
            profile.username = username;
            let profile = backend.register_user(profile, &new_password).await?;
            tracing::info!(user = %profile.id, role = ?profile.role, "account registered");
            render(cli.json, &profile, output::profile_line)?
        }
        command => {
            let credentials = match (cli.email, cli.password) {
                (Some(email), Some(password)) => Credentials::new(email, password),
                _ => {
                    return Err(CliError::Usage(
                        "--email and --password (or NOVEL_ADMIN_EMAIL and NOVEL_ADMIN_PASSWORD) are required".into(),
                    ));
                }
            };
            let console = AdminConsole::builder()
                .config(config)
                .backend(backend.clone())
                .build()
                .await?;
            console.session().sign_in(&credentials).await?;
            dispatch(&console, command, cli.json).await?
        }
    };

    backend.save_snapshot(&snapshot).await?;
    Ok(output)
}

async fn dispatch(console: &AdminConsole, command: Commands, json: bool) -> Result<String, CliError> {
    match command {
        Commands::User { subcommand } => user(console, subcommand, json).await,
        Commands::Stats { subcommand } => stats(console, subcommand, json).await,
        Commands::Category { subcommand } => category(console, subcommand, json).await,
        Commands::Banner { subcommand } => banner(console, subcommand, json).await,
        Commands::Chapters { subcommand } => chapters(console, subcommand, json).await,
        Commands::Transactions { subcommand } => transactions(console, subcommand).await,
        Commands::Withdrawal { subcommand } => withdrawal(console, subcommand, json).await,
    }
}

async fn user(console: &AdminConsole, command: UserCommand, json: bool) -> Result<String, CliError> {
    let finance = console.finance();
    match command {
        UserCommand::Add { .. } => Err(CliError::Usage("user add does not sign in".into())),
        UserCommand::List { search, page } => {
            let page = finance.list_users(search.as_deref(), page).await?;
            render(json, &page, output::profile_page)
        }
        UserCommand::Balance { user_id, amount, note } => {
            let balance = finance.adjust_balance(&user_id, amount, &note).await?;
            render(json, &serde_json::json!({ "user_id": user_id, "balance": balance }), |v| {
                format!("{} balance: {}", v["user_id"].as_str().unwrap_or_default(), v["balance"])
            })
        }
        UserCommand::Role { user_id, role } => {
            let profile = finance.set_role(&user_id, role.into()).await?;
            render(json, &profile, output::profile_line)
        }
    }
}

async fn stats(console: &AdminConsole, command: StatsCommand, json: bool) -> Result<String, CliError> {
    match command {
        StatsCommand::Visits { from, to } => {
            let buckets = console.stats().daily_visits(from, to).await?;
            render(json, &buckets, |b| output::buckets(b))
        }
        StatsCommand::Summary { days } => {
            let today = chrono::Utc::now().date_naive();
            let dashboard = console.stats().dashboard(today, days).await?;
            render(json, &dashboard, output::dashboard)
        }
    }
}

async fn category(console: &AdminConsole, command: CategoryCommand, json: bool) -> Result<String, CliError> {
    let catalog = console.catalog();
    let positions = console.positions::<Category>();
    match command {
        CategoryCommand::List => {}
        CategoryCommand::Add { name } => {
            catalog.create_category(&name).await?;
        }
        CategoryCommand::Rename { id, name } => {
            catalog.rename_category(&id, &name).await?;
        }
        CategoryCommand::Up { id } => {
            positions.move_up(&id).await?;
        }
        CategoryCommand::Down { id } => {
            positions.move_down(&id).await?;
        }
        CategoryCommand::Compact => {
            positions.compact().await?;
        }
        CategoryCommand::Delete { id, yes } => {
            catalog.delete_category(&id, Confirmation::from(yes)).await?;
        }
    }
    let categories = catalog.list_categories().await?;
    render(json, &categories, |c| output::categories(c))
}

async fn banner(console: &AdminConsole, command: BannerCommand, json: bool) -> Result<String, CliError> {
    let storefront = console.storefront();
    let positions = console.positions::<Banner>();
    match command {
        BannerCommand::List => {}
        BannerCommand::Up { id } => {
            positions.move_up(&id).await?;
        }
        BannerCommand::Down { id } => {
            positions.move_down(&id).await?;
        }
        BannerCommand::Compact => {
            positions.compact().await?;
        }
        BannerCommand::Active { id, active } => {
            storefront.set_banner_active(&id, active).await?;
        }
    }
    let banners = storefront.list_banners().await?;
    render(json, &banners, |b| output::banners(b))
}

async fn chapters(console: &AdminConsole, command: ChaptersCommand, json: bool) -> Result<String, CliError> {
    let catalog = console.catalog();
    match command {
        ChaptersCommand::Import { book, file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .map_err(|source| CliError::Io { path: file.clone(), source })?;
            let imported = catalog.import_chapters(&book, &text).await?;
            render(json, &serde_json::json!({ "book_id": book, "imported": imported }), |v| {
                format!("imported {} chapters", v["imported"])
            })
        }
        ChaptersCommand::List { book, page } => {
            let page = catalog.list_chapters(&book, page).await?;
            render(json, &page, output::chapter_page)
        }
    }
}

async fn transactions(console: &AdminConsole, command: TransactionsCommand) -> Result<String, CliError> {
    match command {
        TransactionsCommand::Export { user, out } => {
            let csv = console.finance().export_transactions(user.as_deref()).await?;
            match out {
                Some(path) => {
                    let rows = csv.lines().count().saturating_sub(1);
                    tokio::fs::write(&path, csv)
                        .await
                        .map_err(|source| CliError::Io { path: path.clone(), source })?;
                    Ok(format!("wrote {} transactions to {}", rows, path.display()))
                }
                None => Ok(csv),
            }
        }
    }
}

async fn withdrawal(console: &AdminConsole, command: WithdrawalCommand, json: bool) -> Result<String, CliError> {
    let finance = console.finance();
    let withdrawal = match command {
        WithdrawalCommand::List { status, page } => {
            let page = finance.list_withdrawals(status.map(Into::into), page).await?;
            return render(json, &page, output::withdrawal_page);
        }
        WithdrawalCommand::Approve { id } => finance.approve_withdrawal(&id).await?,
        WithdrawalCommand::Reject { id, reason } => finance.reject_withdrawal(&id, &reason).await?,
        WithdrawalCommand::Paid { id } => finance.mark_paid(&id).await?,
    };
    render(json, &withdrawal, output::withdrawal_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_move_up() {
        let cli = Cli::try_parse_from([
            "novel-admin",
            "--email",
            "ops@example.com",
            "--password",
            "pw",
            "category",
            "up",
            "fantasy",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Category { subcommand: CategoryCommand::Up { ref id } } if id == "fantasy"
        ));
    }

    #[test]
    fn test_negative_amount() {
        let cli = Cli::try_parse_from([
            "novel-admin", "user", "balance", "u1", "-30", "--note", "chargeback",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::User { subcommand: UserCommand::Balance { amount: -30, .. } }
        ));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_settings(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.console.page_size, 20);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Usage("x".into()).exit_code(), 2);
        assert_eq!(CliError::from(AdminError::Busy).exit_code(), 2);
        assert_eq!(CliError::from(AdminError::Timeout).exit_code(), 1);
    }
}
