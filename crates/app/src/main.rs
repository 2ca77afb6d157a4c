use std::fmt;

use services::progress::Grouping;
use services::seed::{demo_curriculum, seed_curriculum};
use services::{AppServices, Clock, TrackerConfig};
use tracing::info;
use tracker_core::model::RowIndex;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidRow { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidRow { raw } => {
                write!(f, "invalid --row value: {raw} (rows start at 1)")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- status  --user <name>");
    eprintln!("  cargo run -p app -- toggle  --user <name> --row <n> [--undo]");
    eprintln!("  cargo run -p app -- ranking");
    eprintln!("  cargo run -p app -- list");
    eprintln!("  cargo run -p app -- seed");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>      (default sqlite://tracker.sqlite3)");
    eprintln!("  --worksheet <name>     (default Progress)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TRACKER_DB_URL, TRACKER_WORKSHEET, TRACKER_LOG_CAP, TRACKER_LOG_RETENTION,");
    eprintln!("  TRACKER_RETRY_ATTEMPTS, TRACKER_RETRY_DELAY_MS, TRACKER_UTC_OFFSET_MINUTES,");
    eprintln!("  TRACKER_COLUMNS, TRACKER_SUBJECT_ORDER, TRACKER_SHEETS_ID, TRACKER_SHEETS_TOKEN,");
    eprintln!("  TRACKER_SHEETS_API_URL, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status { user: String },
    Toggle { user: String, row: RowIndex, undo: bool },
    Ranking,
    List,
    Seed,
}

#[derive(Debug, Default)]
struct Args {
    db_url: Option<String>,
    worksheet: Option<String>,
    user: Option<String>,
    row: Option<RowIndex>,
    undo: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(normalize_sqlite_url(value));
                }
                "--worksheet" => parsed.worksheet = Some(require_value(args, "--worksheet")?),
                "--user" => parsed.user = Some(require_value(args, "--user")?),
                "--row" => {
                    let value = require_value(args, "--row")?;
                    let row = value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .ok_or(ArgsError::InvalidRow { raw: value })?;
                    parsed.row = Some(RowIndex::new(row));
                }
                "--undo" => parsed.undo = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }

    fn command(&mut self, name: &str) -> Result<Command, ArgsError> {
        let user = |user: Option<String>| user.ok_or(ArgsError::MissingFlag { flag: "--user" });
        match name {
            "status" => Ok(Command::Status {
                user: user(self.user.take())?,
            }),
            "toggle" => Ok(Command::Toggle {
                user: user(self.user.take())?,
                row: self.row.ok_or(ArgsError::MissingFlag { flag: "--row" })?,
                undo: self.undo,
            }),
            "ranking" => Ok(Command::Ranking),
            "list" => Ok(Command::List),
            "seed" => Ok(Command::Seed),
            other => Err(ArgsError::UnknownCommand(other.to_string())),
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw.starts_with("sqlite::memory:") || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url.starts_with("sqlite::memory:") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(pct: f64) -> u32 {
    (pct * 100.0).round().clamp(0.0, 100.0) as u32
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let name = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };

    let (mut args, cmd) = Args::parse(&mut argv)
        .and_then(|mut args| args.command(&name).map(|cmd| (args, cmd)))
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    let mut config = TrackerConfig::from_env()?;
    if let Some(db_url) = args.db_url.take() {
        config = config.with_db_url(db_url);
    } else if !config.db_url.starts_with("sqlite::memory:") {
        let db_url = normalize_sqlite_url(config.db_url.clone());
        config = config.with_db_url(db_url);
    }
    if let Some(worksheet) = args.worksheet.take() {
        config = config.with_worksheet(worksheet);
    }
    if config.sheets_api.is_none() {
        prepare_sqlite_file(&config.db_url)?;
    }

    let services = AppServices::from_config(config, Clock::default_clock()).await?;

    match cmd {
        Command::Status { user } => {
            let overview = services.progress().overview(&user).await?;
            println!(
                "{}: {}/{} lessons ({}%), streak {} day(s)",
                overview.learner,
                overview.completed,
                overview.total,
                percent(overview.pct),
                overview.streak
            );
            if let Some(entry) = &overview.resume {
                println!("  last studied {} at {}", entry.reference(), entry.at());
            }
            if let Some((subject, pct)) = &overview.favorite_subject {
                println!("  strongest subject: {subject} ({}%)", percent(*pct));
            }
            for group in &overview.subjects {
                println!(
                    "  {:<24} {:>3}/{:<3} {:>3}%",
                    group.key,
                    group.completed,
                    group.total,
                    percent(group.pct)
                );
            }
            let weeks = services
                .progress()
                .get_group_progress(&user, Grouping::Week)
                .await?;
            let done = weeks.iter().filter(|week| week.is_complete()).count();
            println!("  weeks finished: {done}/{}", weeks.len());
        }
        Command::Toggle { user, row, undo } => {
            let sync = services.sync();
            sync.ensure_learner(&user).await?;
            let outcome = sync.toggle_completion(row, &user, !undo).await?;
            let state = if outcome.completed { "done" } else { "not done" };
            if outcome.changed {
                println!("row {} marked {state} for {}", row.value() + 1, outcome.learner);
            } else {
                println!("row {} already {state} for {}", row.value() + 1, outcome.learner);
            }
        }
        Command::Ranking => {
            let ranking = services.progress().cohort_ranking().await?;
            for (place, entry) in ranking.iter().enumerate() {
                println!("{:>2}. {:<24} {}", place + 1, entry.learner, entry.completed);
            }
        }
        Command::List => {
            let progress = services.progress();
            println!("learners: {}", progress.learners().await?.join(", "));
            for subject in progress.subjects().await? {
                let units = progress.subject_units(&subject).await?;
                println!("  {subject:<24} {} lesson(s)", units.len());
            }
        }
        Command::Seed => {
            let rows = demo_curriculum();
            let written = seed_curriculum(
                services.storage().sheet.as_ref(),
                &services.config().layout,
                &rows,
            )
            .await?;
            info!(written, "seed complete");
            println!("seeded {written} lessons");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|arg| (*arg).to_string());
        Args::parse(&mut iter)
    }

    #[test]
    fn toggle_rows_are_one_based() {
        let mut args = parse(&["--user", "Alice", "--row", "3", "--undo"]).unwrap();
        assert_eq!(
            args.command("toggle").unwrap(),
            Command::Toggle {
                user: "Alice".into(),
                row: RowIndex::new(2),
                undo: true,
            }
        );
        assert!(matches!(
            parse(&["--row", "0"]),
            Err(ArgsError::InvalidRow { .. })
        ));
    }

    #[test]
    fn status_needs_a_user() {
        let mut args = parse(&["--worksheet", "Cohort B"]).unwrap();
        assert!(matches!(
            args.command("status"),
            Err(ArgsError::MissingFlag { flag: "--user" })
        ));
        assert_eq!(args.worksheet.as_deref(), Some("Cohort B"));
        assert_eq!(args.command("list").unwrap(), Command::List);
        assert!(matches!(
            args.command("launch"),
            Err(ArgsError::UnknownCommand(_))
        ));
    }

    #[test]
    fn relative_db_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/tracker.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/tracker.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
