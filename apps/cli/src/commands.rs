//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use moodleget_session::SessionManager;
use moodleget_shared::{
    AppConfig, Course, SessionConfig, init_config, load_config, load_config_from,
};
use tracing::{debug, info};

use crate::render::{self, OutputFormat};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MoodleGet: read your Moodle courses from the terminal.
#[derive(Parser)]
#[command(
    name = "moodleget",
    version,
    about = "List enrolled courses and course activities from a Moodle portal.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.moodleget/moodleget.toml.
    #[arg(long, global = true, env = "MOODLEGET_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List enrolled courses.
    Courses {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List the activities of one course.
    Activities {
        /// Course id, or part of the course name.
        course: String,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = [
        "moodleget",
        "moodleget_session",
        "moodleget_extract",
        "moodleget_markdown",
        "moodleget_shared",
    ]
    .map(|target| format!("{target}={level}"))
    .join(",");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so listings can be piped.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Courses { format } => cmd_courses(config_path, format).await,
        Command::Activities { course, format } => {
            cmd_activities(config_path, &course, format).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_courses(config_path: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let progress = CliProgress::new()?;
    let manager = login(config_path, &progress).await?;

    progress.phase("Fetching courses");
    let courses = manager.fetch_courses().await;
    manager.close();
    drop(progress);

    let courses = courses?;
    info!(count = courses.len(), "listing courses");
    print!("{}", render::courses(&courses, format)?);
    Ok(())
}

async fn cmd_activities(
    config_path: Option<PathBuf>,
    query: &str,
    format: OutputFormat,
) -> Result<()> {
    let progress = CliProgress::new()?;
    let manager = login(config_path, &progress).await?;

    progress.phase("Fetching courses");
    let result = async {
        let courses = manager.fetch_courses().await?;
        let course = find_course(&courses, query)
            .cloned()
            .ok_or_else(|| eyre!("course '{query}' not found"))?;

        progress.phase(&format!("Fetching activities of {course}"));
        let batch = manager.fetch_activity_batch(&course).await?;
        for (id, error) in &batch.errors {
            tracing::warn!(activity = %id, %error, "activity content could not be rendered");
        }
        Ok::<_, color_eyre::Report>((course, batch.activities))
    }
    .await;
    manager.close();
    drop(progress);

    let (course, activities) = result?;
    print!("{}", render::activities(&course, &activities, format)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = read_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_config(config_path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn login(config_path: Option<PathBuf>, progress: &CliProgress) -> Result<SessionManager> {
    let config = read_config(config_path)?;
    let session_config = SessionConfig::from_app(&config)?;

    progress.phase(&format!("Logging in to {}", session_config.base_url));
    let mut manager = SessionManager::new(session_config)?;
    let session = manager.authenticate().await?;
    debug!(?session, "session established");
    Ok(manager)
}

/// Pick the course whose id equals `query` or whose name contains it,
/// ignoring case. When several match, the last one wins.
fn find_course<'a>(courses: &'a [Course], query: &str) -> Option<&'a Course> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    courses
        .iter()
        .rev()
        .find(|course| course.id == query || course.name.to_lowercase().contains(&query))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner on stderr while the portal is queried.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Ok(Self { spinner })
    }

    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}
