pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use storefront_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use storefront_core::domain::interaction::PopularityMeasure;
use tracing::{debug, Level};

#[derive(Debug, Parser)]
#[command(
    name = "storefront",
    about = "Storefront recommendation CLI",
    long_about = "Manage the storefront database, record product views, and inspect recommendations.",
    after_help = "Examples:\n  storefront seed\n  storefront track --product 3 --session sess-42\n  storefront recommend --session sess-42\n  storefront recommend --product 3 --user 1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load and verify the demo catalog (categories, products, shoppers)")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Record a product view for a signed-in user or a guest session")]
    Track {
        #[arg(long, help = "Viewed product id")]
        product: i64,
        #[arg(long, help = "Signed-in user id (takes precedence over --session)")]
        user: Option<i64>,
        #[arg(long, help = "Guest session key")]
        session: Option<String>,
    },
    #[command(about = "Show home page or product page recommendations for an identity")]
    Recommend {
        #[arg(long, help = "Product page seed; omit for home page recommendations")]
        product: Option<i64>,
        #[arg(long, help = "Maximum number of products (defaults to the configured page size)")]
        limit: Option<usize>,
        #[arg(long, help = "Signed-in user id (takes precedence over --session)")]
        user: Option<i64>,
        #[arg(long, help = "Guest session key")]
        session: Option<String>,
        #[arg(long, help = "Popularity fallback measure: distinct_viewers or total_views")]
        popularity: Option<PopularityMeasure>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Config errors are reported by the command itself.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        if let Err(error) = init_logging(&config.logging) {
            eprintln!("logging disabled: {error}");
        }
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Track { product, user, session } => {
            commands::track::run(product, user, session)
        }
        Command::Recommend { product, limit, user, session, popularity } => {
            commands::recommend::run(commands::recommend::RecommendRequest {
                product,
                limit,
                user,
                session,
                popularity,
            })
        }
    };

    debug!(event_name = "cli.command.finished", exit_code = result.exit_code, "command finished");
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber. Logs go to stderr so stdout stays a
/// single JSON outcome per command.
pub fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);

    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow::anyhow!("failed to install tracing subscriber: {error}"))
}
