use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "wellpulse-cli", version, about = "WellPulse CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rate a piece of content
    Rate(commands::activity::RateArgs),
    /// Log how you feel
    Mood {
        /// great, good, okay, low or bad
        level: wellpulse_core::MoodLevel,
    },
    /// Add screen time in seconds
    ScreenTime {
        seconds: u64,
    },
    /// Run every periodic check once
    Tick,
    /// Wellness score with its factor breakdown
    Score,
    /// Achievement catalog and progress
    Achievements,
    /// Today's challenge
    Challenge,
    /// Hourly activity and pattern counters
    Stats,
    /// Fetch content for categories (defaults to your goals)
    Fetch(commands::fetch::FetchArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Rate(args) => commands::activity::rate(args),
        Commands::Mood { level } => commands::activity::mood(level),
        Commands::ScreenTime { seconds } => commands::activity::screen_time(seconds),
        Commands::Tick => commands::activity::tick(),
        Commands::Score => commands::progress::score(),
        Commands::Achievements => commands::progress::achievements(),
        Commands::Challenge => commands::progress::challenge(),
        Commands::Stats => commands::progress::stats(),
        Commands::Fetch(args) => commands::fetch::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
