use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sweep")]
#[command(about = "Log sweep -> hash-chained ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run exactly one pipeline cycle and print its report
    Cycle {
        /// Layered config paths in merge order (base -> override)
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Run a cycle every `schedule.interval_secs` until Ctrl-C
    Watch {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Stop after this many cycles (default: run until interrupted)
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Verify a ledger against its sink stream. Exits non-zero when broken.
    Verify {
        #[arg(long)]
        ledger: String,

        #[arg(long)]
        sink: String,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn init_tracing() {
    // Logs go to stderr; stdout carries the key=value report.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Cycle { config_paths } => commands::cycle::run_once(&config_paths).await,
        Commands::Watch {
            config_paths,
            cycles,
        } => commands::watch::run(&config_paths, cycles).await,
        Commands::Verify { ledger, sink } => commands::verify(&ledger, &sink),
        Commands::ConfigHash { paths } => {
            let loaded = commands::load_config(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}
