//! `reelsmith` CLI - generate short vertical videos from a script

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reelsmith::Config;

#[derive(Parser)]
#[command(name = "reelsmith")]
#[command(about = "Narrated, captioned vertical videos from a text script")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/reelsmith/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a video and wait for it to finish
    Generate(GenerateArgs),

    /// Compile a caption file from word timings
    Captions {
        /// JSON array of {word, start, end}
        #[arg(short, long)]
        timings: PathBuf,

        /// Script text file
        #[arg(short, long)]
        script: PathBuf,

        /// Narration length in seconds (default: end of last timing)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Output .ass file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show a stored job
    Status {
        job_id: String,

        /// Print the raw JSON record
        #[arg(long)]
        json: bool,
    },

    /// Check that external tools are installed
    Check,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Script text file
    #[arg(short, long)]
    pub script: PathBuf,

    /// Topic label stored with the job
    #[arg(long, default_value = "")]
    pub topic: String,

    /// Background music file
    #[arg(short, long)]
    pub music: Option<PathBuf>,

    /// Footage search query
    #[arg(short, long)]
    pub query: Option<String>,

    /// Narration speed multiplier
    #[arg(long, default_value = "1.0")]
    pub speed: f64,

    #[arg(long, default_value = "0.7")]
    pub stability: f32,

    #[arg(long, default_value = "0.75")]
    pub similarity: f32,

    #[arg(long, default_value = "0.5")]
    pub style: f32,

    #[arg(long)]
    pub no_speaker_boost: bool,

    /// Use this job id instead of a random one
    #[arg(long)]
    pub job_id: Option<String>,

    /// Print the final record as JSON
    #[arg(long)]
    pub json: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate(args) => {
            cmd::generate::cmd_generate(&config, args).await?;
        }
        Commands::Captions {
            timings,
            script,
            duration,
            output,
        } => {
            cmd::captions::cmd_captions(&config, &timings, &script, duration, &output).await?;
        }
        Commands::Status { job_id, json } => {
            cmd::status::cmd_status(&config, &job_id, json).await?;
        }
        Commands::Check => {
            cmd::check::cmd_check(&config).await?;
        }
    }

    Ok(())
}
