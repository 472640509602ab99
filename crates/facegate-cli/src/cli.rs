use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "facegate", about = "Face-descriptor enrollment and verification")]
pub struct Cli {
    /// Path to a TOML configuration file (overrides FACEGATE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the gallery database
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Maximum distance for a match
    #[arg(long, global = true)]
    pub threshold: Option<f64>,

    /// Distance at which the gallery scan stops early
    #[arg(long, global = true)]
    pub early_exit: Option<f64>,

    /// Always scan the whole gallery and report the true minimum distance
    #[arg(long, global = true)]
    pub exhaustive: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Enroll descriptors for an identity, replacing any existing gallery
    Enroll {
        identity: String,
        /// JSON file holding an array of descriptors ("-" for stdin)
        #[arg(short, long)]
        samples: PathBuf,
        /// Store only the mean of the samples
        #[arg(long)]
        average: bool,
    },
    /// Verify a query descriptor against an identity's gallery
    Verify {
        identity: String,
        /// JSON file holding one descriptor ("-" for stdin)
        #[arg(short, long)]
        query: PathBuf,
    },
    /// Find the closest enrolled identity for a query descriptor
    Identify {
        #[arg(short, long)]
        query: PathBuf,
    },
    /// Remove an identity's gallery
    Revoke { identity: String },
    /// Show enrollment state for an identity
    Status { identity: String },
    /// Print the elementwise mean of a set of descriptors
    Average {
        #[arg(short, long)]
        samples: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}
