use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clipline")]
#[command(author, version, about = "Play segmented recordings as one continuous timeline")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the duration of each source
    Probe {
        /// Local paths or http(s) URLs
        #[arg(required = true)]
        sources: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve durations and print the stitched timeline layout
    Timeline {
        /// Segment sources in playback order
        #[arg(required = true)]
        sources: Vec<String>,

        /// Declared durations in seconds, comma separated, used when probing fails
        #[arg(long, value_delimiter = ',')]
        declared: Vec<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play through the stitched timeline with the headless clock decoder
    Play {
        /// Segment sources in playback order
        #[arg(required = true)]
        sources: Vec<String>,

        /// Declared durations in seconds, comma separated, used when probing fails
        #[arg(long, value_delimiter = ',')]
        declared: Vec<f64>,

        /// Start at this global time in seconds
        #[arg(long)]
        seek: Option<f64>,

        /// Playback speed multiplier
        #[arg(long, default_value = "1.0")]
        speed: f64,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
