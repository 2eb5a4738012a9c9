use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "renderforged")]
#[command(author, version, about = "Template video render server")]
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
    /// Start the render server
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Resolve a template reference to its canonical media URL
    Resolve {
        /// Template id, path or URL
        #[arg(short, long)]
        template: Option<String>,

        /// Explicit media URL supplied with the template
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Load and display media metadata
    Probe {
        /// Canonical media URL or server-rooted path
        #[arg(required = true)]
        url: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute the frame count of a timeline description
    Frames {
        /// JSON file describing the timeline signals
        #[arg(required = true)]
        file: PathBuf,

        /// Frames per second (defaults to the configured rate)
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
