use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "streamgate")]
#[command(author, version, about = "Stream-ingest gateway for the Restreamer control plane")]
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
    /// Start the gateway (stream API and HLS proxy)
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        #[arg(value_name = "CONFIG")]
        path: Option<PathBuf>,
    },

    /// Log in to the control plane and list its ingest streams
    CheckControlPlane,

    /// Print the process config and dashboard metadata for a source
    BuildConfig {
        /// Display name of the stream
        #[arg(long)]
        name: String,

        /// RTSP(S) source URL
        #[arg(long)]
        source: String,
    },

    /// Generate a random API key for the stream API
    GenerateApiKey,

    /// Display version information
    Version,
}
