//! CLI module for Opptak.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{format_size, Output};

use clap::{Parser, Subcommand};

/// Opptak - Video Ingestion with Snapshots and Transcripts
///
/// A self-hosted service that turns uploaded videos into stored recordings
/// with a midpoint still frame and a speech transcript.
/// The name "Opptak" comes from the Norwegian word for "recording."
#[derive(Parser, Debug)]
#[command(name = "opptak")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP ingestion server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Ingest a local video file
    Ingest {
        /// Path to a video file (mp4, webm, m4v, avi, flv, mkv)
        file: String,
    },

    /// List stored recordings
    List,

    /// Show one recording, including its transcript
    Show {
        /// Recording ID
        id: String,
    },

    /// Delete a recording
    Delete {
        /// Recording ID
        id: String,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
