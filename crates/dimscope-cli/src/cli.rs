//! CLI definition using clap

use clap::{Parser, Subcommand};
use dimscope_types::{MeasurementId, OutputFormat};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dimscope")]
#[command(author = "yuuji")]
#[command(version)]
#[command(about = "Measure objects in photos and keep a per-user measurement history")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// User id to act as. Uses config default_owner if not specified.
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Output format (json, table). Uses config value if not specified.
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Detection service URL override
    #[arg(long, global = true)]
    pub detector_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Measure objects in a single image
    Measure {
        /// Path to image file
        image: PathBuf,

        /// Record the capture as taken with the camera instead of uploaded
        #[arg(long)]
        camera: bool,

        /// Save the selected result to history
        #[arg(long)]
        save: bool,

        /// Index of the result to save (default: first)
        #[arg(long, short = 's')]
        select: Option<usize>,

        /// Print overlay rectangles for a display area (e.g., "400x400")
        #[arg(long)]
        container: Option<String>,
    },

    /// Measure every image in a folder, one at a time
    Batch {
        /// Folder containing images
        folder: PathBuf,

        /// Save the first result of each image
        #[arg(long)]
        save: bool,
    },

    /// Check whether the detection service is ready
    Health,

    /// Show measurement history, newest first
    History {
        /// Limit number of entries shown
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },

    /// Show one saved measurement
    Show {
        id: MeasurementId,
    },

    /// Delete one saved measurement
    Delete {
        id: MeasurementId,
    },

    /// Show summary statistics
    Stats {
        /// Also show width buckets and size categories
        #[arg(long)]
        distribution: bool,
    },

    /// Export history to Excel
    Export {
        /// Output file path
        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Run the measurement record HTTP API
    Serve {
        /// Bind address. Uses config value if not specified.
        #[arg(long)]
        host: Option<String>,

        /// Port. Uses config value if not specified.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Configure settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set detection service URL
        #[arg(long)]
        set_detector_url: Option<String>,

        /// Set default user id
        #[arg(long)]
        set_owner: Option<String>,

        /// Set store directory
        #[arg(long)]
        set_store_dir: Option<PathBuf>,

        /// Keep images with saved measurements (true/false)
        #[arg(long)]
        set_save_images: Option<bool>,

        /// Set default output format
        #[arg(long)]
        set_output: Option<OutputFormat>,

        /// Set retries after detection transport failures
        #[arg(long)]
        set_retries: Option<u32>,

        /// Set measure timeout in seconds (0 = transport default)
        #[arg(long)]
        set_measure_timeout: Option<u64>,

        /// Set unit shown after the average size
        #[arg(long)]
        set_unit: Option<String>,

        /// Reset to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_measure() {
        let cli = Cli::try_parse_from([
            "dimscope",
            "--owner",
            "alice",
            "measure",
            "photo.jpg",
            "--save",
            "-s",
            "2",
            "--container",
            "400x300",
        ])
        .unwrap();

        assert_eq!(cli.owner.as_deref(), Some("alice"));
        match cli.command {
            Commands::Measure {
                image,
                camera,
                save,
                select,
                container,
            } => {
                assert_eq!(image, PathBuf::from("photo.jpg"));
                assert!(!camera);
                assert!(save);
                assert_eq!(select, Some(2));
                assert_eq!(container.as_deref(), Some("400x300"));
            }
            _ => panic!("expected measure"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["dimscope", "history", "-f", "json", "-v"]).unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::History { limit: 20 }));
    }

    #[test]
    fn test_show_requires_numeric_id() {
        assert!(Cli::try_parse_from(["dimscope", "show", "abc"]).is_err());
    }
}
