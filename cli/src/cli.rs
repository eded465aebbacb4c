use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "Vaporwave",
    version = vaporwave_core::version(),
    about = "Vaporwave - Animated shader overlays for every window you are not looking at",
)]
pub struct Args {
    /// Specify custom configuration file path
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Specify custom configuration file path"
    )]
    pub config_path: Option<PathBuf>,

    /// Cover whole displays instead of individual windows
    #[arg(
        long = "fullscreen",
        help = "Cover whole displays instead of individual windows"
    )]
    pub fullscreen: bool,

    /// Run against a scripted desktop instead of the real window server
    #[arg(
        long = "simulate",
        help = "Run against a scripted desktop instead of the real window server"
    )]
    pub simulate: bool,

    /// Validate configuration and exit without starting
    #[arg(
        long = "dry-run",
        help = "Validate configuration and exit without starting"
    )]
    pub dry_run: bool,

    /// Use default configuration and ignore config files
    #[arg(
        long = "defaults",
        help = "Use default configuration and ignore config files"
    )]
    pub use_defaults: bool,

    #[arg(
        short = 'q',
        long = "quiet",
        conflicts_with = "verbose",
        help = "Only log info, warnings and errors"
    )]
    pub quiet: bool,

    #[arg(short = 'v', long = "verbose", help = "Log everything, including traces")]
    pub verbose: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}
