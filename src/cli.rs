// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the deploy and proxy subcommands and global flags.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "exoframe")]
#[command(about = "Build, launch and route containers behind a managed reverse proxy")]
#[command(version)]
pub struct Cli {
    /// Server config file (defaults to server.config.yml in the config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy a project directory
    Deploy {
        /// Project directory containing exoframe.json
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// User the deployment belongs to
        #[arg(short, long)]
        user: String,

        /// Replace running deployments of the project once the new ones are up
        #[arg(long)]
        update: bool,

        /// Print status events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Create or reconfigure the reverse proxy
    Proxy,
}
