// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use mora::output::OutputMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mora")]
#[command(about = "Deploy multi-service applications with deployment-time configuration")]
#[command(version)]
pub struct Cli {
    /// Config file (default: mora.yml in the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = OutputMode::Normal, global = true)]
    pub output: OutputMode,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new mora.yml configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Create a deployment from a plan file and run its first pass
    Submit {
        /// Plan file (YAML or JSON)
        plan: PathBuf,

        #[arg(short, long)]
        user: String,

        /// Environment slug
        #[arg(short, long)]
        environment: String,
    },

    /// Supply configuration to a waiting deployment and resume it
    Configure {
        deployment: String,

        /// module/identifier=value
        #[arg(long = "set", value_name = "MODULE/ID=VALUE")]
        set: Vec<String>,

        /// module/identifier, copied from the previous deployment
        #[arg(long = "inherit", value_name = "MODULE/ID")]
        inherit: Vec<String>,
    },

    /// Run another pass of an unfinished deployment
    Resume { deployment: String },

    /// Show a deployment and the configuration it waits for
    Status { deployment: String },

    /// List deployments
    List {
        /// Only deployments of this environment id
        #[arg(short, long)]
        environment: Option<String>,
    },

    /// Cancel a deployment
    Cancel { deployment: String },
}
