use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pod::ExecError;
use crate::report;

#[derive(Parser)]
#[command(name = "kubecomply")]
#[command(version = crate::VERSION)]
#[command(about = "Run compliance rules against a Kubernetes cluster")]
#[command(long_about = "Runs compliance rules against a Kubernetes cluster. Node level rules inspect worker nodes by executing commands in short-lived privileged pods that are removed afterwards.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true, value_name = "NAME", env = "KUBECOMPLY_CONTEXT")]
    pub context: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run shell commands on a node through an ephemeral pod
    Exec {
        /// Name of the node to run the commands on
        #[arg(short, long, value_name = "NODE")]
        node: String,

        /// Commands to run, in order; each one is passed to `/bin/sh -c`
        #[arg(value_name = "COMMAND", required = true, num_args = 1..)]
        commands: Vec<String>,
    },

    /// Run the built-in ruleset and print a report
    Run {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for report::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => report::OutputFormat::Plain,
            OutputFormat::Json => report::OutputFormat::Json,
        }
    }
}

/// Line printed for a command that failed on a node.
pub fn exec_failure_line(command: &str, err: &ExecError) -> String {
    if err.is_transient() {
        format!("$ {}\nerror (transient, may succeed on retry): {}", command, err)
    } else {
        format!("$ {}\nerror: {}", command, err)
    }
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
