//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};

/// Build category/menu trees from parent-linked records and flatten them back
#[derive(Parser, Debug)]
#[command(name = "catree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Project directory for local config (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    /// Type of the id and parent_id fields
    #[arg(long, value_enum, default_value_t = KeyKind::Int, global = true, env = "CATREE_KEY")]
    pub key: KeyKind,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Id representation; the root sentinel is `0` or the empty string.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Int,
    String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Flat records -> nested tree with meta
    Build {
        /// JSON array of flat records ("-" for stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Nested tree -> flat records in pre-order
    Flatten {
        /// JSON nested object ("-" for stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show hierarchy as tree
    Show {
        /// Input file ("-" for stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Input is a nested object instead of flat records
        #[arg(long)]
        nested: bool,
    },

    /// Validate input and report tree shape
    Check {
        /// Input file ("-" for stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Input is a nested object instead of flat records
        #[arg(long)]
        nested: bool,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}
