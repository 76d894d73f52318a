//! Command-line interface for the message bridge transformer.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "msgbridge")]
#[command(about = "Objective-C message bridge transformer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Transform the class path described by a project file
    Transform {
        /// Project JSON file
        file: PathBuf,
        /// Target triple (defaults to the host)
        #[arg(long)]
        target: Option<String>,
        /// Synthesize one send method per bridged member instead of sharing trampolines
        #[arg(long)]
        no_generic_dispatch: bool,
        /// Print every transformed type
        #[arg(long)]
        print: bool,
        /// Write the descriptor object file here
        #[arg(long, value_name = "OUT")]
        emit_object: Option<PathBuf>,
        /// Also emit the framework preload list
        #[arg(long, requires = "emit_object")]
        framework: bool,
    },
    /// List the selectors each transformed type registers
    Selectors {
        /// Project JSON file
        file: PathBuf,
    },
}
