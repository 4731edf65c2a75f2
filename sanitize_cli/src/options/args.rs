use crate::options::sub_command::Commands;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// program to strip untrusted markup down to an allow-list.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Build main sub commands
    #[clap(subcommand)]
    pub command: Option<Commands>,
    /// The file to sanitize. Reads standard input when omitted or `-`.
    pub input: Option<PathBuf>,
    /// Built-in policy to start from: default, restricted, basic or relaxed.
    #[clap(short, long, default_value = "default")]
    pub preset: String,
    /// JSON file of policy overrides applied on top of the preset.
    #[clap(short, long)]
    pub config: Option<PathBuf>,
    /// Serialization: html or xhtml.
    #[clap(long)]
    pub output: Option<String>,
    /// Keep comments.
    #[clap(long)]
    pub allow_comments: bool,
    /// URL prefix trusted for embedded media, replacing any from the config. Repeat for more than one.
    #[clap(short, long = "trusted-prefix", action = ArgAction::Append)]
    pub trusted_prefix: Vec<String>,
    /// Print policy decisions on standard error
    #[clap(short, long)]
    pub verbose: bool,
    /// Write the result to this file instead of standard output.
    #[clap(short, long)]
    pub out: Option<PathBuf>,
}
