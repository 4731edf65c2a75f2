use sanitize::ConfigurationError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop the command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The policy could not be built.
    #[error("invalid policy: {0}")]
    Policy(#[from] ConfigurationError),
    /// A file could not be read.
    #[error("unable to read {}: {source}", .path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// The cause.
        source: io::Error,
    },
    /// Standard input could not be read.
    #[error("unable to read standard input: {0}")]
    Stdin(io::Error),
    /// The result could not be written.
    #[error("unable to write output: {0}")]
    Write(#[from] io::Error),
}
