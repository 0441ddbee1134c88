//! Error types for the command-script driver

use thiserror::Error;

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that abort a run
#[derive(Error, Debug)]
pub enum CliError {
    /// Unknown command, missing argument or out-of-range parameter
    #[error("config error: {0}")]
    Config(String),

    /// Failure inside the field engine
    #[error(transparent)]
    Core(#[from] gaussic_core::CoreError),

    /// Failure in grid geometry
    #[error(transparent)]
    Grid(#[from] gaussic_grids::GridError),

    /// File-system failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any failure, labeled with the command that triggered it
    #[error("{source} [while executing `{command}`]")]
    InCommand {
        /// The script command being executed
        command: String,
        /// The underlying failure
        #[source]
        source: Box<CliError>,
    },
}

impl CliError {
    /// Attach the triggering command to an error.
    pub fn in_command(self, command: &str) -> CliError {
        match self {
            already @ CliError::InCommand { .. } => already,
            other => CliError::InCommand {
                command: command.to_string(),
                source: Box::new(other),
            },
        }
    }
}
