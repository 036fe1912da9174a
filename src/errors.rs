use std::error::Error;
use std::fmt;

/// Fatal error conditions of the simulation engine.  Recoverable conditions
/// (no station in radius, no route found, a failed batch sub-block) are not
/// errors: they degrade to a nearest-station fallback or an unresolved cell.
#[derive(Debug, PartialEq)]
pub enum SimError {
    /// A station coordinate source could not be resolved at initialization.
    MissingCoordinateData(String),
    /// A mode string named no known travel or trip mode.
    InvalidMode(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, ff: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::MissingCoordinateData(msg) =>
                write!(ff, "missing coordinate data: {}", msg),
            SimError::InvalidMode(mode) =>
                write!(ff, "invalid mode of transportation: {}", mode),
        }
    }
}

impl Error for SimError {}
