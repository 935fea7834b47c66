use std::{error, fmt};

/// Failures surfaced while probing or binding a memory-access backend.
///
/// All of these are absorbed during one-time backend selection; no operation
/// on a constructed accessor reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required internal view field could not be located or did not behave
    /// as expected on this runtime.
    UnsupportedLayout(&'static str),
    /// A native support symbol could not be resolved from the process image.
    SymbolUnavailable(&'static str),
    /// The backend was disabled through the named environment variable.
    Disabled(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedLayout(field) => {
                write!(f, "unsupported view layout: {field}")
            }
            Error::SymbolUnavailable(name) => {
                write!(f, "native symbol {name} could not be resolved")
            }
            Error::Disabled(var) => write!(f, "disabled by {var}"),
        }
    }
}

impl error::Error for Error {}
