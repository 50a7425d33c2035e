use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A value handed to `set_time` (or a time computation) did not resolve to
    /// a representable instant.
    InvalidTime(String),
    /// A duration argument was NaN or infinite.
    InvalidDuration(String),
    Config(String),
    Integration {
        library: &'static str,
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::InvalidTime(msg) => write!(f, "invalid time: {msg}"),
            Error::InvalidDuration(msg) => write!(f, "invalid duration: {msg}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Integration { library, reason } => {
                write!(f, "library integration '{library}' failed: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<jiff::Error> for Error {
    fn from(err: jiff::Error) -> Self {
        Error::InvalidTime(err.to_string())
    }
}
