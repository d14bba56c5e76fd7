use std::fmt;

#[derive(Debug)]
pub enum TaggerError {
    ReferenceLoad(String),
    Count(String),
    Fetch { offset: usize, message: String },
    Write { id: String, message: String },
    Match { id: String, message: String },
    StoreUnreachable(String),
    Config(String),
    Http(reqwest::Error),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl TaggerError {
    /// Errors that end the run with a non-zero exit code.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TaggerError::Fetch { .. } | TaggerError::Write { .. } | TaggerError::Match { .. }
        )
    }
}

impl fmt::Display for TaggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaggerError::ReferenceLoad(e) => write!(f, "Reference load error: {}", e),
            TaggerError::Count(e) => write!(f, "Record count error: {}", e),
            TaggerError::Fetch { offset, message } => {
                write!(f, "Fetch error at offset {}: {}", offset, message)
            }
            TaggerError::Write { id, message } => write!(f, "Write error for {}: {}", id, message),
            TaggerError::Match { id, message } => write!(f, "Match error for {}: {}", id, message),
            TaggerError::StoreUnreachable(e) => write!(f, "Store unreachable: {}", e),
            TaggerError::Config(e) => write!(f, "Config error: {}", e),
            TaggerError::Http(e) => write!(f, "HTTP error: {}", e),
            TaggerError::Json(e) => write!(f, "JSON error: {}", e),
            TaggerError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for TaggerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaggerError::Http(e) => Some(e),
            TaggerError::Json(e) => Some(e),
            TaggerError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TaggerError {
    fn from(err: reqwest::Error) -> Self {
        TaggerError::Http(err)
    }
}

impl From<serde_json::Error> for TaggerError {
    fn from(err: serde_json::Error) -> Self {
        TaggerError::Json(err)
    }
}

impl From<std::io::Error> for TaggerError {
    fn from(err: std::io::Error) -> Self {
        TaggerError::Io(err)
    }
}
