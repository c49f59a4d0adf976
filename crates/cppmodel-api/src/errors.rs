use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the contribution of one translation unit
#[derive(Error, Debug)]
pub enum ParserError {
    /// Failed to read file
    #[error("IO error reading {0}: {1}")]
    IoError(PathBuf, #[source] std::io::Error),

    /// Syntax error in source code
    #[error("Syntax error in {0}:{1}:{2}: {3}")]
    SyntaxError(PathBuf, usize, usize, String),

    /// File too large
    #[error("File {0} exceeds maximum size ({1} bytes)")]
    FileTooLarge(PathBuf, usize),

    /// Parsing timeout
    #[error("Parsing {0} exceeded timeout")]
    Timeout(PathBuf),

    /// Front end could not produce a syntax tree
    #[error("Parse error in {0}: {1}")]
    ParseError(PathBuf, String),

    /// Configuration could not be applied
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ParserError {
    /// File the error is about, when it concerns one
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ParserError::IoError(p, _)
            | ParserError::SyntaxError(p, ..)
            | ParserError::FileTooLarge(p, _)
            | ParserError::Timeout(p)
            | ParserError::ParseError(p, _) => Some(p),
            ParserError::InvalidConfig(_) => None,
        }
    }
}

/// Errors that abort a whole extraction run
#[derive(Error, Debug)]
pub enum ExtractError {
    /// A unit failed while strict mode was enabled
    #[error("Strict mode: unit {path} failed: {source}")]
    StrictAbort {
        path: PathBuf,
        #[source]
        source: ParserError,
    },

    /// Worker pool could not be created
    #[error("Failed to create thread pool: {0}")]
    ThreadPool(String),

    /// Input discovery failed before any unit was parsed
    #[error(transparent)]
    Discovery(#[from] ParserError),
}

/// Result type for unit-level operations
pub type ParserResult<T> = Result<T, ParserError>;
