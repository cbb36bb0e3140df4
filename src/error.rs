use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EsgError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not an ESG file: {0}")]
    Format(String),
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("No dataset loaded")]
    NoDataset,
}

impl EsgError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        EsgError::Parse {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        EsgError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, EsgError>;
