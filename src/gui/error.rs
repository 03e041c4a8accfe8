use std::{error::Error, fmt::Display};

use crate::data_source::SourceError;

#[derive(Debug)]
pub enum GuiError {
    IOError(std::io::Error),
    SourceError(SourceError),
    /// `--select` named an attribute the log does not have.
    UnknownAttribute(String),
}

impl Display for GuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuiError::IOError(e) => write!(f, "terminal error: {}", e),
            GuiError::SourceError(e) => write!(f, "{}", e),
            GuiError::UnknownAttribute(name) => write!(f, "no attribute named {:?}", name),
        }
    }
}

impl Error for GuiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GuiError::IOError(e) => Some(e),
            GuiError::SourceError(e) => Some(e),
            GuiError::UnknownAttribute(_) => None,
        }
    }
}

impl From<std::io::Error> for GuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<SourceError> for GuiError {
    fn from(value: SourceError) -> Self {
        Self::SourceError(value)
    }
}
