use std::{fmt, io, str::Utf8Error};
use quick_xml::events::attributes::AttrError;

use crate::validate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Xml,
    Csv,
    Config,
    MissingRequiredField,
    Validation,
    Other,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::new(ErrorKind::Io, value.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error::new(ErrorKind::Xml, value.to_string())
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error::new(ErrorKind::Xml, value.to_string())
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Error::new(ErrorKind::Xml, value.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Error::new(ErrorKind::Csv, value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::new(ErrorKind::Config, value.to_string())
    }
}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Self {
        Error::new(ErrorKind::Validation, value.to_string())
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::new(ErrorKind::Other, value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::new(ErrorKind::Other, value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
