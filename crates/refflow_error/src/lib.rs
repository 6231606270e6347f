//! Error type shared by all refflow crates.

use std::error::Error;
use std::fmt;

/// Return early with a "not implemented" error.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        return Err($crate::RefflowError::new(format!("Not implemented: {msg}")));
    }};
}

pub type Result<T, E = RefflowError> = std::result::Result<T, E>;

/// Error returned by all fallible refflow APIs.
///
/// Errors are a message plus an optional source. There's no attempt at a
/// structured taxonomy; callers that need to react to a specific condition
/// should be handed a specific type instead of parsing messages.
#[derive(Debug)]
pub struct RefflowError {
    inner: Box<RefflowErrorInner>,
}

#[derive(Debug)]
struct RefflowErrorInner {
    message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl RefflowError {
    pub fn new(message: impl Into<String>) -> Self {
        RefflowError {
            inner: Box::new(RefflowErrorInner {
                message: message.into(),
                source: None,
            }),
        }
    }

    pub fn with_source(message: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        RefflowError {
            inner: Box::new(RefflowErrorInner {
                message: message.into(),
                source: Some(source),
            }),
        }
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }
}

impl fmt::Display for RefflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.message)?;
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }
        Ok(())
    }
}

impl Error for RefflowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_deref().map(|e| e as _)
    }
}

impl From<fmt::Error> for RefflowError {
    fn from(value: fmt::Error) -> Self {
        RefflowError::with_source("Format error", Box::new(value))
    }
}

pub trait ResultExt<T, E> {
    /// Wrap an error with additional context.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap an error with additional context, lazily evaluating the message.
    fn context_fn<F, S>(self, f: F) -> Result<T>
    where
        F: Fn() -> S,
        S: Into<String>;
}

impl<T, E> ResultExt<T, E> for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn context(self, msg: &'static str) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(RefflowError::with_source(msg, Box::new(e))),
        }
    }

    fn context_fn<F, S>(self, f: F) -> Result<T>
    where
        F: Fn() -> S,
        S: Into<String>,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(RefflowError::with_source(f(), Box::new(e))),
        }
    }
}

pub trait OptionExt<T> {
    /// Convert an Option to a Result, erroring with a field name if None.
    fn required(self, field: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, field: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(RefflowError::new(format!("Missing required field: {field}"))),
        }
    }
}
