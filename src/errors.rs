//! Error types surfaced by the core and the driver.

use std::error::Error;
use std::fmt;

/// The driver received malformed JSON input.
#[derive(Debug, Clone)]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        ParseError(msg.into())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "json input error: {}", self.0)
    }
}

impl Error for ParseError {}

/// A move attempted to place two same-species particles on one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMove;

impl fmt::Display for InvalidMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "move would doubly occupy a site")
    }
}

impl Error for InvalidMove {}

/// A walk produced a negative or NaN probability ratio.
///
/// This is always fatal: the walk is first restored to a consistent
/// (rejected) state, then the error propagates up through the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidProbability(pub f64);

impl fmt::Display for InvalidProbability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid probability ratio: {}", self.0)
    }
}

impl Error for InvalidProbability {}
