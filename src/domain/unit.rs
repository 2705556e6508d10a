use std::fmt;

/// Result of one failure-isolated extraction unit (bank, branch or review card).
///
/// `Skipped` means the enclosing unit carries on without this one. Errors that must abort the
/// enclosing run are returned through `Err(ExtractError)` instead.
#[derive(Debug)]
pub enum Unit<T> {
    Done(T),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Navigation(String),
    Parse(String),
}

impl<T> Unit<T> {
    pub fn done(self) -> Option<T> {
        match self {
            Unit::Done(value) => Some(value),
            Unit::Skipped(_) => None,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Navigation(reason) => write!(f, "navigation failed: {}", reason),
            SkipReason::Parse(reason) => write!(f, "parse failed: {}", reason),
        }
    }
}
