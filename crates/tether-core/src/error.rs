//! Error types for checked handle access.
//!
//! Lifetime bookkeeping itself never returns an error. Decrements stop at
//! zero and count overflow aborts. The only recoverable errors come from
//! asking an empty or shared handle for something it cannot give.

use std::error::Error;
use std::fmt;

/// Errors from the checked accessors on a shared handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleError {
    /// The handle owns no object.
    Empty,
    /// Exclusive access was requested while other owners exist.
    NotUnique {
        /// Number of owners observed when the request was made.
        use_count: usize,
    },
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "handle owns no object"),
            Self::NotUnique { use_count } => {
                write!(f, "handle is not unique: {use_count} owners")
            }
        }
    }
}

impl Error for HandleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(HandleError::Empty.to_string(), "handle owns no object");
        assert_eq!(
            HandleError::NotUnique { use_count: 3 }.to_string(),
            "handle is not unique: 3 owners"
        );
    }

    #[test]
    fn is_std_error() {
        let err: Box<dyn Error> = Box::new(HandleError::Empty);
        assert!(err.source().is_none());
    }
}
