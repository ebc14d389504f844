//! Exceptions raised by the host runtime

/// Result type for host runtime services
pub type HostResult<T> = Result<T, Exception>;

/// An exception raised inside the host runtime.
///
/// The loader treats this as opaque: it is returned by compiler services,
/// by top-level execution, and by native hooks, and is handed back to the
/// caller without being re-wrapped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({class})")]
pub struct Exception {
    /// Class name of the raised exception (e.g. `SyntaxError`)
    pub class: String,
    /// Human-readable message
    pub message: String,
}

impl Exception {
    /// Create an exception of the given class.
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Exception {
            class: class.into(),
            message: message.into(),
        }
    }
}
