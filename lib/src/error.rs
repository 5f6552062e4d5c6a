use thiserror::Error;

/// Coarse classification of [`XfbinError`], stable across message changes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Truncated buffer, bad magic or an otherwise unreadable layout.
    Structural,
    /// A chunk or index table reference outside the valid range.
    Reference,
    /// Pixel format, curve format or chunk type that is not understood.
    UnsupportedFormat,
    /// Inconsistent parameters supplied by the caller.
    Value,
}

#[derive(Debug, Error)]
pub enum XfbinError {
    #[error("read of {len:#x} bytes at {offset:#x} is out of bounds (size {size:#x})")]
    OutOfBounds { offset: u64, len: u64, size: u64 },
    #[error("bad magic at {offset:#x}: expected {expected:?}, found {found:?}")]
    BadMagic { offset: u64, expected: String, found: String },
    #[error("malformed {what} at {offset:#x}: {message}")]
    Malformed { what: &'static str, offset: u64, message: String },
    #[error("{chunk}: reference {index} out of range (limit {limit})")]
    Reference { chunk: String, index: i64, limit: usize },
    #[error("{chunk}: reference {index} points to {found}, expected {expected}")]
    ReferenceType { chunk: String, index: i64, expected: String, found: String },
    #[error("unsupported {what}: {value}")]
    UnsupportedFormat { what: &'static str, value: String },
    #[error("invalid value: {0}")]
    Value(String),
}

impl XfbinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            XfbinError::OutOfBounds { .. }
            | XfbinError::BadMagic { .. }
            | XfbinError::Malformed { .. } => ErrorKind::Structural,
            XfbinError::Reference { .. } | XfbinError::ReferenceType { .. } => {
                ErrorKind::Reference
            }
            XfbinError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            XfbinError::Value(_) => ErrorKind::Value,
        }
    }

    pub(crate) fn malformed(what: &'static str, offset: u64, message: impl Into<String>) -> Self {
        XfbinError::Malformed { what, offset, message: message.into() }
    }

    pub(crate) fn unsupported(what: &'static str, value: impl ToString) -> Self {
        XfbinError::UnsupportedFormat { what, value: value.to_string() }
    }
}

/// Finds the [`ErrorKind`] of the first [`XfbinError`] in an error chain.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|e| e.downcast_ref::<XfbinError>()).map(XfbinError::kind)
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn kind_survives_context() {
        let err = Err::<(), _>(XfbinError::Reference { chunk: "clump".into(), index: 4, limit: 3 })
            .context("While decoding page 0")
            .unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Reference));
    }

    #[test]
    fn foreign_errors_have_no_kind() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(error_kind(&err), None);
    }
}
