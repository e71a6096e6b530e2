//! Crate-wide error type.
//!
//! Every fallible path in tinyflux returns [Error], built through the
//! [err_at] macro so that each error carries the call site that raised
//! it. This mirrors the pattern used throughout the storage layer this
//! crate grew out of: wrap the low-level cause, stamp `file!()`/`line!()`
//! onto it, and keep the variant list small enough to match on.

use std::{fmt, result};

pub type Result<T> = result::Result<T, Error>;

/// Error kinds surfaced to callers, per the taxonomy in the design
/// notes: validation, lookup, query construction, and storage I/O.
#[derive(Debug)]
pub enum Error {
    /// A point, or an updater's output, failed attribute validation.
    Invalid(String, String),
    /// `select`/`get_*` referenced an attribute path that does not exist.
    Lookup(String, String),
    /// A query leaf (regex flags/pattern) could not be constructed.
    Query(String, String),
    /// The storage backend failed to read, append, or rewrite.
    IoError(String, String),
    /// An invariant the core assumes was violated; always a bug.
    Fatal(String, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Invalid(loc, msg) => write!(f, "invalid at {}: {}", loc, msg),
            Error::Lookup(loc, msg) => write!(f, "lookup at {}: {}", loc, msg),
            Error::Query(loc, msg) => write!(f, "query at {}: {}", loc, msg),
            Error::IoError(loc, msg) => write!(f, "io-error at {}: {}", loc, msg),
            Error::Fatal(loc, msg) => write!(f, "fatal at {}: {}", loc, msg),
        }
    }
}

impl std::error::Error for Error {}

/// Build an [Error], stamping the macro's call site as location.
///
/// Two forms:
///
/// ```ignore
/// err_at!(IoError, msg: "partial write {}/{}", n, len)
/// err_at!(IoError, fs::File::open(path))   // converts a foreign Result
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let loc = format!("{}:{}", file!(), line!());
        Err($crate::Error::$v(loc, format!($($arg),+)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let loc = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(loc, err.to_string()))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let loc = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(loc, format!("{}: {}", format!($($arg),+), err)))
            }
        }
    }};
}
