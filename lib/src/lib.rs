//! Reading and writing XFBIN (NUCC) chunk containers.
//!
//! [`decode`] turns a container into an [`Xfbin`] chunk graph, [`encode`] writes one back.
pub mod error;
pub mod format;
pub mod nucc;
pub mod util;

pub use error::{error_kind, ErrorKind, XfbinError};
pub use nucc::{decode, decode_with, encode, merge, DecodeOptions, MergePolicy, Xfbin};
