pub mod texture;
pub mod xfbin;

use std::path::Path;

use anyhow::{Context, Result};
use xfbinlib::{nucc::UnknownChunkPolicy, util::file::map_file, DecodeOptions, Xfbin};

pub fn decode_options(reject_unknown: bool, skip_unsupported: bool) -> DecodeOptions {
    DecodeOptions {
        unknown_chunks: if reject_unknown {
            UnknownChunkPolicy::Reject
        } else {
            UnknownChunkPolicy::Preserve
        },
        skip_unsupported,
    }
}

pub fn read_xfbin(path: &Path, options: &DecodeOptions) -> Result<Xfbin> {
    let data = map_file(path)?;
    xfbinlib::decode_with(&data, options)
        .with_context(|| format!("While decoding '{}'", path.display()))
}
