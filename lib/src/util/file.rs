use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use memmap2::{Mmap, MmapOptions};

/// Opens a memory mapped file.
pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Mmap> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open file '{}'", path.display()))?;
    let map = unsafe { MmapOptions::new().map(&file) }
        .with_context(|| format!("Failed to mmap file '{}'", path.display()))?;
    Ok(map)
}

/// Creates `path` and hands a buffered writer to `cb`, flushing once it returns.
pub fn write_file<P, CB>(path: P, cb: CB) -> Result<()>
where
    P: AsRef<Path>,
    CB: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let path = path.as_ref();
    let mut out = BufWriter::new(
        File::create(path)
            .with_context(|| format!("Failed to create output file '{}'", path.display()))?,
    );
    cb(&mut out)?;
    out.flush().with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(())
}
