use std::{collections::HashSet, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use argh::FromArgs;
use xfbinlib::{encode, util::file::write_file, Xfbin};

use crate::cmd::{decode_options, read_xfbin};

#[derive(FromArgs, PartialEq, Debug)]
/// process XFBIN files
#[argh(subcommand, name = "xfbin")]
pub struct Args {
    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Info(InfoArgs),
    Dump(DumpArgs),
    Repack(RepackArgs),
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// list the pages and chunks of an XFBIN file
#[argh(subcommand, name = "info")]
pub struct InfoArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(switch)]
    /// fail on chunk types outside the known set
    reject_unknown: bool,
    #[argh(switch)]
    /// keep chunks in unsupported formats as raw bytes
    skip_unsupported: bool,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// dump the decoded chunk graph as JSON
#[argh(subcommand, name = "dump")]
pub struct DumpArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(option, short = 'o')]
    /// output JSON file (default: stdout)
    output: Option<PathBuf>,
    #[argh(switch)]
    /// fail on chunk types outside the known set
    reject_unknown: bool,
    #[argh(switch)]
    /// keep chunks in unsupported formats as raw bytes
    skip_unsupported: bool,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// decode an XFBIN file and write it back out
#[argh(subcommand, name = "repack")]
pub struct RepackArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(positional)]
    /// output file
    output: PathBuf,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        SubCommand::Info(c_args) => info(c_args),
        SubCommand::Dump(c_args) => dump(c_args),
        SubCommand::Repack(c_args) => repack(c_args),
    }
}

fn log_chunk(xfbin: &Xfbin, id: xfbinlib::nucc::ChunkId) {
    let Some(chunk) = xfbin.chunk(id) else {
        return;
    };
    let suffix = if chunk.data.is_placeholder() { " (reference only)" } else { "" };
    log::info!(
        "  [{}] {} '{}' ({}) version {:#x}{}",
        id.0,
        chunk.type_name(),
        chunk.name,
        chunk.path,
        chunk.version,
        suffix
    );
}

fn info(args: InfoArgs) -> Result<()> {
    let options = decode_options(args.reject_unknown, args.skip_unsupported);
    let xfbin = read_xfbin(&args.input, &options)?;
    log::info!(
        "{}: {} chunks, {} pages",
        args.input.display(),
        xfbin.chunks.len(),
        xfbin.pages.len()
    );

    let mut paged = HashSet::new();
    for (i, page) in xfbin.pages.iter().enumerate() {
        log::info!(
            "Page {}: {} chunks, {} references",
            i,
            page.chunks.len(),
            page.references.len()
        );
        for &id in &page.chunks {
            paged.insert(id);
            log_chunk(&xfbin, id);
        }
        for reference in &page.references {
            let target = xfbin.chunk(reference.chunk).map(|c| c.name.as_str()).unwrap_or("?");
            log::info!("  '{}' -> '{}'", reference.name, target);
        }
    }
    let unpaged: Vec<_> = xfbin.ids().filter(|id| !paged.contains(id)).collect();
    if !unpaged.is_empty() {
        log::info!("Referenced only: {} chunks", unpaged.len());
        for id in unpaged {
            log_chunk(&xfbin, id);
        }
    }
    Ok(())
}

fn dump(args: DumpArgs) -> Result<()> {
    let options = decode_options(args.reject_unknown, args.skip_unsupported);
    let xfbin = read_xfbin(&args.input, &options)?;
    match &args.output {
        Some(path) => {
            log::info!("Writing {}", path.display());
            write_file(path, |w| {
                serde_json::to_writer_pretty(&mut *w, &xfbin)?;
                w.write_all(b"\n")?;
                Ok(())
            })?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, &xfbin).context("Failed to write JSON")?;
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn repack(args: RepackArgs) -> Result<()> {
    // Raw payloads keep the slot numbers of their old page, so nothing may be skipped here
    let xfbin = read_xfbin(&args.input, &Default::default())?;
    let data = encode(&xfbin)
        .with_context(|| format!("While encoding '{}'", args.input.display()))?;
    log::info!("Writing {} ({:#x} bytes)", args.output.display(), data.len());
    write_file(&args.output, |w| {
        w.write_all(&data)?;
        Ok(())
    })
}
