use std::{fs::DirBuilder, io::Write, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use argh::FromArgs;
use xfbinlib::{
    encode, merge,
    nucc::{Chunk, ChunkData},
    util::file::{map_file, write_file},
    MergePolicy, Xfbin,
};

use crate::cmd::read_xfbin;

#[derive(FromArgs, PartialEq, Debug)]
/// process texture chunks
#[argh(subcommand, name = "texture")]
pub struct Args {
    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Extract(ExtractArgs),
    Import(ImportArgs),
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// write every texture in an XFBIN file as DDS
#[argh(subcommand, name = "extract")]
pub struct ExtractArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(positional)]
    /// output directory
    output: PathBuf,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// replace the pixels of a texture chunk with a DDS file
#[argh(subcommand, name = "import")]
pub struct ImportArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(positional)]
    /// texture chunk name
    name: String,
    #[argh(positional)]
    /// DDS file
    dds: PathBuf,
    #[argh(positional)]
    /// output file
    output: PathBuf,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        SubCommand::Extract(c_args) => extract(c_args),
        SubCommand::Import(c_args) => import(c_args),
    }
}

fn extract(args: ExtractArgs) -> Result<()> {
    let xfbin = read_xfbin(&args.input, &Default::default())?;
    DirBuilder::new().recursive(true).create(&args.output)?;
    for chunk in &xfbin.chunks {
        let Some(texture) = chunk.data.as_texture() else {
            continue;
        };
        if texture.is_reference() {
            log::info!("Skipping '{}': pixels live in another file", chunk.name);
            continue;
        }
        let dds =
            texture.to_dds().with_context(|| format!("While converting '{}'", chunk.name))?;
        let path = args.output.join(format!("{}.dds", chunk.name));
        log::info!("Writing {} ({}x{})", path.display(), texture.width, texture.height);
        write_file(&path, |w| {
            w.write_all(&dds)?;
            Ok(())
        })?;
    }
    Ok(())
}

fn import(args: ImportArgs) -> Result<()> {
    let existing = read_xfbin(&args.input, &Default::default())?;
    let (chunk, old) = existing
        .chunks
        .iter()
        .filter(|c| c.name == args.name)
        .find_map(|c| c.data.as_texture().map(|t| (c, t)))
        .ok_or_else(|| anyhow!("No texture '{}' in '{}'", args.name, args.input.display()))?;

    let data = map_file(&args.dds)?;
    let texture = old
        .import_dds(&data)
        .with_context(|| format!("While reading '{}'", args.dds.display()))?;
    log::info!(
        "Replacing '{}' ({}x{}) with {}x{}",
        chunk.name,
        old.width,
        old.height,
        texture.width,
        texture.height
    );

    let mut incoming = Xfbin::new();
    let mut replacement = Chunk::new(&chunk.path, &chunk.name, ChunkData::Texture(texture));
    replacement.version = chunk.version;
    let id = incoming.add_chunk(replacement);
    incoming.add_page(vec![id]);
    let policy = MergePolicy { replace_payloads: true, add_missing: false };
    let merged = merge(&existing, &incoming, &policy)?;

    let out = encode(&merged)?;
    log::info!("Writing {}", args.output.display());
    write_file(&args.output, |w| {
        w.write_all(&out)?;
        Ok(())
    })
}
