use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use neelefs::disk_format::{
    block::BlockNumber, directory_entry::EntryType, superblock::DEFAULT_LBA,
};
use neelefs::neelefs::Neelefs;
use neelefs::storage::FileBackedStorage;

#[derive(Parser)]
struct Args {
    /// Raw disk image containing a NeeleFS v2 filesystem
    disk_file: PathBuf,
    /// Block index of the NeeleFS superblock within the image
    #[arg(long, default_value_t = DEFAULT_LBA)]
    lba: BlockNumber,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy a host file into the filesystem, replacing any existing entry
    Put {
        /// Host file to copy
        source: PathBuf,
        /// Absolute destination path inside the filesystem
        destination: String,
    },
    /// Create a directory and any missing parents
    Mkdir { path: String },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Write a file's contents to stdout
    Cat { path: String },
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let disk_file = File::options()
        .read(true)
        .write(matches!(args.command, Command::Put { .. } | Command::Mkdir { .. }))
        .open(&args.disk_file)
        .with_context(|| format!("unable to open disk image {}", args.disk_file.display()))?;

    let mut filesystem = Neelefs::open(FileBackedStorage::new(disk_file), args.lba)
        .with_context(|| format!("loading NeeleFS v2 superblock at LBA {}", args.lba))?;

    match args.command {
        Command::Put {
            source,
            destination,
        } => {
            let data = fs::read(&source)
                .with_context(|| format!("reading source file {}", source.display()))?;

            filesystem
                .put_file(&data, &destination)
                .with_context(|| format!("writing {destination}"))?;

            println!(
                "Wrote {} to {}:{destination}",
                source.display(),
                args.disk_file.display()
            );
        }
        Command::Mkdir { path } => {
            filesystem
                .mkdir(&path)
                .with_context(|| format!("creating directory {path}"))?;
        }
        Command::Ls { path } => {
            for entry in filesystem
                .list_directory(&path)
                .with_context(|| format!("listing {path}"))?
            {
                let kind = match entry.type_ {
                    EntryType::Directory => 'd',
                    EntryType::File => '-',
                    EntryType::Free => '?',
                };
                println!(
                    "{kind} {:>10} {:>8} {}",
                    entry.size, entry.block, entry.name
                );
            }
        }
        Command::Cat { path } => {
            let data = filesystem
                .read_file(&path)
                .with_context(|| format!("reading {path}"))?;
            io::stdout().write_all(&data)?;
        }
    }

    Ok(())
}
