use std::{fs::File, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use neelefs::{
    disk_format::{block::BlockNumber, superblock::DEFAULT_LBA},
    neelefs::{IssueKind, Neelefs},
    storage::FileBackedStorage,
};

#[derive(Parser)]
struct Args {
    /// NeeleFS disk image
    disk_file: PathBuf,
    /// File or directory to check
    #[arg(default_value = "/")]
    path: String,
    /// Block index of the NeeleFS superblock within the image
    #[arg(long, default_value_t = DEFAULT_LBA)]
    lba: BlockNumber,
    /// Print every checked file, not only the broken ones
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let args = Args::parse();

    let disk_file = File::options()
        .read(true)
        .open(&args.disk_file)
        .context("unable to open disk file")?;
    let fs = Neelefs::open(FileBackedStorage::new(disk_file), args.lba)?;

    let report = fs.verify(&args.path)?;

    if args.verbose {
        for (path, crc) in &report.checked {
            println!("{crc:08x}  {path}");
        }
    }

    for issue in &report.issues {
        match issue.kind {
            IssueKind::ChecksumMismatch { stored, computed } => println!(
                "{}: checksum mismatch (stored {stored:08x}, computed {computed:08x})",
                issue.path
            ),
            IssueKind::Unallocated { block } => {
                println!("{}: block {block} is not marked allocated", issue.path)
            }
            IssueKind::DuplicateName => println!("{}: duplicate name", issue.path),
            IssueKind::Loop => println!("{}: directory loop", issue.path),
            IssueKind::UntypedEntry => println!("{}: entry has no type", issue.path),
        }
    }

    println!(
        "{} file(s) checked, {} problem(s)",
        report.checked.len(),
        report.issues.len()
    );

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
