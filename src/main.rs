use anyhow::Context;
use btrfs_salvage::mapper::FsMapper;
use btrfs_salvage::scanner::{self, PredicateFailure, ScanConfig};
use btrfs_salvage::btrfs;
use clap::Parser;
use log::info;

/// locate the most recent valid tree-root block on an unmountable btrfs
/// device
///
/// Every device belonging to the filesystem should be named so the chunk
/// mapper can resolve striped/mirrored chunks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Params {
    /// print a diagnostic line for every candidate block that matches
    /// owner/self-address/level but fails checksum or generation
    #[clap(short, long)]
    verbose: bool,

    #[clap(required = true)]
    paths: Vec<std::path::PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Params::parse();

    let fs = btrfs::load_fs(&args.paths).context("failed to load filesystem")?;

    let mut config = ScanConfig::from_superblock(&fs.master_sb);
    config.verbose = args.verbose;

    info!(
        "superblock claims tree root at {}, chunk root at {}",
        { fs.master_sb.root },
        { fs.master_sb.chunk_root }
    );

    let mapper = FsMapper::new(&fs);
    let report = scanner::scan(&mapper, &config).context("scan failed")?;

    if config.verbose {
        for nm in &report.near_misses {
            match nm.failed_predicate {
                PredicateFailure::Checksum => {
                    eprintln!(
                        "near miss at {}: checksum mismatch",
                        nm.logical_offset
                    );
                }
                PredicateFailure::Generation => {
                    eprintln!(
                        "near miss at {}: generation mismatch (expected {}, observed {})",
                        nm.logical_offset,
                        nm.expected_generation,
                        nm.observed_generation.unwrap_or_default()
                    );
                }
            }
        }
    }

    match report.found {
        Some(logical) => {
            println!("Found tree root at {logical}");
            Ok(())
        }
        None => {
            eprintln!("no tree root recovered");
            std::process::exit(1);
        }
    }
}
