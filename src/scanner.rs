//! Root scanner: the `find_root` state machine.
//!
//! Drives a monotonic sweep of the logical address space from zero up to
//! `ScanConfig::upper_bound`, mapping each stride through a
//! `LogicalMapper`, reading it off the matching stripe, and running the
//! five-predicate acceptance test against every `nodesize`-aligned block
//! in the buffer it gets back. Stops at the first full match.
//!
//! Grounded directly in `find-root.c`'s `find_root`/`search_iobuf`: the
//! states below name the same phases (`START`/`STEP`/`SCAN_BUFFER`/
//! `FOUND`/`NOT_FOUND`/`FATAL`) even though Rust's control flow doesn't
//! need an explicit state enum to express them.

use crate::codec::decode_header;
use crate::checksum::verify_checksum;
use crate::device::BlockDevice;
use crate::error::ScanError;
use crate::mapper::LogicalMapper;
use crate::structures::btrfs_super_block;

/// How many `nodesize`-aligned strides are requested from the mapper per
/// positional read. Chosen to amortize syscalls over a sweep that may
/// cover gigabytes of address space; has no effect on correctness since
/// `SCAN_BUFFER` still evaluates one stride at a time.
const SWEEP_BATCH_STRIDES: u64 = 256;

/// Replaces a file-scope `verbose`/`csum_size` global pair with explicit
/// construction parameters.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    pub verbose: bool,
    pub checksum_size: usize,
    pub expected_generation: u64,
    pub expected_owner: u64,
    pub expected_level: u8,
    pub upper_bound: u64,
    pub nodesize: u32,
}

impl ScanConfig {
    /// Build the default configuration a scan against a freshly loaded
    /// superblock should use: target the tree-of-roots, expect the
    /// generation/level/bound the superblock itself last committed.
    pub fn from_superblock(sb: &btrfs_super_block) -> ScanConfig {
        ScanConfig {
            verbose: false,
            checksum_size: crate::structures::BTRFS_CSUM_SIZE,
            expected_generation: sb.generation,
            expected_owner: crate::structures::TREE_ROOT_DISCRIMINATOR,
            expected_level: sb.root_level,
            upper_bound: sb.root,
            nodesize: sb.nodesize,
        }
    }
}

/// Which predicate a near-miss block failed. Only blocks passing
/// predicates (1)-(3) (owner, self-address, level) ever produce a
/// `NearMiss` — failures of those three are silent rejections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredicateFailure {
    Checksum,
    Generation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NearMiss {
    pub logical_offset: u64,
    pub failed_predicate: PredicateFailure,
    pub observed_generation: Option<u64>,
    pub expected_generation: u64,
}

/// Everything a sweep produces: the found tree-root (if any) plus every
/// near-miss encountered along the way, so the CLI can print both without
/// the scanner needing to know about stdout/stderr.
#[derive(Clone, Debug, Default)]
pub struct ScanReport {
    pub found: Option<u64>,
    pub near_misses: Vec<NearMiss>,
}

enum Outcome {
    Found,
    NearMiss(NearMiss),
    Reject,
}

fn evaluate(block: &[u8], expected_self: u64, config: &ScanConfig) -> Outcome {
    let header = decode_header(block);

    // predicate 1: owner
    if header.owner != config.expected_owner {
        return Outcome::Reject;
    }
    // predicate 2: self-address
    if header.self_bytenr != expected_self {
        return Outcome::Reject;
    }
    // predicate 3: level
    if header.level != config.expected_level {
        return Outcome::Reject;
    }
    // predicate 4: checksum
    if !verify_checksum(block, config.nodesize as usize) {
        return Outcome::NearMiss(NearMiss {
            logical_offset: expected_self,
            failed_predicate: PredicateFailure::Checksum,
            observed_generation: None,
            expected_generation: config.expected_generation,
        });
    }
    // predicate 5: generation
    if header.generation != config.expected_generation {
        return Outcome::NearMiss(NearMiss {
            logical_offset: expected_self,
            failed_predicate: PredicateFailure::Generation,
            observed_generation: Some(header.generation),
            expected_generation: config.expected_generation,
        });
    }

    Outcome::Found
}

/// Run a full sweep. `mapper` resolves logical offsets to physical
/// stripes; each stripe's device must implement `BlockDevice` for the
/// positional reads the sweep issues.
pub fn scan(mapper: &dyn LogicalMapper, config: &ScanConfig) -> Result<ScanReport, ScanError> {
    let nodesize = config.nodesize as u64;
    let batch_len = nodesize * SWEEP_BATCH_STRIDES;
    let mut cursor: u64 = 0;
    let mut report = ScanReport::default();

    'sweep: loop {
        if cursor > config.upper_bound {
            break;
        }

        let stripes = match mapper.map(cursor, batch_len) {
            Ok(stripes) => stripes,
            // mapper cannot resolve this offset: treat as end of mapped
            // data, not a fatal condition.
            Err(ScanError::Mapping(_)) => break,
            Err(e) => return Err(e),
        };
        let stripe = match stripes.into_iter().next() {
            Some(s) => s,
            None => break,
        };

        let read_len = stripe.stripe_length.min(batch_len) as usize;
        if read_len == 0 {
            break;
        }
        let mut buf = vec![0u8; read_len];
        let n = stripe.device.device.read_at(stripe.physical_offset, &mut buf)?;
        if n == 0 {
            break;
        }
        buf.truncate(n);

        let mut b: usize = 0;
        while b + nodesize as usize <= buf.len() {
            let expected_self = cursor + b as u64;
            if expected_self > config.upper_bound {
                break 'sweep;
            }

            let block = &buf[b..b + nodesize as usize];
            match evaluate(block, expected_self, config) {
                Outcome::Found => {
                    report.found = Some(expected_self);
                    return Ok(report);
                }
                Outcome::NearMiss(nm) => report.near_misses.push(nm),
                Outcome::Reject => {}
            }
            b += nodesize as usize;
        }

        cursor += n as u64;
    }

    Ok(report)
}
