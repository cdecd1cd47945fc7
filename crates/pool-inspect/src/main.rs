//! Prints the partition layout a pool would use for a set of block sizes.
//!
//! ```text
//! $ pool-inspect --exhaust 8 4
//! class  block size  partition        stride  blocks
//!     0           8  0..32758             11    2978
//!     1           4  32758..65532          7    4682
//! used 65532 of 65536 bytes
//! class 0: handed out 2978 blocks
//! class 1: handed out 4682 blocks
//! ```

use core::fmt::Write as _;

use argh::FromArgs;
use log::LevelFilter;
use pool_alloc::{BlockHandle, InitError, PoolAllocator};
use snafu::{ResultExt as _, Snafu, ensure};

/// Lay out a pool for the given block sizes and print its partition table.
#[derive(Debug, FromArgs)]
struct Args {
    /// allocate every block of every size class, release them and allocate
    /// them again, reporting how many blocks each class hands out
    #[argh(switch)]
    exhaust: bool,
    /// show the allocator's layout logs
    #[argh(switch, short = 'v')]
    verbose: bool,
    /// block sizes in bytes
    #[argh(positional)]
    sizes: Vec<usize>,
}

#[derive(Debug, Snafu)]
enum InspectError {
    #[snafu(display("failed to lay out {count} block sizes"))]
    Layout {
        count: usize,
        #[snafu(source)]
        source: InitError,
    },
    #[snafu(display(
        "size class {class_index} handed out {actual} blocks, expected {expected}"
    ))]
    BlockCount {
        class_index: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Drained {
    class_index: usize,
    blocks: usize,
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn render_table(pool: &PoolAllocator) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:>10}  {:<15}  {:>6}  {:>6}",
        "class", "block size", "partition", "stride", "blocks"
    );
    for (index, class) in pool.size_classes().iter().enumerate() {
        let partition = class.partition();
        let _ = writeln!(
            out,
            "{index:>5}  {:>10}  {:<15}  {:>6}  {:>6}",
            class.block_size(),
            format!("{}..{}", partition.start, partition.end),
            class.stride(),
            class.block_count(),
        );
    }
    let _ = writeln!(
        out,
        "used {} of {} bytes",
        pool.used_bytes(),
        pool.capacity()
    );
    out
}

/// Allocates every block of the pool and counts the blocks per size class.
///
/// One-byte requests fit every class, so they drain the classes from the
/// smallest block size up.
fn drain_classes(pool: &mut PoolAllocator) -> (Vec<Drained>, Vec<BlockHandle>) {
    let partitions = pool
        .size_classes()
        .iter()
        .map(pool_alloc::SizeClass::partition)
        .collect::<Vec<_>>();
    let mut drained = (0..partitions.len())
        .map(|class_index| Drained {
            class_index,
            blocks: 0,
        })
        .collect::<Vec<_>>();
    let mut handles = Vec::new();
    while let Some(handle) = pool.allocate(1) {
        let header = handle.offset().header_offset();
        if let Some(index) = partitions.iter().position(|p| p.contains(&header)) {
            drained[index].blocks += 1;
        }
        handles.push(handle);
    }
    (drained, handles)
}

fn exhaust(pool: &mut PoolAllocator) -> Result<Vec<Drained>, InspectError> {
    let (drained, handles) = drain_classes(pool);
    for (counted, class) in drained.iter().zip(pool.size_classes()) {
        ensure!(
            counted.blocks == class.block_count(),
            BlockCountSnafu {
                class_index: counted.class_index,
                expected: class.block_count(),
                actual: counted.blocks,
            }
        );
    }

    log::debug!("releasing {} blocks", handles.len());
    for handle in handles.into_iter().rev() {
        pool.release(handle);
    }

    let (again, _) = drain_classes(pool);
    for (first, second) in drained.iter().zip(&again) {
        ensure!(
            first == second,
            BlockCountSnafu {
                class_index: first.class_index,
                expected: first.blocks,
                actual: second.blocks,
            }
        );
    }
    Ok(drained)
}

#[snafu::report]
fn main() -> Result<(), InspectError> {
    let args: Args = argh::from_env();
    init_logger(args.verbose);

    let mut pool = PoolAllocator::new(&args.sizes).context(LayoutSnafu {
        count: args.sizes.len(),
    })?;
    print!("{}", render_table(&pool));

    if args.exhaust {
        for drained in exhaust(&mut pool)? {
            println!(
                "class {}: handed out {} blocks",
                drained.class_index, drained.blocks
            );
        }
    }
    Ok(())
}
