//! Multi-threaded buffer pool benchmark.
//! Each session repeatedly fetches a random page, touches its bytes and
//! unpins it. The page set is larger than the pool so a share of fetches
//! miss and go through eviction.
use byte_unit::{Byte, ParseError};
use clap::Parser;
use easy_parallel::Parallel;
use lodestone_buffer::prelude::*;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn main() {
    let args = Args::parse();

    let temp_dir = TempDir::new().unwrap();
    let pool = BufferPoolConfig::default()
        .with_main_dir(temp_dir.path())
        .pool_mem_size(args.pool_mem_size as u64)
        .build()
        .unwrap();
    println!("pool size is {} frames", pool.pool_size());

    // Preload the page set.
    for _ in 0..args.pages {
        let (page_id, page) = pool.new_page().unwrap().expect("pool exhausted");
        page.write()[..4].copy_from_slice(&page_id.to_le_bytes());
        pool.unpin_page(page_id, true);
    }
    pool.flush_all_pages().unwrap();

    let stop = AtomicBool::new(false);
    let start = Instant::now();
    let (counts, _) = Parallel::new()
        .each(0..args.sessions, |_| {
            let mut rng = rand::rng();
            let mut ops = 0usize;
            while !stop.load(Ordering::Relaxed) {
                let page_id = rng.random_range(0..args.pages) as PageId;
                match pool.fetch_page(page_id).unwrap() {
                    Some(page) => {
                        if rng.random_range(0..100) < args.write_pct {
                            page.write()[4] = page_id as u8;
                            pool.unpin_page(page_id, true);
                        } else {
                            assert_eq!(&page.read()[..4], &page_id.to_le_bytes());
                            pool.unpin_page(page_id, false);
                        }
                        ops += 1;
                    }
                    None => std::thread::yield_now(),
                }
            }
            ops
        })
        .finish(|| {
            std::thread::sleep(Duration::from_secs(args.duration));
            stop.store(true, Ordering::Relaxed);
        });
    let elapsed = start.elapsed();

    let total: usize = counts.iter().sum();
    let stats = pool.stats();
    println!(
        "sessions={}, pages={}, elapsed={:?}, ops={}, ops/s={:.0}",
        args.sessions,
        args.pages,
        elapsed,
        total,
        total as f64 / elapsed.as_secs_f64(),
    );
    println!(
        "hits={}, misses={}, evictions={}, dirty_writebacks={}, disk_reads={}, disk_writes={}",
        stats.fetch_hits,
        stats.fetch_misses,
        stats.evictions,
        stats.dirty_writebacks,
        stats.disk_reads,
        stats.disk_writes,
    );
}

#[derive(Parser, Debug)]
#[command(about = "buffer pool fetch/unpin benchmark")]
struct Args {
    /// Number of worker threads.
    #[arg(long, default_value = "4")]
    sessions: usize,

    /// Number of pages preloaded into the database file.
    #[arg(long, default_value = "8192")]
    pages: usize,

    #[arg(long, default_value = "16MiB", value_parser = parse_byte_size)]
    pool_mem_size: usize,

    /// Benchmark duration in seconds.
    #[arg(long, default_value = "5")]
    duration: u64,

    /// Percentage of fetches that modify the page.
    #[arg(long, default_value = "20")]
    write_pct: u32,
}

#[inline]
fn parse_byte_size(input: &str) -> std::result::Result<usize, ParseError> {
    Byte::parse_str(input, true).map(|b| b.as_u64() as usize)
}
