use log::{info, warn};
use rayon::prelude::*;

/// Worker count for `--jobs`: zero means one per CPU core.
pub fn resolve_jobs(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

/// Maps `f` over `items` on a pool of `jobs` threads, preserving order.
///
/// Each worker state built by `init` is used by one thread at a time, so a
/// state that owns pipelines never shares them. With one job, or if the pool
/// cannot be built, everything runs on the calling thread with a single
/// state.
pub fn process_with_workers<T, W, R, I, F>(items: &[T], jobs: usize, init: I, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    I: Fn() -> W + Sync + Send,
    F: Fn(&mut W, &T) -> R + Sync + Send,
{
    let sequential = |items: &[T]| -> Vec<R> {
        let mut worker = init();
        items.iter().map(|item| f(&mut worker, item)).collect()
    };

    if jobs <= 1 {
        return sequential(items);
    }

    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => {
            info!("Processing {} files on {} threads", items.len(), jobs);
            pool.install(|| items.par_iter().map_init(&init, |worker, item| f(worker, item)).collect())
        }
        Err(e) => {
            warn!("Failed to build thread pool, processing sequentially: {}", e);
            sequential(items)
        }
    }
}
