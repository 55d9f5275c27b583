//! Benchmark workloads for Tether shared handles.
//!
//! - [`fan_out`]: clone one handle into many owners
//! - [`churn`]: repeatedly clone and drop a handle on the calling thread
//! - [`contended_churn`]: the same churn from several threads at once

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::thread;

use tether::Shared;

/// Clone `root` into `owners` independent handles.
pub fn fan_out<T>(root: &Shared<T>, owners: usize) -> Vec<Shared<T>> {
    (0..owners).map(|_| root.clone()).collect()
}

/// Clone and immediately drop `root` `rounds` times. Returns the last
/// observed use count so the work cannot be optimised away.
pub fn churn<T>(root: &Shared<T>, rounds: usize) -> usize {
    let mut last = 0;
    for _ in 0..rounds {
        let copy = root.clone();
        last = copy.use_count();
    }
    last
}

/// Run [`churn`] on `threads` scoped threads sharing `root`.
///
/// # Panics
///
/// Panics if any worker panics.
pub fn contended_churn<T: Send + Sync>(root: &Shared<T>, threads: usize, rounds: usize) -> usize {
    thread::scope(|s| {
        let workers: Vec<_> = (0..threads)
            .map(|_| s.spawn(move || churn(root, rounds)))
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().expect("churn worker panicked"))
            .max()
            .unwrap_or(0)
    })
}
