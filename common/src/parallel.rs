//! Concurrency-limited parallel iteration utilities.
//!
//! Wraps rayon's `par_iter` so that at most a fixed number of items are in
//! flight at once, which bounds the memory held by decoded tile planes.

use rayon::prelude::*;

/// Runs `f` for every item, in parallel batches of `max_concurrent`.
///
/// Stops at the first batch that contains an error and returns it. Items in
/// the failing batch may still have run, and their side effects are not undone.
///
/// # Panics
///
/// Panics if `max_concurrent` is 0.
pub fn try_par_for_each_limited<T, E, F>(items: &[T], max_concurrent: usize, f: F) -> Result<(), E>
where
    T: Sync,
    E: Send,
    F: Fn(&T) -> Result<(), E> + Sync,
{
    assert!(max_concurrent > 0, "max_concurrent must be > 0");

    for chunk in items.chunks(max_concurrent) {
        chunk.par_iter().try_for_each(&f)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    #[should_panic(expected = "max_concurrent must be > 0")]
    fn test_zero_concurrency_panics() {
        let _: Result<(), ()> = try_par_for_each_limited(&[1, 2, 3], 0, |_| Ok(()));
    }

    #[test]
    fn test_concurrency_cap() {
        let items: Vec<i32> = (0..20).collect();
        let in_flight = AtomicUsize::new(0);
        let max_observed = AtomicUsize::new(0);

        let result: Result<(), ()> = try_par_for_each_limited(&items, 3, |_| {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_observed.fetch_max(current, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(result.is_ok());
        let max = max_observed.load(Ordering::SeqCst);
        assert!(max <= 3, "max in-flight was {max}, expected <= 3");
    }

    #[test]
    fn test_try_par_for_each_limited_visits_all() {
        let items: Vec<usize> = (0..37).collect();
        let sum = AtomicUsize::new(0);
        let result: Result<(), ()> = try_par_for_each_limited(&items, 4, |&x| {
            sum.fetch_add(x, Ordering::SeqCst);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(sum.load(Ordering::SeqCst), (0..37).sum::<usize>());
    }

    #[test]
    fn test_try_par_for_each_limited_stops_after_failing_batch() {
        let items: Vec<usize> = (0..12).collect();
        let visited = AtomicUsize::new(0);
        let result = try_par_for_each_limited(&items, 4, |&x| {
            visited.fetch_add(1, Ordering::SeqCst);
            if x == 2 {
                Err(x)
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err(2));
        // Only the first batch of four can have run.
        assert!(visited.load(Ordering::SeqCst) <= 4);
    }
}
