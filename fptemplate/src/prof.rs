use std::panic::Location;
use std::time::Instant;

/// Runs `f` and reports its duration, tagged with the caller location, at `trace` level.
#[track_caller]
#[inline]
pub fn timeit<T>(f: impl FnOnce() -> T) -> T {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return f();
    }

    let location = Location::caller();
    let start = Instant::now();
    let result = f();
    tracing::trace!(
        elapsed = ?start.elapsed(),
        "{}:{}",
        location.file(),
        location.line()
    );

    result
}
