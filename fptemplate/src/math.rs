use crate::consts::TWO_PI;

/// Difference `theta1 - theta2` shifted into `[0, 2π)`.
///
/// Differences of `2π` or more are reflected as `2π - diff`. Both inputs are
/// expected in `[0, 2π)`, so this branch only sees out-of-range orientations.
#[inline]
pub(crate) fn angle_diff(theta1: f64, theta2: f64) -> f64 {
    let diff = theta1 - theta2;
    if diff < 0.0 {
        diff + TWO_PI
    } else if diff >= TWO_PI {
        TWO_PI - diff
    } else {
        diff
    }
}

/// Orientation of the line from the origin to `(dx, dy)`, turned by π and kept in `[0, 2π)`.
#[inline]
pub(crate) fn line_orientation(dx: i32, dy: i32) -> f64 {
    let phi = std::f64::consts::PI + f64::atan2(dy as f64, dx as f64);
    if phi >= TWO_PI {
        0.0
    } else {
        phi
    }
}

/// Smallest number of bits able to hold `floor(range / step)` distinct buckets.
#[inline]
pub(crate) fn bits_for_buckets(range: f64, step: f64) -> usize {
    let buckets = (range / step).floor();
    if buckets <= 1.0 {
        1
    } else {
        buckets.log2().ceil() as usize
    }
}
