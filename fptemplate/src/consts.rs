use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/*pub(crate)*/
static LENGTH_STEP: AtomicU64 = AtomicU64::new(0x4028_0000_0000_0000); // 12.0
/*pub(crate)*/
static ANGLE_STEP_DIVISOR: AtomicU64 = AtomicU64::new(0x4024_0000_0000_0000); // 10.0
/*pub(crate)*/
static IMAGE_WIDTH: AtomicU32 = AtomicU32::new(504);
/*pub(crate)*/
static IMAGE_HEIGHT: AtomicU32 = AtomicU32::new(480);

/// Number of slots in an index vector.
pub const INDEX_SIZE: usize = (1 << 16) - 1;

/// Modulus length of a freshly generated Paillier key pair.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Number of distinct images required to enroll an identity.
pub const ENROLLMENT_IMAGES: usize = 3;

pub(crate) const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

pub fn length_step() -> f64 {
    f64::from_bits(LENGTH_STEP.load(Ordering::Relaxed))
}

pub fn set_length_step(step: f64) {
    LENGTH_STEP.store(step.to_bits(), Ordering::SeqCst)
}

/// The angle step is `π / divisor`.
pub fn angle_step() -> f64 {
    std::f64::consts::PI / f64::from_bits(ANGLE_STEP_DIVISOR.load(Ordering::Relaxed))
}

pub fn set_angle_step_divisor(divisor: f64) {
    ANGLE_STEP_DIVISOR.store(divisor.to_bits(), Ordering::SeqCst)
}

pub fn image_width() -> u32 {
    IMAGE_WIDTH.load(Ordering::Relaxed)
}

pub fn image_height() -> u32 {
    IMAGE_HEIGHT.load(Ordering::Relaxed)
}

pub fn set_image_size(width: u32, height: u32) {
    IMAGE_WIDTH.store(width, Ordering::SeqCst);
    IMAGE_HEIGHT.store(height, Ordering::SeqCst);
}

/// Largest distance two minutiae on the same image can have.
pub fn max_distance() -> f64 {
    (image_width() as f64).hypot(image_height() as f64)
}
