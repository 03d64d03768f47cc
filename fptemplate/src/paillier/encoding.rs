use std::convert::TryFrom;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{Float, ToPrimitive, Zero};

use super::keys::PublicKey;
use super::CryptoError;

/// Base of the plaintext exponent.
pub const BASE: u32 = 16;

/// Largest magnitude of a plaintext exponent. Every finite `f64` encodes within it.
pub const MAX_EXPONENT: i32 = 512;

const LOG2_BASE: i32 = 4;
const FLOAT_MANTISSA_BITS: i32 = 53;

#[inline]
pub(crate) fn check_exponent(exponent: i32) -> Result<i32, CryptoError> {
    if (-MAX_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
        Ok(exponent)
    } else {
        Err(CryptoError::MalformedCiphertext(format!(
            "exponent {} is out of range",
            exponent
        )))
    }
}

/// `BASE^(from - to)`, the factor that lowers an exponent from `from` to `to`.
pub(crate) fn rescale_factor(from: i32, to: i32) -> Result<BigUint, CryptoError> {
    check_exponent(from)?;
    check_exponent(to)?;
    if to > from {
        return Err(CryptoError::InvalidScalar(format!(
            "exponent {} is larger than {}",
            to, from
        )));
    }
    Ok(BigUint::from(BASE).pow((from - to) as u32))
}

/// Fixed-point plaintext: `value = mantissa * BASE^exponent`, with the signed
/// mantissa stored modulo `n`. Positive mantissas live in `[0, max_int]` and
/// negative ones in `[n - max_int, n)`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EncodedNumber {
    encoding: BigUint,
    exponent: i32,
}

impl EncodedNumber {
    pub fn from_parts(encoding: BigUint, exponent: i32) -> Self {
        EncodedNumber { encoding, exponent }
    }

    #[inline]
    pub fn encoding(&self) -> &BigUint {
        &self.encoding
    }

    #[inline]
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn encode_u64(public_key: &PublicKey, value: u64) -> Result<Self, CryptoError> {
        let encoding = BigUint::from(value);
        if encoding > *public_key.max_int() {
            return Err(CryptoError::Overflow);
        }
        Ok(EncodedNumber {
            encoding,
            exponent: 0,
        })
    }

    /// Encodes `value` exactly, choosing the largest exponent that keeps every
    /// bit of its mantissa.
    pub fn encode_f64(public_key: &PublicKey, value: f64) -> Result<Self, CryptoError> {
        if !value.is_finite() {
            return Err(CryptoError::InvalidScalar(format!("{} is not finite", value)));
        }

        let (mantissa, exp, sign) = Float::integer_decode(value);
        let significant = 64 - mantissa.leading_zeros() as i32;
        let lsb = if mantissa == 0 {
            -FLOAT_MANTISSA_BITS
        } else {
            exp as i32 + significant - FLOAT_MANTISSA_BITS
        };
        let exponent = Integer::div_floor(&lsb, &LOG2_BASE);

        let shift = exp as i32 - exponent * LOG2_BASE;
        let magnitude = if mantissa == 0 {
            BigUint::zero()
        } else {
            BigUint::from(mantissa) << shift as usize
        };
        if magnitude > *public_key.max_int() {
            return Err(CryptoError::Overflow);
        }

        let encoding = if sign < 0 && !magnitude.is_zero() {
            public_key.n() - magnitude
        } else {
            magnitude
        };
        Ok(EncodedNumber { encoding, exponent })
    }

    /// Signed mantissa as `(negative, magnitude)`.
    fn mantissa(&self, public_key: &PublicKey) -> Result<(bool, BigUint), CryptoError> {
        let n = public_key.n();
        if self.encoding >= *n {
            return Err(CryptoError::MalformedCiphertext(
                "encoding exceeds the modulus".into(),
            ));
        }
        if self.encoding <= *public_key.max_int() {
            Ok((false, self.encoding.clone()))
        } else if self.encoding >= n - public_key.max_int() {
            Ok((true, n - &self.encoding))
        } else {
            Err(CryptoError::Overflow)
        }
    }

    pub fn decode(&self, public_key: &PublicKey) -> Result<f64, CryptoError> {
        let (negative, magnitude) = self.mantissa(public_key)?;

        // keep the top 64 bits so the mantissa converts without saturating
        let shift = magnitude.bits().saturating_sub(64);
        let head = (&magnitude >> shift as usize)
            .to_f64()
            .ok_or(CryptoError::Overflow)?;
        let scale = i64::from(self.exponent) * i64::from(LOG2_BASE) + shift as i64;
        let scale = i32::try_from(scale).map_err(|_| CryptoError::Overflow)?;

        let value = head * 2f64.powi(scale);
        if value.is_infinite() {
            return Err(CryptoError::Overflow);
        }
        Ok(if negative { -value } else { value })
    }

    /// Same value with a smaller exponent.
    pub fn decrease_exponent_to(
        &self,
        public_key: &PublicKey,
        exponent: i32,
    ) -> Result<Self, CryptoError> {
        let factor = rescale_factor(self.exponent, exponent)?;
        Ok(EncodedNumber {
            encoding: (&self.encoding * factor) % public_key.n(),
            exponent,
        })
    }
}
