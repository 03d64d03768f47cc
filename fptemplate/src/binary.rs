//! Fixed-width bit-string representation of quantized pairs.

use std::collections::HashSet;
use std::convert::TryFrom;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::consts::{angle_step, length_step, max_distance, TWO_PI};
use crate::error::TemplateError;
use crate::find_pairs::PairSet;
use crate::math::bits_for_buckets;
use crate::types::{MinutiaKind, QuantizedPair};

/// Widths of the binary fields of an encoded pair.
///
/// The distance and both angles are zero-padded binary numbers, followed by the
/// two type codes written as decimal digits.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BinaryLayout {
    pub length_bits: usize,
    pub angle_bits: usize,
}

impl BinaryLayout {
    pub fn new(max_distance: f64, length_step: f64, angle_step: f64) -> Self {
        BinaryLayout {
            length_bits: bits_for_buckets(max_distance, length_step),
            angle_bits: bits_for_buckets(TWO_PI, angle_step),
        }
    }

    /// Layout for the image geometry and steps configured in [`crate::consts`].
    pub fn current() -> Self {
        Self::new(max_distance(), length_step(), angle_step())
    }

    /// Length of an encoded pair whose features fit their fields.
    pub fn encoded_len(&self) -> usize {
        self.length_bits + 2 * self.angle_bits + 2
    }

    pub fn encode(&self, pair: &QuantizedPair) -> String {
        format!(
            "{:0lw$b}{:0aw$b}{:0aw$b}{}{}",
            pair.length,
            pair.alpha_i,
            pair.alpha_j,
            pair.kind_i,
            pair.kind_j,
            lw = self.length_bits,
            aw = self.angle_bits
        )
    }

    /// Recovers the quantized features from an encoded pair of [`Self::encoded_len`] characters.
    pub fn decode(&self, bits: &str) -> Result<QuantizedPair, TemplateError> {
        if bits.len() != self.encoded_len() || !is_bit_string(bits) {
            return Err(TemplateError::InvalidInput(format!(
                "{:?} is not a {}-bit encoded pair",
                bits,
                self.encoded_len()
            )));
        }

        let field = |range: std::ops::Range<usize>| {
            u32::from_str_radix(&bits[range], 2)
                .map_err(|err| TemplateError::InvalidInput(err.to_string()))
        };
        let kind = |at: usize| MinutiaKind::try_from(bits.as_bytes()[at] - b'0');

        let angles_at = self.length_bits;
        let kinds_at = angles_at + 2 * self.angle_bits;
        Ok(QuantizedPair::new(
            field(0..angles_at)?,
            field(angles_at..angles_at + self.angle_bits)?,
            field(angles_at + self.angle_bits..kinds_at)?,
            kind(kinds_at)?,
            kind(kinds_at + 1)?,
        ))
    }
}

#[inline]
fn is_bit_string(bits: &str) -> bool {
    !bits.is_empty() && bits.bytes().all(|b| b == b'0' || b == b'1')
}

/// Encodes every pair of the set.
pub fn encode_pairs(layout: &BinaryLayout, pairs: &PairSet) -> Vec<String> {
    let pairs: Vec<&QuantizedPair> = pairs.iter().collect();
    pairs.par_iter().map(|pair| layout.encode(pair)).collect()
}

/// One bit string per line.
pub fn serialize(encoded: &[String]) -> String {
    let mut record = String::with_capacity(encoded.iter().map(|it| it.len() + 1).sum());
    for bits in encoded {
        record.push_str(bits);
        record.push('\n');
    }
    record
}

pub fn deserialize(record: &str) -> Result<Vec<String>, TemplateError> {
    record
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if is_bit_string(line) {
                Ok(line.to_string())
            } else {
                Err(TemplateError::InvalidInput(format!(
                    "binary record holds a non-binary line {:?}",
                    line
                )))
            }
        })
        .collect()
}

/// Fraction of query strings present in the reference.
pub fn match_binary(reference: &[String], query: &[String]) -> Result<f64, TemplateError> {
    if query.is_empty() {
        return Err(TemplateError::DivisionByZero);
    }

    let reference: HashSet<&str> = reference.iter().map(String::as_str).collect();
    let matches = query
        .iter()
        .filter(|bits| reference.contains(bits.as_str()))
        .count();

    Ok(matches as f64 / query.len() as f64)
}
