//! Presence index over binary-encoded pairs.

use fixedbitset::FixedBitSet;

use crate::consts::INDEX_SIZE;
use crate::error::TemplateError;

/// Fixed-size bit vector with [`INDEX_SIZE`] slots.
#[derive(Clone, Eq, PartialEq)]
pub struct IndexVector {
    slots: FixedBitSet,
}

impl std::fmt::Debug for IndexVector {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("IndexVector")
            .field("ones", &self.count_ones())
            .finish()
    }
}

impl Default for IndexVector {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexVector {
    pub fn new() -> Self {
        IndexVector {
            slots: FixedBitSet::with_capacity(INDEX_SIZE),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_clear()
    }

    /// Panics when `slot` is not below [`INDEX_SIZE`].
    #[inline]
    pub fn set(&mut self, slot: usize) {
        self.slots.insert(slot);
    }

    #[inline]
    pub fn get(&self, slot: usize) -> bool {
        self.slots.contains(slot)
    }

    pub fn count_ones(&self) -> usize {
        self.slots.count_ones(..)
    }

    /// Number of slots set in both vectors.
    pub fn count_common(&self, other: &IndexVector) -> usize {
        self.slots.intersection_count(&other.slots)
    }

    /// Every slot in order.
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..INDEX_SIZE).map(move |slot| self.slots.contains(slot))
    }
}

/// Slot of a bit string: its unsigned value modulo [`INDEX_SIZE`].
#[inline]
pub fn slot_of(bits: &str) -> Result<usize, TemplateError> {
    bits.bytes().try_fold(0usize, |acc, b| match b {
        b'0' | b'1' => Ok((acc * 2 + (b - b'0') as usize) % INDEX_SIZE),
        _ => Err(TemplateError::InvalidInput(format!(
            "{:?} is not a bit string",
            bits
        ))),
    })
}

/// Marks the slot of every encoded pair. Colliding pairs share a slot.
pub fn build_index(encoded: &[String]) -> Result<IndexVector, TemplateError> {
    let mut index = IndexVector::new();
    for bits in encoded {
        index.set(slot_of(bits)?);
    }
    Ok(index)
}

/// A single line of space-separated `0`/`1` tokens.
pub fn serialize(index: &IndexVector) -> String {
    let mut record = String::with_capacity(INDEX_SIZE * 2);
    for (slot, bit) in index.bits().enumerate() {
        if slot > 0 {
            record.push(' ');
        }
        record.push(if bit { '1' } else { '0' });
    }
    record
}

pub fn deserialize(record: &str) -> Result<IndexVector, TemplateError> {
    let mut index = IndexVector::new();
    let mut slots = 0;
    for token in record.split_whitespace() {
        if slots == INDEX_SIZE {
            return Err(TemplateError::InvalidInput(format!(
                "index record holds more than {} slots",
                INDEX_SIZE
            )));
        }
        match token {
            "0" => {}
            "1" => index.set(slots),
            _ => {
                return Err(TemplateError::InvalidInput(format!(
                    "index slot {} holds {:?}",
                    slots, token
                )))
            }
        }
        slots += 1;
    }

    if slots != INDEX_SIZE {
        return Err(TemplateError::InvalidInput(format!(
            "index record holds {} slots instead of {}",
            slots, INDEX_SIZE
        )));
    }
    Ok(index)
}

/// `popcount(reference AND query) / popcount(query)`.
pub fn match_index(reference: &IndexVector, query: &IndexVector) -> Result<f64, TemplateError> {
    let ones = query.count_ones();
    if ones == 0 {
        return Err(TemplateError::DivisionByZero);
    }
    Ok(reference.count_common(query) as f64 / ones as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(slot: usize) -> IndexVector {
        let mut index = IndexVector::new();
        index.set(slot);
        index
    }

    #[test]
    fn slots_wrap_modulo_index_size() {
        assert_eq!(slot_of("101").unwrap(), 5);
        assert_eq!(slot_of(&format!("{:b}", INDEX_SIZE)).unwrap(), 0);
        assert_eq!(slot_of(&format!("{:b}", INDEX_SIZE + 7)).unwrap(), 7);
        assert!(slot_of("10a").is_err());
    }

    #[test]
    fn colliding_pairs_share_a_slot() {
        let encoded = vec![
            format!("{:b}", 3),
            format!("{:b}", INDEX_SIZE + 3),
            format!("{:b}", 9),
        ];
        let index = build_index(&encoded).unwrap();
        assert_eq!(index.count_ones(), 2);
        assert!(index.get(3) && index.get(9));
    }

    #[test]
    fn record_round_trip() {
        let mut index = single(0);
        index.set(INDEX_SIZE - 1);
        index.set(12345);

        let record = serialize(&index);
        assert_eq!(record.split(' ').count(), INDEX_SIZE);
        assert_eq!(deserialize(&record).unwrap(), index);
        assert_eq!(deserialize(&format!("{} \n", record)).unwrap(), index);
    }

    #[test]
    fn rejects_malformed_records() {
        assert!(deserialize("0 1 0").is_err());
        let record = serialize(&IndexVector::new());
        assert!(deserialize(&format!("{} 0", record)).is_err());
        assert!(deserialize(&record.replacen("0", "2", 1)).is_err());
    }

    #[test]
    fn counts_set_slots() {
        let mut first = single(3);
        first.set(INDEX_SIZE - 1);
        first.set(700);
        let mut second = single(700);
        second.set(INDEX_SIZE - 1);

        assert_eq!(first.len(), INDEX_SIZE);
        assert_eq!(first.count_ones(), 3);
        assert_eq!(first.count_common(&second), 2);
        assert!(!first.get(4) && first.get(INDEX_SIZE - 1));
        assert!(IndexVector::new().is_empty() && !first.is_empty());
        assert_eq!(first.bits().filter(|&bit| bit).count(), 3);
    }

    #[test]
    #[should_panic]
    fn slots_stop_at_index_size() {
        IndexVector::new().set(INDEX_SIZE);
    }

    #[test]
    fn self_match_is_one() {
        let mut index = single(17);
        index.set(4000);
        assert_eq!(match_index(&index, &index).unwrap(), 1.0);
    }

    #[test]
    fn single_bit_queries() {
        let query = single(42);
        assert_eq!(match_index(&single(42), &query).unwrap(), 1.0);
        assert_eq!(match_index(&IndexVector::new(), &query).unwrap(), 0.0);
        assert!(matches!(
            match_index(&query, &IndexVector::new()),
            Err(TemplateError::DivisionByZero)
        ));
    }
}
