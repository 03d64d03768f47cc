use std::collections::HashSet;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::types::{MinutiaPair, MinutiaPoint, Quantization, Quantize, QuantizedPair};
use crate::timeit;

/// Deduplicated set of quantized minutia pairs.
pub type PairSet = HashSet<QuantizedPair>;

/// Inserts both directions of every pair of minutiae on one image into `pairs`.
pub fn find_pairs(minutiae: &[MinutiaPoint], steps: &Quantization, pairs: &mut PairSet) {
    if minutiae.len() < 2 {
        return;
    }

    pairs.reserve(minutiae.len() * (minutiae.len() - 1));
    for i in 0..minutiae.len() - 1 {
        for j in i + 1..minutiae.len() {
            pairs.insert(MinutiaPair::new(&minutiae[i], &minutiae[j]).quantize(steps));
            pairs.insert(MinutiaPair::new(&minutiae[j], &minutiae[i]).quantize(steps));
        }
    }
}

/// Pair set of a single verification image.
pub fn synthesize_query(minutiae: &[MinutiaPoint]) -> PairSet {
    let steps = Quantization::current();
    let mut pairs = PairSet::new();
    timeit(|| find_pairs(minutiae, &steps, &mut pairs));
    pairs
}

/// Pair set pooled over every enrollment image of one finger.
///
/// Images are paired independently and merged afterwards.
pub fn synthesize_enrollment(images: &[Vec<MinutiaPoint>]) -> PairSet {
    let steps = Quantization::current();
    timeit(|| {
        images
            .par_iter()
            .map(|minutiae| {
                let mut pairs = PairSet::new();
                find_pairs(minutiae, &steps, &mut pairs);
                pairs
            })
            .reduce(PairSet::new, |mut merged, pairs| {
                if merged.len() < pairs.len() {
                    return merged.into_iter().fold(pairs, |mut acc, pair| {
                        acc.insert(pair);
                        acc
                    });
                }
                merged.extend(pairs);
                merged
            })
    })
}
