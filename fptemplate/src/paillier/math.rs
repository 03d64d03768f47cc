use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;

const SMALL_PRIMES: [u32; 46] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199, 211,
];

/// Miller-Rabin rounds for key generation.
const ROUNDS: usize = 40;

/// `L(x) = (x - 1) / n`.
#[inline]
pub fn l_function(x: &BigUint, n: &BigUint) -> BigUint {
    (x - 1u32) / n
}

#[inline]
pub fn mod_inverse(a: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    a.modinv(modulus)
}

#[inline]
pub fn lcm(a: &BigUint, b: &BigUint) -> BigUint {
    a.lcm(b)
}

pub fn is_probable_prime<R: Rng + ?Sized>(candidate: &BigUint, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    if *candidate < two {
        return false;
    }
    for &p in SMALL_PRIMES.iter() {
        let p = BigUint::from(p);
        if *candidate == p {
            return true;
        }
        if (candidate % &p).is_zero() {
            return false;
        }
    }
    if candidate.is_even() {
        return *candidate == two;
    }

    let one = BigUint::one();
    let minus_one = candidate - 1u32;
    let shift = minus_one.trailing_zeros().unwrap_or(0);
    let d = &minus_one >> shift;

    'witness: for _ in 0..ROUNDS {
        let a = rng.gen_biguint_range(&two, &minus_one);
        let mut x = a.modpow(&d, candidate);
        if x == one || x == minus_one {
            continue;
        }
        for _ in 1..shift {
            x = x.modpow(&two, candidate);
            if x == minus_one {
                continue 'witness;
            }
            if x == one {
                return false;
            }
        }
        return false;
    }
    true
}

/// Random prime of exactly `bits` bits with the two top bits set, so the
/// product of two such primes has exactly `2 * bits` bits.
pub fn generate_prime<R: Rng + ?Sized>(bits: u64, rng: &mut R) -> BigUint {
    assert!(bits >= 8);
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(bits - 2, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate, rng) {
            return candidate;
        }
    }
}
