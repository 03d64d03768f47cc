use std::fmt;
use std::sync::Arc;

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;

use super::encoding::EncodedNumber;
use super::encrypted::EncryptedNumber;
use super::math::{generate_prime, l_function, lcm, mod_inverse};
use super::CryptoError;

/// Public half of a key pair. The generator is fixed to `n + 1`.
#[derive(Clone)]
pub struct PublicKey {
    n: BigUint,
    n_square: BigUint,
    max_int: BigUint,
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.n == other.n
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hex = self.n.to_str_radix(16);
        let tail = &hex[hex.len().saturating_sub(8)..];
        write!(f, "PublicKey({} bits, ..{})", self.n.bits(), tail)
    }
}

impl PublicKey {
    pub fn new(n: BigUint) -> Result<Self, CryptoError> {
        if n < BigUint::from(15u32) || n.is_even() {
            return Err(CryptoError::InvalidKey(format!(
                "{} is not a valid Paillier modulus",
                n
            )));
        }
        Ok(PublicKey {
            n_square: &n * &n,
            max_int: &n / 3u32,
            n,
        })
    }

    #[inline]
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    #[inline]
    pub fn n_square(&self) -> &BigUint {
        &self.n_square
    }

    /// Largest magnitude of a signed plaintext.
    #[inline]
    pub fn max_int(&self) -> &BigUint {
        &self.max_int
    }

    pub fn bits(&self) -> u64 {
        self.n.bits()
    }

    /// `r^n mod n²` for a random unit `r`.
    pub(crate) fn obfuscator<R: Rng + ?Sized>(&self, rng: &mut R) -> BigUint {
        loop {
            let r = rng.gen_biguint_range(&BigUint::one(), &self.n);
            if r.gcd(&self.n).is_one() {
                return r.modpow(&self.n, &self.n_square);
            }
        }
    }

    /// Ciphertext of `plaintext` without obfuscation: `(1 + n·m) mod n²`.
    #[inline]
    pub(crate) fn raw_encrypt(&self, plaintext: &BigUint) -> BigUint {
        (&self.n * plaintext + 1u32) % &self.n_square
    }
}

/// Private half of a key pair, holding the factorisation of `n`.
#[derive(Clone)]
pub struct PrivateKey {
    public_key: Arc<PublicKey>,
    p: BigUint,
    q: BigUint,
    lambda: BigUint,
    mu: BigUint,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PrivateKey({:?})", self.public_key)
    }
}

impl PrivateKey {
    pub fn from_primes(p: BigUint, q: BigUint) -> Result<Self, CryptoError> {
        if p == q || p.is_zero() || q.is_zero() {
            return Err(CryptoError::InvalidKey("p and q must be distinct primes".into()));
        }
        let public_key = Arc::new(PublicKey::new(&p * &q)?);
        let lambda = lcm(&(&p - 1u32), &(&q - 1u32));
        let n = public_key.n();
        let u = BigUint::from(1u32) + n;
        let l = l_function(&u.modpow(&lambda, public_key.n_square()), n);
        let mu = mod_inverse(&l, n)
            .ok_or_else(|| CryptoError::InvalidKey("L(g^λ) has no inverse mod n".into()))?;

        Ok(PrivateKey {
            public_key,
            p,
            q,
            lambda,
            mu,
        })
    }

    #[inline]
    pub fn public_key(&self) -> &Arc<PublicKey> {
        &self.public_key
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    pub(crate) fn raw_decrypt(&self, ciphertext: &BigUint) -> BigUint {
        let n = self.public_key.n();
        let u = ciphertext.modpow(&self.lambda, self.public_key.n_square());
        l_function(&u, n) * &self.mu % n
    }

    /// Decrypts to the encoded plaintext. Ciphertexts of another key are rejected.
    pub fn decrypt_encoded(&self, number: &EncryptedNumber) -> Result<EncodedNumber, CryptoError> {
        if **number.public_key() != *self.public_key {
            return Err(CryptoError::KeyMismatch);
        }
        let encoding = self.raw_decrypt(number.ciphertext());
        Ok(EncodedNumber::from_parts(encoding, number.exponent()))
    }

    pub fn decrypt(&self, number: &EncryptedNumber) -> Result<f64, CryptoError> {
        self.decrypt_encoded(number)?.decode(&self.public_key)
    }
}

/// Generates a key pair whose modulus has exactly `bits` bits.
pub fn generate_keypair<R: Rng + ?Sized>(
    bits: usize,
    rng: &mut R,
) -> Result<(Arc<PublicKey>, PrivateKey), CryptoError> {
    if bits < 32 || bits % 2 != 0 {
        return Err(CryptoError::InvalidKey(format!(
            "unsupported modulus length {}",
            bits
        )));
    }

    let half = (bits / 2) as u64;
    loop {
        let p = generate_prime(half, rng);
        let q = generate_prime(half, rng);
        if p == q {
            continue;
        }
        let private_key = PrivateKey::from_primes(p, q)?;
        if private_key.public_key().bits() == bits as u64 {
            return Ok((Arc::clone(private_key.public_key()), private_key));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textbook_key() {
        let private_key = PrivateKey::from_primes(BigUint::from(17u32), BigUint::from(19u32)).unwrap();
        let public_key = Arc::clone(private_key.public_key());
        assert_eq!(*public_key.n(), BigUint::from(323u32));

        let mut rng = rand::thread_rng();
        for value in 0..100u64 {
            let number = EncryptedNumber::encrypt_u64(&public_key, value, &mut rng).unwrap();
            assert_eq!(private_key.decrypt(&number).unwrap(), value as f64);
        }
    }

    #[test]
    fn generated_modulus_has_requested_length() {
        let mut rng = rand::thread_rng();
        let (public_key, private_key) = generate_keypair(128, &mut rng).unwrap();
        assert_eq!(public_key.bits(), 128);
        assert_eq!(&(private_key.p() * private_key.q()), public_key.n());
    }

    #[test]
    fn rejects_invalid_keys() {
        assert!(PublicKey::new(BigUint::from(16u32)).is_err());
        assert!(PrivateKey::from_primes(BigUint::from(17u32), BigUint::from(17u32)).is_err());
        assert!(generate_keypair(31, &mut rand::thread_rng()).is_err());
    }

    #[test]
    fn decrypting_with_another_key_fails() {
        let mut rng = rand::thread_rng();
        let (public_key, _) = generate_keypair(128, &mut rng).unwrap();
        let (_, other) = generate_keypair(128, &mut rng).unwrap();

        let number = EncryptedNumber::encrypt_u64(&public_key, 1, &mut rng).unwrap();
        assert_eq!(other.decrypt(&number), Err(CryptoError::KeyMismatch));
    }
}
