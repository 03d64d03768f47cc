use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use rand::Rng;

use super::encoding::{check_exponent, rescale_factor, EncodedNumber};
use super::keys::PublicKey;
use super::CryptoError;

/// Ciphertext of an [`EncodedNumber`] under a shared public key.
#[derive(Clone)]
pub struct EncryptedNumber {
    public_key: Arc<PublicKey>,
    ciphertext: BigUint,
    exponent: i32,
}

impl fmt::Debug for EncryptedNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EncryptedNumber")
            .field("public_key", &self.public_key)
            .field("exponent", &self.exponent)
            .finish()
    }
}

impl EncryptedNumber {
    /// Wraps a ciphertext read from storage. It must be a non-zero residue mod `n²`
    /// with an exponent of magnitude at most `MAX_EXPONENT`.
    pub fn new(
        public_key: Arc<PublicKey>,
        ciphertext: BigUint,
        exponent: i32,
    ) -> Result<Self, CryptoError> {
        if ciphertext.is_zero() || ciphertext >= *public_key.n_square() {
            return Err(CryptoError::MalformedCiphertext(
                "ciphertext is not a residue modulo n²".into(),
            ));
        }
        check_exponent(exponent)?;
        Ok(Self::from_parts(public_key, ciphertext, exponent))
    }

    pub(crate) fn from_parts(public_key: Arc<PublicKey>, ciphertext: BigUint, exponent: i32) -> Self {
        EncryptedNumber {
            public_key,
            ciphertext,
            exponent,
        }
    }

    pub fn encrypt<R: Rng + ?Sized>(
        public_key: &Arc<PublicKey>,
        encoded: &EncodedNumber,
        rng: &mut R,
    ) -> Self {
        let ciphertext = public_key.raw_encrypt(encoded.encoding()) * public_key.obfuscator(rng)
            % public_key.n_square();
        Self::from_parts(Arc::clone(public_key), ciphertext, encoded.exponent())
    }

    pub fn encrypt_u64<R: Rng + ?Sized>(
        public_key: &Arc<PublicKey>,
        value: u64,
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        let encoded = EncodedNumber::encode_u64(public_key, value)?;
        Ok(Self::encrypt(public_key, &encoded, rng))
    }

    pub fn encrypt_f64<R: Rng + ?Sized>(
        public_key: &Arc<PublicKey>,
        value: f64,
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        let encoded = EncodedNumber::encode_f64(public_key, value)?;
        Ok(Self::encrypt(public_key, &encoded, rng))
    }

    #[inline]
    pub fn public_key(&self) -> &Arc<PublicKey> {
        &self.public_key
    }

    #[inline]
    pub fn ciphertext(&self) -> &BigUint {
        &self.ciphertext
    }

    #[inline]
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Re-randomizes the ciphertext without changing the plaintext.
    pub fn obfuscate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.ciphertext =
            &self.ciphertext * self.public_key.obfuscator(rng) % self.public_key.n_square();
    }

    /// Same plaintext with a smaller exponent.
    pub fn decrease_exponent_to(&self, exponent: i32) -> Result<Self, CryptoError> {
        let factor = rescale_factor(self.exponent, exponent)?;
        let ciphertext = self
            .ciphertext
            .modpow(&factor, self.public_key.n_square());
        Ok(Self::from_parts(
            Arc::clone(&self.public_key),
            ciphertext,
            exponent,
        ))
    }

    /// Homomorphic addition. Both operands must share a public key.
    pub fn checked_add(&self, other: &EncryptedNumber) -> Result<Self, CryptoError> {
        if self.public_key != other.public_key {
            return Err(CryptoError::KeyMismatch);
        }

        let exponent = self.exponent.min(other.exponent);
        let lhs = self.decrease_exponent_to(exponent)?;
        let rhs = other.decrease_exponent_to(exponent)?;
        let ciphertext = lhs.ciphertext * rhs.ciphertext % self.public_key.n_square();
        Ok(Self::from_parts(
            Arc::clone(&self.public_key),
            ciphertext,
            exponent,
        ))
    }

    /// Multiplication by a plaintext scalar encoded under the same key.
    pub fn mul_encoded(&self, scalar: &EncodedNumber) -> Result<Self, CryptoError> {
        let n = self.public_key.n();
        let n_square = self.public_key.n_square();
        if scalar.encoding() >= n {
            return Err(CryptoError::InvalidScalar("encoding exceeds the modulus".into()));
        }

        let exponent = self
            .exponent
            .checked_add(scalar.exponent())
            .and_then(|exponent| check_exponent(exponent).ok())
            .ok_or(CryptoError::Overflow)?;

        let ciphertext = if *scalar.encoding() >= n - self.public_key.max_int() {
            let inverse = self.ciphertext.modinv(n_square).ok_or_else(|| {
                CryptoError::MalformedCiphertext("ciphertext is not invertible".into())
            })?;
            inverse.modpow(&(n - scalar.encoding()), n_square)
        } else {
            self.ciphertext.modpow(scalar.encoding(), n_square)
        };

        Ok(Self::from_parts(
            Arc::clone(&self.public_key),
            ciphertext,
            exponent,
        ))
    }

    pub fn mul_u64(&self, scalar: u64) -> Result<Self, CryptoError> {
        self.mul_encoded(&EncodedNumber::encode_u64(&self.public_key, scalar)?)
    }

    pub fn mul_f64(&self, scalar: f64) -> Result<Self, CryptoError> {
        self.mul_encoded(&EncodedNumber::encode_f64(&self.public_key, scalar)?)
    }

    /// Multiplication by `1 / divisor`.
    pub fn div_f64(&self, divisor: f64) -> Result<Self, CryptoError> {
        if divisor == 0.0 {
            return Err(CryptoError::InvalidScalar("division by zero".into()));
        }
        self.mul_f64(1.0 / divisor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::{generate_keypair, PrivateKey, MAX_EXPONENT};

    fn keypair() -> (Arc<PublicKey>, PrivateKey) {
        generate_keypair(128, &mut rand::thread_rng()).unwrap()
    }

    #[test]
    fn addition() {
        let mut rng = rand::thread_rng();
        let (public_key, private_key) = keypair();

        let a = EncryptedNumber::encrypt_u64(&public_key, 3, &mut rng).unwrap();
        let b = EncryptedNumber::encrypt_u64(&public_key, 4, &mut rng).unwrap();
        assert_eq!(private_key.decrypt(&a.checked_add(&b).unwrap()).unwrap(), 7.0);

        let c = EncryptedNumber::encrypt_f64(&public_key, 1.5, &mut rng).unwrap();
        let d = EncryptedNumber::encrypt_f64(&public_key, -2.0, &mut rng).unwrap();
        assert_eq!(private_key.decrypt(&c.checked_add(&a).unwrap()).unwrap(), 4.5);
        assert_eq!(private_key.decrypt(&c.checked_add(&d).unwrap()).unwrap(), -0.5);
    }

    #[test]
    fn scalar_products() {
        let mut rng = rand::thread_rng();
        let (public_key, private_key) = keypair();

        let three = EncryptedNumber::encrypt_u64(&public_key, 3, &mut rng).unwrap();
        assert_eq!(private_key.decrypt(&three.mul_u64(5).unwrap()).unwrap(), 15.0);
        assert_eq!(private_key.decrypt(&three.mul_u64(0).unwrap()).unwrap(), 0.0);
        assert_eq!(private_key.decrypt(&three.mul_f64(-2.0).unwrap()).unwrap(), -6.0);

        let seven = EncryptedNumber::encrypt_u64(&public_key, 7, &mut rng).unwrap();
        assert_eq!(private_key.decrypt(&seven.div_f64(2.0).unwrap()).unwrap(), 3.5);
        assert!(seven.div_f64(0.0).is_err());
    }

    #[test]
    fn obfuscation_keeps_the_plaintext() {
        let mut rng = rand::thread_rng();
        let (public_key, private_key) = keypair();

        let mut number = EncryptedNumber::encrypt_u64(&public_key, 42, &mut rng).unwrap();
        let before = number.ciphertext().clone();
        number.obfuscate(&mut rng);
        assert_ne!(*number.ciphertext(), before);
        assert_eq!(private_key.decrypt(&number).unwrap(), 42.0);
    }

    #[test]
    fn operands_must_share_a_key() {
        let mut rng = rand::thread_rng();
        let (public_key, _) = keypair();
        let (other_key, _) = keypair();

        let a = EncryptedNumber::encrypt_u64(&public_key, 1, &mut rng).unwrap();
        let b = EncryptedNumber::encrypt_u64(&other_key, 1, &mut rng).unwrap();
        assert_eq!(a.checked_add(&b).unwrap_err(), CryptoError::KeyMismatch);
    }

    #[test]
    fn rejects_out_of_range_ciphertexts() {
        let (public_key, _) = keypair();
        let n_square = public_key.n_square().clone();

        assert!(EncryptedNumber::new(Arc::clone(&public_key), BigUint::zero(), 0).is_err());
        assert!(EncryptedNumber::new(Arc::clone(&public_key), n_square.clone(), 0).is_err());
        assert!(EncryptedNumber::new(public_key, n_square - 1u32, 0).is_ok());
    }

    #[test]
    fn corrupt_exponents_are_errors() {
        let mut rng = rand::thread_rng();
        let (public_key, _) = keypair();
        let ciphertext = EncryptedNumber::encrypt_u64(&public_key, 1, &mut rng)
            .unwrap()
            .ciphertext()
            .clone();

        for &exponent in &[i32::MIN, i32::MAX, MAX_EXPONENT + 1, -MAX_EXPONENT - 1] {
            assert!(matches!(
                EncryptedNumber::new(Arc::clone(&public_key), ciphertext.clone(), exponent),
                Err(CryptoError::MalformedCiphertext(_))
            ));
        }

        let high = EncryptedNumber::from_parts(Arc::clone(&public_key), ciphertext.clone(), i32::MAX);
        let low = EncryptedNumber::from_parts(Arc::clone(&public_key), ciphertext, i32::MIN);
        assert!(matches!(
            high.checked_add(&low),
            Err(CryptoError::MalformedCiphertext(_))
        ));
        assert!(matches!(
            high.decrease_exponent_to(0),
            Err(CryptoError::MalformedCiphertext(_))
        ));

        let edge = EncryptedNumber::encrypt_u64(&public_key, 2, &mut rng)
            .unwrap()
            .decrease_exponent_to(-MAX_EXPONENT)
            .unwrap();
        assert_eq!(edge.div_f64(3.0).unwrap_err(), CryptoError::Overflow);
    }
}
