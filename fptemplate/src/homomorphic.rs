//! Paillier-encrypted index vectors and the encrypted dot-product protocol.
//!
//! A reference index is encrypted slot by slot under the enrolled identity's
//! public key. A verifier holding the encrypted reference and a plaintext
//! query computes `Σ Enc(r_i)·q_i / Σ q_i` on ciphertexts. Only the keyring
//! can decrypt the result.

use std::str::FromStr;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::One;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::INDEX_SIZE;
use crate::error::TemplateError;
use crate::index::IndexVector;
use crate::paillier::{CryptoError, EncodedNumber, EncryptedNumber, PublicKey};
use crate::timeit;

/// Encrypted reference index: one ciphertext per slot, all under one public key.
#[derive(Clone, Debug)]
pub struct EncryptedIndex {
    public_key: Arc<PublicKey>,
    features: Vec<EncryptedNumber>,
}

impl EncryptedIndex {
    #[inline]
    pub fn public_key(&self) -> &Arc<PublicKey> {
        &self.public_key
    }

    #[inline]
    pub fn features(&self) -> &[EncryptedNumber] {
        &self.features
    }
}

/// Encrypts every slot of `index`. Fails before any encryption when no key is given.
pub fn encrypt_index(
    public_key: Option<&Arc<PublicKey>>,
    index: &IndexVector,
) -> Result<EncryptedIndex, TemplateError> {
    let public_key = public_key.ok_or_else(|| {
        TemplateError::Configuration("an encrypted reference requires a public key".into())
    })?;

    let zero = EncodedNumber::encode_u64(public_key, 0)?;
    let one = EncodedNumber::encode_u64(public_key, 1)?;
    debug!(
        "encrypting {} slots under a {}-bit key",
        INDEX_SIZE,
        public_key.bits()
    );

    let features: Vec<EncryptedNumber> = timeit(|| {
        (0..INDEX_SIZE)
            .into_par_iter()
            .map_init(rand::thread_rng, |rng, slot| {
                let bit = if index.get(slot) { &one } else { &zero };
                EncryptedNumber::encrypt(public_key, bit, rng)
            })
            .collect()
    });

    Ok(EncryptedIndex {
        public_key: Arc::clone(public_key),
        features,
    })
}

/// Encrypted similarity of a plaintext query against an encrypted reference.
///
/// Runs without the private key. The result decrypts to
/// `popcount(reference AND query) / popcount(query)`.
pub fn match_encrypted(
    reference: &EncryptedIndex,
    query: &IndexVector,
) -> Result<EncryptedNumber, TemplateError> {
    let den = query.count_ones();
    if den == 0 {
        return Err(TemplateError::DivisionByZero);
    }

    // Enc(r)·0 is the identity of the ciphertext product, so only set slots contribute
    let public_key = &reference.public_key;
    let num = query
        .bits()
        .zip(reference.features.iter())
        .filter(|(bit, _)| *bit)
        .try_fold(
            EncryptedNumber::from_parts(Arc::clone(public_key), BigUint::one(), 0),
            |acc, (_, feature)| acc.checked_add(feature),
        )?;

    Ok(num.div_f64(den as f64)?)
}

#[derive(Serialize, Deserialize)]
struct PublicKeyRecord {
    n: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct EncryptedIndexRecord {
    pubkey: PublicKeyRecord,
    features: Vec<(String, i32)>,
}

/// JSON record with the modulus as a bare integer and each slot as
/// `[ciphertext, exponent]`.
pub fn serialize(reference: &EncryptedIndex) -> Result<String, TemplateError> {
    let n = serde_json::Number::from_str(&reference.public_key.n().to_str_radix(10))?;
    let record = EncryptedIndexRecord {
        pubkey: PublicKeyRecord {
            n: serde_json::Value::Number(n),
        },
        features: reference
            .features
            .iter()
            .map(|feature| (feature.ciphertext().to_str_radix(10), feature.exponent()))
            .collect(),
    };
    Ok(serde_json::to_string(&record)?)
}

pub fn deserialize(record: &str) -> Result<EncryptedIndex, TemplateError> {
    let record: EncryptedIndexRecord = serde_json::from_str(record)?;

    let n = match &record.pubkey.n {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(n) => n.clone(),
        other => {
            return Err(CryptoError::InvalidKey(format!("modulus {} is not an integer", other)).into())
        }
    };
    let n = BigUint::from_str(&n)
        .map_err(|_| CryptoError::InvalidKey(format!("modulus {} is not an integer", n)))?;
    let public_key = Arc::new(PublicKey::new(n)?);

    if record.features.len() != INDEX_SIZE {
        return Err(CryptoError::MalformedCiphertext(format!(
            "{} ciphertexts instead of {}",
            record.features.len(),
            INDEX_SIZE
        ))
        .into());
    }

    let features = record
        .features
        .into_iter()
        .map(|(ciphertext, exponent)| {
            let ciphertext = BigUint::from_str(&ciphertext).map_err(|_| {
                CryptoError::MalformedCiphertext(format!("{:?} is not a decimal integer", ciphertext))
            })?;
            EncryptedNumber::new(Arc::clone(&public_key), ciphertext, exponent)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EncryptedIndex {
        public_key,
        features,
    })
}
