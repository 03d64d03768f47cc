use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TemplateError;
use crate::paillier::{generate_keypair, CryptoError, EncryptedNumber, PrivateKey, PublicKey};
use crate::store::{write_atomic, IdentityHash};
use crate::timeit;

/// Private keys of every enrolled identity. Never handed to a verifier.
#[derive(Debug, Default)]
pub struct Keyring {
    keys: HashMap<IdentityHash, PrivateKey>,
}

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    p: String,
    q: String,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Generates a key pair for `identity`, replacing any previous one.
    pub fn generate_keypair(
        &mut self,
        identity: &IdentityHash,
        bits: usize,
    ) -> Result<Arc<PublicKey>, TemplateError> {
        let (public_key, private_key) = timeit(|| generate_keypair(bits, &mut rand::thread_rng()))?;
        debug!("generated a {}-bit key pair for {}", bits, identity);
        self.insert(identity, private_key);
        Ok(public_key)
    }

    /// Stores `private_key` for `identity`, replacing any previous one.
    pub fn insert(&mut self, identity: &IdentityHash, private_key: PrivateKey) {
        self.keys.insert(identity.clone(), private_key);
    }

    pub fn private_key(&self, identity: &IdentityHash) -> Option<&PrivateKey> {
        self.keys.get(identity)
    }

    /// Decrypts with the private key of `identity`. A ciphertext under any
    /// other key fails with [`CryptoError::KeyMismatch`].
    pub fn decrypt_for(
        &self,
        identity: &IdentityHash,
        number: &EncryptedNumber,
    ) -> Result<f64, CryptoError> {
        self.keys
            .get(identity)
            .ok_or(CryptoError::UnknownKey)?
            .decrypt(number)
    }

    /// Decrypts with whichever private key belongs to the ciphertext's public key.
    pub fn decrypt(&self, number: &EncryptedNumber) -> Result<f64, CryptoError> {
        self.keys
            .values()
            .find(|key| key.public_key() == number.public_key())
            .ok_or(CryptoError::UnknownKey)?
            .decrypt(number)
    }

    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => TemplateError::NotFound(format!("keyring {}", path.display())),
            _ => err.into(),
        })?;
        let records: BTreeMap<String, KeyRecord> = serde_json::from_str(&contents)?;

        let mut keys = HashMap::with_capacity(records.len());
        for (identity, record) in records {
            let prime = |digits: &str| {
                BigUint::from_str(digits).map_err(|_| {
                    CryptoError::InvalidKey(format!("{:?} is not a decimal integer", digits))
                })
            };
            let key = PrivateKey::from_primes(prime(&record.p)?, prime(&record.q)?)?;
            keys.insert(IdentityHash::from_hex(&identity)?, key);
        }
        debug!("loaded {} keys from {}", keys.len(), path.display());
        Ok(Keyring { keys })
    }

    /// Writes every key pair as its two primes, replacing the file atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TemplateError> {
        let records: BTreeMap<&str, KeyRecord> = self
            .keys
            .iter()
            .map(|(identity, key)| {
                let record = KeyRecord {
                    p: key.p().to_str_radix(10),
                    q: key.q().to_str_radix(10),
                };
                (identity.as_str(), record)
            })
            .collect();
        write_atomic(path.as_ref(), &serde_json::to_string_pretty(&records)?)
    }
}
