//! Paillier partially homomorphic cryptosystem.
//!
//! Plaintexts are fixed-point numbers with a base-16 exponent, so ciphertexts
//! carry an exponent next to the ciphertext integer. Ciphertexts can be added
//! together and multiplied or divided by plaintext scalars without the private key.

mod encoding;
mod encrypted;
mod keys;
pub mod math;

use thiserror::Error;

pub use encoding::{EncodedNumber, BASE, MAX_EXPONENT};
pub use encrypted::EncryptedNumber;
pub use keys::{generate_keypair, PrivateKey, PublicKey};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CryptoError {
    /// The operands were produced under different public keys.
    #[error("ciphertext was encrypted under a different public key")]
    KeyMismatch,

    #[error("no private key matches the ciphertext's public key")]
    UnknownKey,

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid scalar: {0}")]
    InvalidScalar(String),

    #[error("value does not fit the plaintext space")]
    Overflow,
}
