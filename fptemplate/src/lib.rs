pub use error::TemplateError;
pub use find_pairs::{find_pairs, synthesize_enrollment, synthesize_query, PairSet};
pub use homomorphic::{encrypt_index, match_encrypted, EncryptedIndex};
pub use index::IndexVector;
pub use keyring::Keyring;
pub use pipeline::{enroll, verify, Enrollment};
pub use prof::timeit;
pub use store::{DirectoryStore, IdentityHash, MemoryStore, RecordKind, TemplateStore};
pub use template::{compare, Representation, Role, SecurityLevel, Similarity, Template};
pub use types::{MinutiaKind, MinutiaPair, MinutiaPoint, Quantization, Quantize, QuantizedPair};

pub mod binary;
pub mod consts;
mod error;
mod find_pairs;
pub mod homomorphic;
pub mod index;
mod keyring;
mod math;
pub mod paillier;
mod pipeline;
mod prof;
pub mod raw;
pub mod store;
mod template;
pub mod types;
