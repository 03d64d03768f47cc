//! Templates at every security level and the matcher dispatch.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::binary::{self, BinaryLayout};
use crate::error::TemplateError;
use crate::find_pairs::PairSet;
use crate::homomorphic::{self, EncryptedIndex};
use crate::index::{self, IndexVector};
use crate::paillier::{EncryptedNumber, PublicKey};
use crate::raw;
use crate::store::{IdentityHash, RecordKind, TemplateStore};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SecurityLevel {
    Raw,
    Binary,
    Index,
    Homomorphic,
}

impl SecurityLevel {
    pub const ALL: [SecurityLevel; 4] = [
        SecurityLevel::Raw,
        SecurityLevel::Binary,
        SecurityLevel::Index,
        SecurityLevel::Homomorphic,
    ];

    /// Kind of the record a reference of this level is stored as.
    pub fn record_kind(self) -> RecordKind {
        match self {
            SecurityLevel::Raw => RecordKind::Raw,
            SecurityLevel::Binary => RecordKind::Binary,
            SecurityLevel::Index => RecordKind::Index,
            SecurityLevel::Homomorphic => RecordKind::Homomorphic,
        }
    }
}

impl FromStr for SecurityLevel {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecurityLevel::ALL
            .iter()
            .copied()
            .find(|level| level.record_kind().name() == s)
            .ok_or_else(|| TemplateError::InvalidInput(format!("unknown security level {:?}", s)))
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.record_kind().name())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Reference,
    Query,
}

#[derive(Debug, Clone)]
pub enum Representation {
    Raw(PairSet),
    Binary(Vec<String>),
    Index(IndexVector),
    EncryptedIndex(EncryptedIndex),
}

impl Representation {
    fn tag(&self) -> &'static str {
        match self {
            Representation::Raw(_) => "raw",
            Representation::Binary(_) => "binary",
            Representation::Index(_) => "index",
            Representation::EncryptedIndex(_) => "encrypted index",
        }
    }
}

/// Result of a comparison.
#[derive(Debug, Clone)]
pub enum Similarity {
    Score(f64),
    /// Encrypted score; only the keyring can open it.
    Encrypted(EncryptedNumber),
    /// The query had no features.
    Undefined,
}

impl Similarity {
    pub fn score(&self) -> Option<f64> {
        match self {
            Similarity::Score(score) => Some(*score),
            _ => None,
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Similarity::Score(score) => write!(f, "{:.4}", score),
            Similarity::Encrypted(_) => f.write_str("encrypted"),
            Similarity::Undefined => f.write_str("undefined"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    identity: IdentityHash,
    role: Role,
    level: SecurityLevel,
    representation: Representation,
}

/// Plaintext encodings up to `level`; the homomorphic level stops at the index.
fn encode_plain(pairs: &PairSet, level: SecurityLevel) -> Result<Representation, TemplateError> {
    if level == SecurityLevel::Raw {
        return Ok(Representation::Raw(raw::build(pairs)));
    }
    let encoded = binary::encode_pairs(&BinaryLayout::current(), pairs);
    if level == SecurityLevel::Binary {
        return Ok(Representation::Binary(encoded));
    }
    Ok(Representation::Index(index::build_index(&encoded)?))
}

impl Template {
    /// Builds a reference template. The homomorphic level requires the
    /// identity's public key.
    pub fn reference(
        username: &str,
        pairs: &PairSet,
        level: SecurityLevel,
        public_key: Option<&Arc<PublicKey>>,
    ) -> Result<Template, TemplateError> {
        if level == SecurityLevel::Homomorphic && public_key.is_none() {
            return Err(TemplateError::Configuration(
                "a homomorphic reference requires a public key".into(),
            ));
        }

        let representation = match encode_plain(pairs, level)? {
            Representation::Index(vector) if level == SecurityLevel::Homomorphic => {
                Representation::EncryptedIndex(homomorphic::encrypt_index(public_key, &vector)?)
            }
            plain => plain,
        };

        Ok(Template {
            identity: IdentityHash::of(username),
            role: Role::Reference,
            level,
            representation,
        })
    }

    /// Builds a transient query template. A homomorphic query stays in the clear.
    pub fn query(username: &str, pairs: &PairSet, level: SecurityLevel) -> Result<Template, TemplateError> {
        Ok(Template {
            identity: IdentityHash::of(username),
            role: Role::Query,
            level,
            representation: encode_plain(pairs, level)?,
        })
    }

    /// Reads the stored reference of `username` at `level`.
    pub fn load<S: TemplateStore + ?Sized>(
        store: &S,
        username: &str,
        level: SecurityLevel,
    ) -> Result<Template, TemplateError> {
        let identity = IdentityHash::of(username);
        if !store.contains(&identity) {
            return Err(TemplateError::NotFound(format!("user {}", username)));
        }

        let record = store.get(&identity, level.record_kind())?;
        let representation = match level {
            SecurityLevel::Raw => Representation::Raw(raw::deserialize(&record)?),
            SecurityLevel::Binary => Representation::Binary(binary::deserialize(&record)?),
            SecurityLevel::Index => Representation::Index(index::deserialize(&record)?),
            SecurityLevel::Homomorphic => {
                Representation::EncryptedIndex(homomorphic::deserialize(&record)?)
            }
        };

        Ok(Template {
            identity,
            role: Role::Reference,
            level,
            representation,
        })
    }

    /// Stores a reference under its identity. Queries are never stored.
    pub fn persist<S: TemplateStore + ?Sized>(&self, store: &mut S) -> Result<(), TemplateError> {
        if self.role != Role::Reference {
            return Err(TemplateError::InvalidInput("query templates are not persisted".into()));
        }

        let record = match &self.representation {
            Representation::Raw(pairs) => raw::serialize(pairs),
            Representation::Binary(encoded) => binary::serialize(encoded),
            Representation::Index(vector) => index::serialize(vector),
            Representation::EncryptedIndex(reference) => homomorphic::serialize(reference)?,
        };
        store.put(&self.identity, self.level.record_kind(), &record)
    }

    pub fn identity(&self) -> &IdentityHash {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }
}

/// Scores `query` against `reference` with the matcher of their representation.
///
/// An empty query gives [`Similarity::Undefined`]. An encrypted reference gives
/// [`Similarity::Encrypted`], which only the keyring can turn into a score.
pub fn compare(reference: &Template, query: &Template) -> Result<Similarity, TemplateError> {
    let outcome = match (&reference.representation, &query.representation) {
        (Representation::Raw(reference), Representation::Raw(query)) => {
            raw::match_pairs(reference, query).map(Similarity::Score)
        }
        (Representation::Binary(reference), Representation::Binary(query)) => {
            binary::match_binary(reference, query).map(Similarity::Score)
        }
        (Representation::Index(reference), Representation::Index(query)) => {
            index::match_index(reference, query).map(Similarity::Score)
        }
        (Representation::EncryptedIndex(reference), Representation::Index(query)) => {
            homomorphic::match_encrypted(reference, query).map(Similarity::Encrypted)
        }
        (reference, query) => {
            return Err(TemplateError::InvalidInput(format!(
                "cannot compare a {} reference with a {} query",
                reference.tag(),
                query.tag()
            )))
        }
    };

    match outcome {
        Err(TemplateError::DivisionByZero) => Ok(Similarity::Undefined),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find_pairs::{synthesize_enrollment, synthesize_query};
    use crate::store::MemoryStore;
    use crate::types::{MinutiaKind, MinutiaPoint};

    fn minutiae() -> Vec<MinutiaPoint> {
        vec![
            MinutiaPoint::new(10, 10, 0.0, MinutiaKind::Ending),
            MinutiaPoint::new(50, 40, 1.2, MinutiaKind::Bifurcation),
            MinutiaPoint::new(200, 310, 4.4, MinutiaKind::Ending),
            MinutiaPoint::new(120, 90, 2.9, MinutiaKind::Bifurcation),
        ]
    }

    #[test]
    fn level_names() {
        for level in SecurityLevel::ALL.iter() {
            assert_eq!(level.to_string().parse::<SecurityLevel>().unwrap(), *level);
        }
        assert!("paillier".parse::<SecurityLevel>().is_err());
    }

    #[test]
    fn self_match_at_plain_levels() {
        let pairs = synthesize_enrollment(&[minutiae()]);
        let query_pairs = synthesize_query(&minutiae());
        for &level in &[SecurityLevel::Raw, SecurityLevel::Binary, SecurityLevel::Index] {
            let reference = Template::reference("alice", &pairs, level, None).unwrap();
            let query = Template::query("alice", &query_pairs, level).unwrap();
            assert_eq!(compare(&reference, &query).unwrap().score(), Some(1.0), "{}", level);
        }
    }

    #[test]
    fn empty_query_is_undefined() {
        let pairs = synthesize_query(&minutiae());
        let empty = PairSet::new();
        for &level in &[SecurityLevel::Raw, SecurityLevel::Binary, SecurityLevel::Index] {
            let reference = Template::reference("alice", &pairs, level, None).unwrap();
            let query = Template::query("alice", &empty, level).unwrap();
            assert!(matches!(compare(&reference, &query).unwrap(), Similarity::Undefined));
        }

        let reference = Template::reference("alice", &empty, SecurityLevel::Raw, None).unwrap();
        let query = Template::query("alice", &pairs, SecurityLevel::Raw).unwrap();
        assert_eq!(compare(&reference, &query).unwrap().score(), Some(0.0));
    }

    #[test]
    fn mismatched_representations() {
        let pairs = synthesize_query(&minutiae());
        let reference = Template::reference("alice", &pairs, SecurityLevel::Raw, None).unwrap();
        let query = Template::query("alice", &pairs, SecurityLevel::Index).unwrap();
        assert!(matches!(
            compare(&reference, &query),
            Err(TemplateError::InvalidInput(_))
        ));
    }

    #[test]
    fn homomorphic_reference_needs_a_key() {
        let pairs = synthesize_query(&minutiae());
        assert!(matches!(
            Template::reference("alice", &pairs, SecurityLevel::Homomorphic, None),
            Err(TemplateError::Configuration(_))
        ));

        let query = Template::query("alice", &pairs, SecurityLevel::Homomorphic).unwrap();
        assert!(matches!(query.representation(), Representation::Index(_)));
    }

    #[test]
    fn persisted_references_load_back() {
        let mut store = MemoryStore::new();
        let pairs = synthesize_query(&minutiae());
        assert!(matches!(
            Template::load(&store, "alice", SecurityLevel::Raw),
            Err(TemplateError::NotFound(_))
        ));

        for &level in &[SecurityLevel::Raw, SecurityLevel::Binary, SecurityLevel::Index] {
            let reference = Template::reference("alice", &pairs, level, None).unwrap();
            reference.persist(&mut store).unwrap();

            let loaded = Template::load(&store, "alice", level).unwrap();
            assert_eq!(loaded.identity(), reference.identity());
            assert_eq!(loaded.role(), Role::Reference);
            let query = Template::query("alice", &pairs, level).unwrap();
            assert_eq!(compare(&loaded, &query).unwrap().score(), Some(1.0));
        }

        let query = Template::query("alice", &pairs, SecurityLevel::Raw).unwrap();
        assert!(query.persist(&mut store).is_err());
        assert!(matches!(
            Template::load(&store, "alice", SecurityLevel::Homomorphic),
            Err(TemplateError::NotFound(_))
        ));
    }
}
