//! Enrollment and verification of identities.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::consts::ENROLLMENT_IMAGES;
use crate::error::TemplateError;
use crate::find_pairs::{synthesize_enrollment, synthesize_query};
use crate::keyring::Keyring;
use crate::paillier::{generate_keypair, PublicKey};
use crate::store::{IdentityHash, TemplateStore};
use crate::template::{compare, SecurityLevel, Similarity, Template};
use crate::timeit;
use crate::types::MinutiaPoint;

/// Minutiae of the distinct images an identity enrolls with.
#[derive(Debug, Default, Clone)]
pub struct Enrollment {
    images: Vec<(String, Vec<MinutiaPoint>)>,
}

impl Enrollment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the minutiae of the image `name`. Every image may be used once.
    pub fn add<S: Into<String>>(
        &mut self,
        name: S,
        minutiae: Vec<MinutiaPoint>,
    ) -> Result<(), TemplateError> {
        let name = name.into();
        if self.images.iter().any(|(seen, _)| *seen == name) {
            return Err(TemplateError::Duplicate(format!("image {}", name)));
        }
        if self.is_complete() {
            return Err(TemplateError::InvalidInput(format!(
                "enrollment already holds {} images",
                ENROLLMENT_IMAGES
            )));
        }
        self.images.push((name, minutiae));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.images.len() == ENROLLMENT_IMAGES
    }

    fn minutiae(&self) -> Vec<Vec<MinutiaPoint>> {
        self.images.iter().map(|(_, minutiae)| minutiae.clone()).collect()
    }
}

/// Generates the identity's key pair and stores its reference at every level.
///
/// Every representation is built before the first record is written. When a
/// write fails the identity's records are dropped again, and the keyring only
/// learns the private key once every record is stored.
pub fn enroll<S: TemplateStore + ?Sized>(
    store: &mut S,
    keyring: &mut Keyring,
    username: &str,
    enrollment: &Enrollment,
    key_bits: usize,
) -> Result<Arc<PublicKey>, TemplateError> {
    if !enrollment.is_complete() {
        return Err(TemplateError::InvalidInput(format!(
            "enrollment needs {} images, got {}",
            ENROLLMENT_IMAGES,
            enrollment.len()
        )));
    }
    let identity = IdentityHash::of(username);
    if store.contains(&identity) {
        return Err(TemplateError::Duplicate(format!("user {}", username)));
    }

    let pairs = synthesize_enrollment(&enrollment.minutiae());
    debug!("{} pairs pooled for {}", pairs.len(), identity);

    let (public_key, private_key) =
        timeit(|| generate_keypair(key_bits, &mut rand::thread_rng()))?;
    let references = SecurityLevel::ALL
        .iter()
        .map(|&level| Template::reference(username, &pairs, level, Some(&public_key)))
        .collect::<Result<Vec<_>, _>>()?;

    let persisted = references
        .iter()
        .try_for_each(|reference| reference.persist(&mut *store));
    if let Err(err) = persisted {
        if let Err(cleanup) = store.remove(&identity) {
            warn!("cannot remove partial records of {}: {}", identity, cleanup);
        }
        return Err(err);
    }

    keyring.insert(&identity, private_key);
    info!("enrolled {}", identity);
    Ok(public_key)
}

/// Scores one image against the stored reference of `username`.
///
/// At the homomorphic level the encrypted score is opened with the private key
/// of `username`, so the result is always a plaintext score or undefined. A
/// stored reference encrypted under any other key fails to decrypt.
pub fn verify<S: TemplateStore + ?Sized>(
    store: &S,
    keyring: &Keyring,
    username: &str,
    minutiae: &[MinutiaPoint],
    level: SecurityLevel,
) -> Result<Similarity, TemplateError> {
    let identity = IdentityHash::of(username);
    if !store.contains(&identity) {
        return Err(TemplateError::NotFound(format!("user {}", username)));
    }

    let pairs = synthesize_query(minutiae);
    let query = Template::query(username, &pairs, level)?;
    let reference = Template::load(store, username, level)?;
    debug!("comparing {} query pairs at {} level", pairs.len(), level);

    match compare(&reference, &query)? {
        Similarity::Encrypted(score) => {
            Ok(Similarity::Score(keyring.decrypt_for(&identity, &score)?))
        }
        similarity => Ok(similarity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::CryptoError;
    use crate::store::{DirectoryStore, MemoryStore, RecordKind};
    use crate::types::MinutiaKind::{Bifurcation, Ending};

    fn image(shift: i32) -> Vec<MinutiaPoint> {
        vec![
            MinutiaPoint::new(10 + shift, 10, 0.0, Ending),
            MinutiaPoint::new(50 + shift, 40, 1.2, Bifurcation),
            MinutiaPoint::new(200 + shift, 310, 4.4, Ending),
            MinutiaPoint::new(120 + shift, 90, 2.9, Bifurcation),
            MinutiaPoint::new(400 + shift, 20, 6.1, Ending),
        ]
    }

    fn enrollment() -> Enrollment {
        let mut enrollment = Enrollment::new();
        enrollment.add("101_1", image(0)).unwrap();
        enrollment.add("101_2", image(7)).unwrap();
        enrollment.add("101_3", image(-5)).unwrap();
        enrollment
    }

    #[test]
    fn enrollment_images_are_distinct_and_counted() {
        let mut partial = Enrollment::new();
        partial.add("101_1", image(0)).unwrap();
        assert!(matches!(
            partial.add("101_1", image(0)),
            Err(TemplateError::Duplicate(_))
        ));

        let mut store = MemoryStore::new();
        let mut keyring = Keyring::new();
        assert!(matches!(
            enroll(&mut store, &mut keyring, "alice", &partial, 128),
            Err(TemplateError::InvalidInput(_))
        ));
        assert!(keyring.is_empty());

        let mut full = enrollment();
        assert!(matches!(
            full.add("101_4", image(1)),
            Err(TemplateError::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_user() {
        let store = MemoryStore::new();
        assert!(matches!(
            verify(&store, &Keyring::new(), "bob", &image(0), SecurityLevel::Index),
            Err(TemplateError::NotFound(_))
        ));
    }

    #[test]
    fn enroll_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::new(dir.path());
        let mut keyring = Keyring::new();

        enroll(&mut store, &mut keyring, "alice", &enrollment(), 128).unwrap();
        assert!(matches!(
            enroll(&mut store, &mut keyring, "alice", &enrollment(), 128),
            Err(TemplateError::Duplicate(_))
        ));

        for &level in SecurityLevel::ALL.iter() {
            let score = verify(&store, &keyring, "alice", &image(7), level)
                .unwrap()
                .score()
                .unwrap();
            assert!((score - 1.0).abs() < 1e-9, "{} scored {}", level, score);
        }

        let minutiae = image(0);
        assert!(matches!(
            verify(&store, &keyring, "alice", &minutiae[..1], SecurityLevel::Homomorphic).unwrap(),
            Similarity::Undefined
        ));

        // no private key for the stored reference
        assert!(matches!(
            verify(&store, &Keyring::new(), "alice", &minutiae, SecurityLevel::Homomorphic),
            Err(TemplateError::Crypto(_))
        ));
    }

    #[test]
    fn reference_under_another_key_does_not_verify() {
        let mut store = MemoryStore::new();
        let mut keyring = Keyring::new();
        enroll(&mut store, &mut keyring, "alice", &enrollment(), 128).unwrap();
        enroll(&mut store, &mut keyring, "bob", &enrollment(), 128).unwrap();

        let alice = IdentityHash::of("alice");
        let bob = IdentityHash::of("bob");
        let record = store.get(&bob, RecordKind::Homomorphic).unwrap();
        store.put(&alice, RecordKind::Homomorphic, &record).unwrap();

        assert!(matches!(
            verify(&store, &keyring, "alice", &image(0), SecurityLevel::Homomorphic),
            Err(TemplateError::Crypto(CryptoError::KeyMismatch))
        ));
        let score = verify(&store, &keyring, "bob", &image(0), SecurityLevel::Homomorphic)
            .unwrap()
            .score()
            .unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    /// Fails the third write it is asked to do.
    struct FlakyStore {
        inner: MemoryStore,
        puts: usize,
    }

    impl TemplateStore for FlakyStore {
        fn contains(&self, identity: &IdentityHash) -> bool {
            self.inner.contains(identity)
        }

        fn put(
            &mut self,
            identity: &IdentityHash,
            kind: RecordKind,
            record: &str,
        ) -> Result<(), TemplateError> {
            self.puts += 1;
            if self.puts == 3 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
            }
            self.inner.put(identity, kind, record)
        }

        fn get(&self, identity: &IdentityHash, kind: RecordKind) -> Result<String, TemplateError> {
            self.inner.get(identity, kind)
        }

        fn remove(&mut self, identity: &IdentityHash) -> Result<(), TemplateError> {
            self.inner.remove(identity)
        }
    }

    #[test]
    fn failed_write_leaves_no_partial_enrollment() {
        let mut store = FlakyStore {
            inner: MemoryStore::new(),
            puts: 0,
        };
        let mut keyring = Keyring::new();

        assert!(matches!(
            enroll(&mut store, &mut keyring, "alice", &enrollment(), 128),
            Err(TemplateError::Io(_))
        ));
        assert_eq!(store.puts, 3);
        assert!(!store.contains(&IdentityHash::of("alice")));
        assert!(keyring.is_empty());

        enroll(&mut store, &mut keyring, "alice", &enrollment(), 128).unwrap();
        assert_eq!(keyring.len(), 1);
        let score = verify(&store, &keyring, "alice", &image(7), SecurityLevel::Homomorphic)
            .unwrap()
            .score()
            .unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }
}
