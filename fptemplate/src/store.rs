//! Persistence of reference records, keyed by the hash of the username.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::TemplateError;

/// Hex SHA-256 digest of a username. Usernames never reach the store.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct IdentityHash(String);

impl IdentityHash {
    pub fn of(username: &str) -> Self {
        IdentityHash(hex::encode(Sha256::digest(username.as_bytes())))
    }

    /// Accepts a digest previously produced by [`IdentityHash::of`].
    pub fn from_hex(digest: &str) -> Result<Self, TemplateError> {
        let valid = digest.len() == 64
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(TemplateError::InvalidInput(format!(
                "{:?} is not a SHA-256 digest",
                digest
            )));
        }
        Ok(IdentityHash(digest.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordKind {
    Raw,
    Binary,
    Index,
    Homomorphic,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Raw,
        RecordKind::Binary,
        RecordKind::Index,
        RecordKind::Homomorphic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Raw => "raw",
            RecordKind::Binary => "binary",
            RecordKind::Index => "index",
            RecordKind::Homomorphic => "homomorphic",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key-value store of serialized records: `identity → kind → record`.
pub trait TemplateStore {
    /// Whether any record exists for the identity.
    fn contains(&self, identity: &IdentityHash) -> bool;

    /// Stores a record, replacing any previous one of the same kind.
    fn put(&mut self, identity: &IdentityHash, kind: RecordKind, record: &str)
        -> Result<(), TemplateError>;

    /// Fails with [`TemplateError::NotFound`] for an unknown identity or a missing record.
    fn get(&self, identity: &IdentityHash, kind: RecordKind) -> Result<String, TemplateError>;

    /// Drops every record of the identity. Unknown identities are not an error.
    fn remove(&mut self, identity: &IdentityHash) -> Result<(), TemplateError>;
}

/// Replaces `path` with `contents` through a temporary file in the same directory.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), TemplateError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// One directory per identity holding `<hash>_<kind>.dat` files.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        DirectoryStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn identity_dir(&self, identity: &IdentityHash) -> PathBuf {
        self.root.join(identity.as_str())
    }

    fn record_path(&self, identity: &IdentityHash, kind: RecordKind) -> PathBuf {
        self.identity_dir(identity)
            .join(format!("{}_{}.dat", identity, kind))
    }
}

impl TemplateStore for DirectoryStore {
    fn contains(&self, identity: &IdentityHash) -> bool {
        self.identity_dir(identity).is_dir()
    }

    fn put(
        &mut self,
        identity: &IdentityHash,
        kind: RecordKind,
        record: &str,
    ) -> Result<(), TemplateError> {
        fs::create_dir_all(self.identity_dir(identity))?;
        let path = self.record_path(identity, kind);
        debug!("writing {} ({} bytes)", path.display(), record.len());
        write_atomic(&path, record)
    }

    fn get(&self, identity: &IdentityHash, kind: RecordKind) -> Result<String, TemplateError> {
        if !self.contains(identity) {
            return Err(TemplateError::NotFound(format!("identity {}", identity)));
        }
        let path = self.record_path(identity, kind);
        fs::read_to_string(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => {
                TemplateError::NotFound(format!("{} record of {}", kind, identity))
            }
            _ => err.into(),
        })
    }

    fn remove(&mut self, identity: &IdentityHash) -> Result<(), TemplateError> {
        match fs::remove_dir_all(self.identity_dir(identity)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: HashMap<IdentityHash, HashMap<RecordKind, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for MemoryStore {
    fn contains(&self, identity: &IdentityHash) -> bool {
        self.records.contains_key(identity)
    }

    fn put(
        &mut self,
        identity: &IdentityHash,
        kind: RecordKind,
        record: &str,
    ) -> Result<(), TemplateError> {
        self.records
            .entry(identity.clone())
            .or_default()
            .insert(kind, record.to_string());
        Ok(())
    }

    fn get(&self, identity: &IdentityHash, kind: RecordKind) -> Result<String, TemplateError> {
        let records = self
            .records
            .get(identity)
            .ok_or_else(|| TemplateError::NotFound(format!("identity {}", identity)))?;
        records
            .get(&kind)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(format!("{} record of {}", kind, identity)))
    }

    fn remove(&mut self, identity: &IdentityHash) -> Result<(), TemplateError> {
        self.records.remove(identity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_sha256_hex() {
        let identity = IdentityHash::of("alice");
        assert_eq!(
            identity.as_str(),
            "2bd806c97f0e00af1a1fc3328fa763a9269723c8db8fac4f93af71db186d6e90"
        );
        assert_eq!(IdentityHash::from_hex(identity.as_str()).unwrap(), identity);
        assert!(IdentityHash::from_hex("alice").is_err());
        assert!(IdentityHash::from_hex(&identity.as_str().to_uppercase()).is_err());
    }

    fn exercise(store: &mut dyn TemplateStore) {
        let alice = IdentityHash::of("alice");
        let bob = IdentityHash::of("bob");

        assert!(!store.contains(&alice));
        assert!(matches!(
            store.get(&alice, RecordKind::Raw),
            Err(TemplateError::NotFound(_))
        ));

        store.put(&alice, RecordKind::Raw, "4 3.000 17.000 0 1\n").unwrap();
        assert!(store.contains(&alice));
        assert!(!store.contains(&bob));
        assert_eq!(store.get(&alice, RecordKind::Raw).unwrap(), "4 3.000 17.000 0 1\n");
        assert!(matches!(
            store.get(&alice, RecordKind::Index),
            Err(TemplateError::NotFound(_))
        ));

        store.put(&alice, RecordKind::Raw, "").unwrap();
        assert_eq!(store.get(&alice, RecordKind::Raw).unwrap(), "");

        store.put(&bob, RecordKind::Index, "0 1").unwrap();
        store.remove(&bob).unwrap();
        assert!(!store.contains(&bob));
        assert!(matches!(
            store.get(&bob, RecordKind::Index),
            Err(TemplateError::NotFound(_))
        ));
        store.remove(&bob).unwrap();
        assert!(store.contains(&alice));
    }

    #[test]
    fn memory_store() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::new(dir.path());
        exercise(&mut store);

        let alice = IdentityHash::of("alice");
        let path = dir
            .path()
            .join(alice.as_str())
            .join(format!("{}_raw.dat", alice));
        assert!(path.is_file());
        // only the record itself, no leftover temporary files
        assert_eq!(fs::read_dir(dir.path().join(alice.as_str())).unwrap().count(), 1);
    }
}
