//! Encrypted session storage
//!
//! Keeps the signing identity between runs so a delegated login survives a
//! restart:
//! - Argon2id for passphrase-based key derivation
//! - ChaCha20-Poly1305 for authenticated encryption
//!
//! The principal and auth mode are stored in clear so `whoami` can describe
//! the file without the passphrase.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher,
};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::Zeroizing;

use super::AuthMode;
use crate::identity::{Delegation, Identity, IdentityError};
use crate::principal::Principal;

/// Current session file format version
const SESSION_VERSION: u32 = 1;

/// Argon2 parameters (tuned for security vs. usability)
const ARGON2_MEMORY_KB: u32 = 65536; // 64 MB
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported session file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("session file is corrupt: {0}")]
    Corrupt(String),
    #[error("decryption failed - wrong passphrase?")]
    Decryption,
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("stored identity is invalid: {0}")]
    Identity(#[from] IdentityError),
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk layout
#[derive(Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    /// Argon2 salt (base64, as produced by `SaltString`)
    salt: String,
    /// ChaCha20-Poly1305 nonce (12 bytes, hex encoded)
    nonce: String,
    /// Encrypted [`SessionSecret`] JSON (hex encoded)
    ciphertext: String,
    principal: Principal,
    mode: AuthMode,
}

/// Plaintext inside the ciphertext
#[derive(Serialize, Deserialize)]
struct SessionSecret {
    #[serde(with = "hex")]
    secret_key: [u8; 32],
    delegation: Option<Delegation>,
}

impl Drop for SessionSecret {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.secret_key);
    }
}

/// Cleartext summary of a stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredSummary {
    pub principal: Principal,
    pub mode: AuthMode,
}

/// A passphrase-protected session file
pub struct SessionStore {
    path: PathBuf,
    passphrase: Zeroizing<String>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Encrypt and write `identity`, replacing any previous session
    pub fn save(&self, identity: &Identity, mode: AuthMode) -> Result<(), StoreError> {
        let secret = SessionSecret {
            secret_key: *identity.secret_bytes(),
            delegation: identity.delegation().cloned(),
        };
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&secret).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        );

        let salt = SaltString::generate(&mut OsRng);
        let key = derive_key(&self.passphrase, salt.as_str())?;

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill(&mut nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(key.as_slice())
            .map_err(|_| StoreError::KeyDerivation)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|_| StoreError::Corrupt("encryption failed".into()))?;

        let file = SessionFile {
            version: SESSION_VERSION,
            salt: salt.to_string(),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
            principal: identity.principal(),
            mode,
        };
        let json =
            serde_json::to_string_pretty(&file).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        write_private(&self.path, json.as_bytes())?;
        Ok(())
    }

    /// Decrypt the stored identity, `None` when no session file exists
    pub fn load(&self) -> Result<Option<(Identity, AuthMode)>, StoreError> {
        let Some(file) = self.read_file()? else {
            return Ok(None);
        };

        let key = derive_key(&self.passphrase, &file.salt)?;
        let nonce_bytes =
            hex::decode(&file.nonce).map_err(|_| StoreError::Corrupt("invalid nonce".into()))?;
        let ciphertext = hex::decode(&file.ciphertext)
            .map_err(|_| StoreError::Corrupt("invalid ciphertext".into()))?;
        if nonce_bytes.len() != 12 {
            return Err(StoreError::Corrupt("invalid nonce length".into()));
        }

        let cipher = ChaCha20Poly1305::new_from_slice(key.as_slice())
            .map_err(|_| StoreError::KeyDerivation)?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
                .map_err(|_| StoreError::Decryption)?,
        );
        let secret: SessionSecret = serde_json::from_slice(&plaintext)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let identity = match secret.delegation.clone() {
            Some(delegation) => Identity::delegated(&secret.secret_key, delegation)?,
            None => Identity::from_secret_bytes(&secret.secret_key),
        };
        if identity.principal() != file.principal {
            return Err(StoreError::Corrupt(
                "principal does not match the stored key".into(),
            ));
        }
        Ok(Some((identity, file.mode)))
    }

    /// Read the cleartext header without the passphrase
    pub fn summary(&self) -> Result<Option<StoredSummary>, StoreError> {
        Ok(self.read_file()?.map(|file| StoredSummary {
            principal: file.principal,
            mode: file.mode,
        }))
    }

    /// Remove the session file; missing files are not an error
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_file(&self) -> Result<Option<SessionFile>, StoreError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: SessionFile =
            serde_json::from_str(&json).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        if file.version != SESSION_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: file.version,
                expected: SESSION_VERSION,
            });
        }
        Ok(Some(file))
    }
}

/// Derive a 32-byte encryption key from the passphrase using Argon2id
fn derive_key(passphrase: &str, salt: &str) -> Result<Zeroizing<[u8; 32]>, StoreError> {
    let salt = SaltString::from_b64(salt).map_err(|_| StoreError::Corrupt("invalid salt".into()))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::new(
            ARGON2_MEMORY_KB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(32),
        )
        .map_err(|_| StoreError::KeyDerivation)?,
    );

    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|_| StoreError::KeyDerivation)?;
    let output = hash.hash.ok_or(StoreError::KeyDerivation)?;

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&output.as_bytes()[..32]);
    Ok(key)
}

/// Write with owner-only permissions
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(contents)?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)?;
    }

    Ok(())
}
