//! Ed25519 detached signatures over artifact bytes
//!
//! - Private key is loaded once per run from PKCS#8 PEM (or raw base64)
//! - Signatures cover the raw artifact bytes, never the checksum
//! - Signatures and fingerprints are lowercase hex
//! - `relman-keygen` bootstraps a keypair with [`write_keypair`]

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::checksum::sha256_bytes;

/// Signature algorithm identifier
pub const SIGNATURE_ALGORITHM: &str = "Ed25519";

/// Extension of the private key file written by [`write_keypair`]
pub const PRIVATE_KEY_EXTENSION: &str = "key";

/// Extension of the public key file written by [`write_keypair`]
pub const PUBLIC_KEY_EXTENSION: &str = "pub";

/// Errors from key loading and signing
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing is required but no key path is configured")]
    KeyNotConfigured,

    #[error("refusing to overwrite existing key file {}", .0.display())]
    KeyExists(PathBuf),
}

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// How a deployment treats artifact signing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// Never sign; entries carry no signature
    #[default]
    Off,
    /// Sign when the key loads, otherwise publish unsigned
    Optional,
    /// A missing or invalid key aborts the run
    Required,
}

impl std::str::FromStr for SigningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "optional" => Ok(Self::Optional),
            "required" => Ok(Self::Required),
            other => Err(format!(
                "unknown signing mode '{}' (expected off, optional or required)",
                other
            )),
        }
    }
}

/// Checksum and signature taken from a single read of an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedContents {
    pub sha256: String,
    pub signature: String,
}

/// Signs artifact contents with a single Ed25519 key
#[derive(Debug)]
pub struct ArtifactSigner {
    key: SigningKey,
}

impl ArtifactSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Parse key material.
    ///
    /// Accepts a PKCS#8 PEM private key, or a 32-byte raw key in standard
    /// base64.
    pub fn from_pem(material: &str) -> SigningResult<Self> {
        let trimmed = material.trim();
        if trimmed.starts_with("-----BEGIN") {
            let key = SigningKey::from_pkcs8_pem(trimmed)
                .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
            return Ok(Self::new(key));
        }

        decode_raw_key(trimmed).map(Self::new)
    }

    /// Load key material from a file
    pub fn from_key_file(path: &Path) -> SigningResult<Self> {
        let material = fs::read_to_string(path).map_err(|source| SigningError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(&material)
    }

    /// Resolve the signer for a deployment's signing mode.
    ///
    /// Returns `Ok(None)` when the run should publish unsigned.
    pub fn for_mode(mode: SigningMode, key_path: Option<&Path>) -> SigningResult<Option<Self>> {
        match (mode, key_path) {
            (SigningMode::Off, _) => Ok(None),
            (SigningMode::Required, None) => Err(SigningError::KeyNotConfigured),
            (SigningMode::Required, Some(path)) => Self::from_key_file(path).map(Some),
            (SigningMode::Optional, None) => {
                warn!("signing is optional and no key is configured; publishing unsigned");
                Ok(None)
            }
            (SigningMode::Optional, Some(path)) => match Self::from_key_file(path) {
                Ok(signer) => Ok(Some(signer)),
                Err(e) => {
                    warn!(error = %e, "signing key unavailable; publishing unsigned");
                    Ok(None)
                }
            },
        }
    }

    /// Sign bytes and return the hex signature
    pub fn sign_bytes(&self, data: &[u8]) -> String {
        hex::encode(self.key.sign(data).to_bytes())
    }

    /// Read an artifact once and sign its raw contents.
    ///
    /// The returned checksum is computed from the same bytes the signature
    /// covers, so the pair always describes one version of the file.
    pub fn sign_file(&self, path: &Path) -> io::Result<SignedContents> {
        let contents = fs::read(path)?;
        Ok(SignedContents {
            sha256: sha256_bytes(&contents),
            signature: self.sign_bytes(&contents),
        })
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// SHA-256 fingerprint of the public key (hex)
    pub fn key_fingerprint(&self) -> String {
        compute_key_fingerprint(&self.verifying_key())
    }

    /// Public key as SPKI PEM
    pub fn public_key_pem(&self) -> SigningResult<String> {
        self.verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))
    }
}

/// Compute SHA-256 fingerprint of an Ed25519 public key
pub fn compute_key_fingerprint(key: &VerifyingKey) -> String {
    sha256_bytes(key.as_bytes())
}

/// Generate a new Ed25519 keypair
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut rand::thread_rng())
}

fn decode_raw_key(encoded: &str) -> SigningResult<SigningKey> {
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        .map_err(|e| SigningError::InvalidKey(format!("not PEM and not base64: {}", e)))?;
    let bytes_array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| SigningError::InvalidKey("key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&bytes_array))
}

/// Paths written by [`write_keypair`]
#[derive(Debug, Clone)]
pub struct KeypairFiles {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub fingerprint: String,
}

/// Write `<name>.key` (PKCS#8 PEM) and `<name>.pub` (SPKI PEM) into `dir`.
///
/// Existing files are never overwritten.
pub fn write_keypair(key: &SigningKey, dir: &Path, name: &str) -> SigningResult<KeypairFiles> {
    let private_path = dir.join(format!("{}.{}", name, PRIVATE_KEY_EXTENSION));
    let public_path = dir.join(format!("{}.{}", name, PUBLIC_KEY_EXTENSION));

    for path in [&private_path, &public_path] {
        if path.exists() {
            return Err(SigningError::KeyExists(path.clone()));
        }
    }

    let private_pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    let public_pem = key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;

    write_new_file(&private_path, private_pem.as_bytes(), true)?;
    write_new_file(&public_path, public_pem.as_bytes(), false)?;

    let fingerprint = compute_key_fingerprint(&key.verifying_key());
    info!(
        private_key = %private_path.display(),
        public_key = %public_path.display(),
        fingerprint = %fingerprint,
        "wrote signing keypair"
    );

    Ok(KeypairFiles {
        private_key: private_path,
        public_key: public_path,
        fingerprint,
    })
}

fn write_new_file(path: &Path, contents: &[u8], secret: bool) -> SigningResult<()> {
    let to_err = |source| SigningError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if secret {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = secret;

    let mut file = options.open(path).map_err(to_err)?;
    file.write_all(contents).map_err(to_err)?;
    file.sync_all().map_err(to_err)
}
