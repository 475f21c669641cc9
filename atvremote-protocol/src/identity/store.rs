//! Client identity storage
//!
//! The client identity is an RSA-2048 key pair plus the self-signed
//! certificate built from it. It is generated once and reused across
//! restarts; losing it would orphan every pairing, so it lives in a
//! credential store keyed by stable labels.
//!
//! The store itself is a small trait (load/save/delete of opaque bytes) so a
//! platform keychain can slot in; the shipped backend keeps PEM files under
//! a data directory.
//!
//! A format version is persisted next to the certificate. When the builder
//! changes in a way that makes old certificates non-conforming, bumping
//! [`CERT_FORMAT_VERSION`] invalidates stored identities: on open, an older
//! stored version wipes all artifacts and the next access regenerates them.

use crate::error::{RemoteError, Result};
use crate::identity::certificate;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::X509;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Current certificate format version. Bump when the DER builder changes
/// in a way that requires regenerating stored identities.
pub const CERT_FORMAT_VERSION: u32 = 3;

const KEY_PRIVATE_KEY: &str = "client.key";
const KEY_CERTIFICATE: &str = "client.crt";
const KEY_FORMAT_VERSION: &str = "cert.version";

const PEM_TAG_KEY: &str = "RSA PRIVATE KEY";
const PEM_TAG_CERT: &str = "CERTIFICATE";

/// A keyed store of opaque credential bytes
pub trait CredentialStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// File-backed credential store, one file per key under a directory
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| RemoteError::CredentialStore(format!("create {:?}: {}", dir, e)))?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RemoteError::CredentialStore(format!("load {}: {}", key, e))),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::write(self.path(key), bytes)
            .map_err(|e| RemoteError::CredentialStore(format!("save {}: {}", key, e)))
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RemoteError::CredentialStore(format!(
                "delete {}: {}",
                key, e
            ))),
        }
    }
}

/// The client's key pair and certificate
#[derive(Clone)]
pub struct Identity {
    rsa: Rsa<Private>,
    certificate_der: Vec<u8>,
}

impl Identity {
    pub fn rsa(&self) -> &Rsa<Private> {
        &self.rsa
    }

    /// The private key as a `PKey`, for the TLS layer
    pub fn pkey(&self) -> Result<PKey<Private>> {
        Ok(PKey::from_rsa(self.rsa.clone())?)
    }

    /// DER-encoded certificate, as presented during the TLS handshake
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("certificate_len", &self.certificate_der.len())
            .finish()
    }
}

/// Generates, persists, and retrieves the client identity
pub struct IdentityStore {
    store: Box<dyn CredentialStore>,
    // cached after the first successful load or generation
    cached: Mutex<Option<Identity>>,
}

impl IdentityStore {
    /// Open the store, applying the format-version upgrade path: a stored
    /// version older than [`CERT_FORMAT_VERSION`] deletes every artifact so
    /// the next access regenerates a conforming identity.
    pub fn open(store: Box<dyn CredentialStore>) -> Result<Self> {
        let stored_version = store
            .load(KEY_FORMAT_VERSION)?
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(0);

        if stored_version < CERT_FORMAT_VERSION {
            if stored_version > 0 {
                info!(
                    stored = stored_version,
                    current = CERT_FORMAT_VERSION,
                    "certificate format outdated, discarding stored identity"
                );
            }
            store.delete(KEY_PRIVATE_KEY)?;
            store.delete(KEY_CERTIFICATE)?;
            store.delete(KEY_FORMAT_VERSION)?;
        }

        Ok(Self {
            store,
            cached: Mutex::new(None),
        })
    }

    /// Open a file-backed store under `dir`
    pub fn open_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Box::new(FileCredentialStore::new(dir)?))
    }

    /// Return the stored identity, generating and persisting one on first use
    pub fn get_or_create_identity(&self) -> Result<Identity> {
        let mut cached = self.cached.lock().expect("identity cache poisoned");
        if let Some(identity) = cached.as_ref() {
            return Ok(identity.clone());
        }

        let identity = match self.load_identity()? {
            Some(identity) => identity,
            None => {
                info!("no stored client identity, generating a new key pair");
                let identity = self.generate_identity()?;
                self.persist(&identity)?;
                identity
            }
        };

        *cached = Some(identity.clone());
        Ok(identity)
    }

    /// DER certificate for secret computation and peer transfer
    pub fn client_certificate_der(&self) -> Option<Vec<u8>> {
        self.get_or_create_identity()
            .ok()
            .map(|identity| identity.certificate_der)
    }

    /// PKCS#1 private key export, for transferring the identity to a peer
    pub fn private_key_der(&self) -> Option<Vec<u8>> {
        let identity = self.get_or_create_identity().ok()?;
        identity.rsa.private_key_to_der().ok()
    }

    /// Install an identity received from a peer device.
    ///
    /// `key_bytes` is a PKCS#1 private key, `cert_bytes` a DER certificate.
    /// The key must pair with the certificate's public key.
    pub fn import_identity(&self, key_bytes: &[u8], cert_bytes: &[u8]) -> Result<()> {
        let rsa = Rsa::private_key_from_der(key_bytes)
            .map_err(|e| RemoteError::CredentialStore(format!("unusable private key: {}", e)))?;
        let cert = X509::from_der(cert_bytes)
            .map_err(|e| RemoteError::CredentialStore(format!("unusable certificate: {}", e)))?;

        let cert_public = cert
            .public_key()
            .and_then(|k| k.rsa())
            .and_then(|r| r.public_key_to_der_pkcs1())
            .map_err(|e| RemoteError::CredentialStore(format!("certificate key: {}", e)))?;
        if cert_public != rsa.public_key_to_der_pkcs1()? {
            return Err(RemoteError::CredentialStore(
                "imported key does not match the certificate".to_string(),
            ));
        }

        let identity = Identity {
            rsa,
            certificate_der: cert_bytes.to_vec(),
        };
        self.persist(&identity)?;
        *self.cached.lock().expect("identity cache poisoned") = Some(identity);
        info!("imported client identity from peer");
        Ok(())
    }

    fn load_identity(&self) -> Result<Option<Identity>> {
        let (key_pem, cert_pem) = match (
            self.store.load(KEY_PRIVATE_KEY)?,
            self.store.load(KEY_CERTIFICATE)?,
        ) {
            (Some(key), Some(cert)) => (key, cert),
            (None, None) => return Ok(None),
            _ => {
                // one artifact without the other is unusable; start over
                warn!("partial identity in credential store, discarding");
                self.store.delete(KEY_PRIVATE_KEY)?;
                self.store.delete(KEY_CERTIFICATE)?;
                return Ok(None);
            }
        };

        let key_der = decode_pem(&key_pem, PEM_TAG_KEY)?;
        let certificate_der = decode_pem(&cert_pem, PEM_TAG_CERT)?;
        let rsa = Rsa::private_key_from_der(&key_der)?;
        debug!("loaded client identity from credential store");

        Ok(Some(Identity {
            rsa,
            certificate_der,
        }))
    }

    fn generate_identity(&self) -> Result<Identity> {
        let rsa = Rsa::generate(2048)?;
        let certificate_der = certificate::build_self_signed(&rsa)?;
        Ok(Identity {
            rsa,
            certificate_der,
        })
    }

    fn persist(&self, identity: &Identity) -> Result<()> {
        let key_pem = pem::encode(&pem::Pem::new(
            PEM_TAG_KEY,
            identity.rsa.private_key_to_der()?,
        ));
        let cert_pem = pem::encode(&pem::Pem::new(
            PEM_TAG_CERT,
            identity.certificate_der.clone(),
        ));

        self.store.save(KEY_PRIVATE_KEY, key_pem.as_bytes())?;
        self.store.save(KEY_CERTIFICATE, cert_pem.as_bytes())?;
        self.store.save(
            KEY_FORMAT_VERSION,
            CERT_FORMAT_VERSION.to_string().as_bytes(),
        )?;
        debug!("persisted client identity");
        Ok(())
    }
}

fn decode_pem(bytes: &[u8], expected_tag: &str) -> Result<Vec<u8>> {
    let parsed = pem::parse(bytes)
        .map_err(|e| RemoteError::CredentialStore(format!("malformed PEM: {}", e)))?;
    if parsed.tag() != expected_tag {
        return Err(RemoteError::CredentialStore(format!(
            "unexpected PEM tag {}, wanted {}",
            parsed.tag(),
            expected_tag
        )));
    }
    Ok(parsed.into_contents())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_and_reload() {
        let dir = TempDir::new().unwrap();

        let first = {
            let store = IdentityStore::open_dir(dir.path()).unwrap();
            store.get_or_create_identity().unwrap()
        };

        // a fresh store over the same directory loads the same identity
        let store = IdentityStore::open_dir(dir.path()).unwrap();
        let second = store.get_or_create_identity().unwrap();
        assert_eq!(first.certificate_der(), second.certificate_der());
        assert_eq!(
            first.rsa().private_key_to_der().unwrap(),
            second.rsa().private_key_to_der().unwrap()
        );
    }

    #[test]
    fn test_exports() {
        let dir = TempDir::new().unwrap();
        let store = IdentityStore::open_dir(dir.path()).unwrap();
        let identity = store.get_or_create_identity().unwrap();

        let cert = store.client_certificate_der().unwrap();
        assert_eq!(cert, identity.certificate_der());
        assert!(X509::from_der(&cert).is_ok());

        let key = store.private_key_der().unwrap();
        assert!(Rsa::private_key_from_der(&key).is_ok());
    }

    #[test]
    fn test_outdated_format_version_regenerates() {
        let dir = TempDir::new().unwrap();

        let old_cert = {
            let store = IdentityStore::open_dir(dir.path()).unwrap();
            store.get_or_create_identity().unwrap().certificate_der.clone()
        };

        // age the stored version below current
        fs::write(dir.path().join(KEY_FORMAT_VERSION), b"2").unwrap();

        let store = IdentityStore::open_dir(dir.path()).unwrap();
        let new_cert = store.get_or_create_identity().unwrap().certificate_der;
        assert_ne!(old_cert, new_cert);

        // and the version file is current again
        let version = fs::read_to_string(dir.path().join(KEY_FORMAT_VERSION)).unwrap();
        assert_eq!(version, CERT_FORMAT_VERSION.to_string());
    }

    #[test]
    fn test_import_identity() {
        let dir_a = TempDir::new().unwrap();
        let source = IdentityStore::open_dir(dir_a.path()).unwrap();
        source.get_or_create_identity().unwrap();
        let key = source.private_key_der().unwrap();
        let cert = source.client_certificate_der().unwrap();

        let dir_b = TempDir::new().unwrap();
        let target = IdentityStore::open_dir(dir_b.path()).unwrap();
        target.import_identity(&key, &cert).unwrap();

        assert_eq!(target.client_certificate_der().unwrap(), cert);
        assert_eq!(target.private_key_der().unwrap(), key);
    }

    #[test]
    fn test_import_rejects_mismatched_pair() {
        let dir_a = TempDir::new().unwrap();
        let source = IdentityStore::open_dir(dir_a.path()).unwrap();
        source.get_or_create_identity().unwrap();
        let cert = source.client_certificate_der().unwrap();

        // key from a different identity
        let other = Rsa::generate(2048).unwrap();
        let wrong_key = other.private_key_to_der().unwrap();

        let dir_b = TempDir::new().unwrap();
        let target = IdentityStore::open_dir(dir_b.path()).unwrap();
        assert!(matches!(
            target.import_identity(&wrong_key, &cert),
            Err(RemoteError::CredentialStore(_))
        ));
    }

    #[test]
    fn test_partial_identity_discarded() {
        let dir = TempDir::new().unwrap();
        {
            let store = IdentityStore::open_dir(dir.path()).unwrap();
            store.get_or_create_identity().unwrap();
        }
        fs::remove_file(dir.path().join(KEY_PRIVATE_KEY)).unwrap();

        let store = IdentityStore::open_dir(dir.path()).unwrap();
        // regenerates rather than failing on the orphaned certificate
        store.get_or_create_identity().unwrap();
    }
}
