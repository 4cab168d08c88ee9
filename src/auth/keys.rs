//! Signing Key Material
//! Mission: Load the RSA keypair once at startup and fail fast if it is unusable

use crate::auth::error::KeyMaterialError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// RS256 keypair shared read-only by the token codec.
///
/// Construct once and pass around behind an `Arc`; nothing mutates it after load.
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    /// Read both PEM files relative to `root` (defaults to `./` when empty).
    pub fn load(
        root: &Path,
        private_path: Option<&str>,
        public_path: Option<&str>,
    ) -> Result<Self, KeyMaterialError> {
        let private_path = private_path
            .filter(|p| !p.trim().is_empty())
            .ok_or(KeyMaterialError::PathNotSet("JWT_PRIVATE_KEY_PATH"))?;
        let public_path = public_path
            .filter(|p| !p.trim().is_empty())
            .ok_or(KeyMaterialError::PathNotSet("JWT_PUBLIC_KEY_PATH"))?;

        let root = if root.as_os_str().is_empty() {
            Path::new("./")
        } else {
            root
        };

        let private_pem = read_key(root, private_path, "private")?;
        let public_pem = read_key(root, public_path, "public")?;

        let keys = Self::from_pem(&private_pem, &public_pem)?;
        info!(
            private_key = %root.join(private_path).display(),
            public_key = %root.join(public_path).display(),
            "🔑 Signing keypair loaded"
        );
        Ok(keys)
    }

    /// Parse an RSA keypair from PEM bytes and check the halves belong together.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, KeyMaterialError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem).map_err(|source| {
            KeyMaterialError::Invalid {
                kind: "private",
                source,
            }
        })?;
        let decoding = DecodingKey::from_rsa_pem(public_pem).map_err(|source| {
            KeyMaterialError::Invalid {
                kind: "public",
                source,
            }
        })?;

        let keys = Self { encoding, decoding };
        keys.probe()?;
        Ok(keys)
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    // PEM parsing alone accepts truncated DER and unrelated halves; a sign/verify
    // round trip is the only check that catches both.
    fn probe(&self) -> Result<(), KeyMaterialError> {
        #[derive(Serialize, Deserialize)]
        struct Probe {
            exp: i64,
        }

        let token = encode(
            &Header::new(Algorithm::RS256),
            &Probe { exp: i64::MAX / 2 },
            &self.encoding,
        )
        .map_err(|source| KeyMaterialError::Invalid {
            kind: "private",
            source,
        })?;

        decode::<Probe>(&token, &self.decoding, &Validation::new(Algorithm::RS256))
            .map_err(|_| KeyMaterialError::Mismatch)?;

        Ok(())
    }
}

fn read_key(root: &Path, path: &str, kind: &'static str) -> Result<Vec<u8>, KeyMaterialError> {
    let full = root.join(path);
    std::fs::read(&full).map_err(|source| KeyMaterialError::Unreadable {
        kind,
        path: full.display().to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    pub(crate) const PRIVATE_PEM: &[u8] =
        include_bytes!("../../tests/fixtures/keys/jwt_private.pem");
    pub(crate) const PUBLIC_PEM: &[u8] = include_bytes!("../../tests/fixtures/keys/jwt_public.pem");
    pub(crate) const OTHER_PRIVATE_PEM: &[u8] =
        include_bytes!("../../tests/fixtures/keys/other_private.pem");
    pub(crate) const OTHER_PUBLIC_PEM: &[u8] =
        include_bytes!("../../tests/fixtures/keys/other_public.pem");

    pub(crate) fn test_keys() -> Arc<SigningKeys> {
        Arc::new(SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PEM).unwrap())
    }

    pub(crate) fn other_keys() -> Arc<SigningKeys> {
        Arc::new(SigningKeys::from_pem(OTHER_PRIVATE_PEM, OTHER_PUBLIC_PEM).unwrap())
    }

    fn fixtures_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
    }

    #[test]
    fn test_load_from_files() {
        let keys = SigningKeys::load(
            &fixtures_root(),
            Some("keys/jwt_private.pem"),
            Some("keys/jwt_public.pem"),
        );
        assert!(keys.is_ok());
    }

    #[test]
    fn test_unset_paths_rejected() {
        let err = SigningKeys::load(&fixtures_root(), None, Some("keys/jwt_public.pem"))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            KeyMaterialError::PathNotSet("JWT_PRIVATE_KEY_PATH")
        ));

        let err = SigningKeys::load(&fixtures_root(), Some("keys/jwt_private.pem"), Some("  "))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            KeyMaterialError::PathNotSet("JWT_PUBLIC_KEY_PATH")
        ));
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = SigningKeys::load(
            &fixtures_root(),
            Some("keys/does_not_exist.pem"),
            Some("keys/jwt_public.pem"),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            KeyMaterialError::Unreadable {
                kind: "private",
                ..
            }
        ));
    }

    #[test]
    fn test_garbage_pem_rejected() {
        let err = SigningKeys::from_pem(b"not a key", PUBLIC_PEM).err().unwrap();
        assert!(matches!(
            err,
            KeyMaterialError::Invalid {
                kind: "private",
                ..
            }
        ));

        let empty_public = b"-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----\n";
        let err = SigningKeys::from_pem(PRIVATE_PEM, empty_public)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            KeyMaterialError::Invalid { .. } | KeyMaterialError::Mismatch
        ));
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let err = SigningKeys::from_pem(PRIVATE_PEM, OTHER_PUBLIC_PEM)
            .err()
            .unwrap();
        assert!(matches!(err, KeyMaterialError::Mismatch));
    }
}
