use super::{SessionState, StateError};
use crate::shared::digest::{constant_time_eq, keyed_sha256_hex, to_hex};
use crate::shared::fs_atomic::atomic_write_file;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

const SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityStatus {
    Valid,
    Missing,
    Mismatch,
}

#[derive(Clone, PartialEq, Eq)]
pub struct IntegrityKey {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for IntegrityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityKey").finish_non_exhaustive()
    }
}

impl IntegrityKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn load_or_create(path: &Path) -> Result<Self, StateError> {
        match fs::read_to_string(path) {
            Ok(raw) => {
                let trimmed = raw.trim();
                if trimmed.len() < 32 {
                    return Err(StateError::InvalidSecret {
                        path: path.display().to_string(),
                        reason: "secret must be at least 32 characters".to_string(),
                    });
                }
                Ok(Self::from_bytes(trimmed.as_bytes().to_vec()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Self::create(path),
            Err(source) => Err(StateError::ReadSecret {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn create(path: &Path) -> Result<Self, StateError> {
        let mut bytes = [0u8; SECRET_BYTES];
        getrandom::getrandom(&mut bytes)
            .map_err(|err| StateError::GenerateSecret(err.to_string()))?;
        let encoded = to_hex(&bytes);
        atomic_write_file(path, encoded.as_bytes()).map_err(|source| StateError::WriteSecret {
            path: path.display().to_string(),
            source,
        })?;
        restrict_permissions(path);
        Ok(Self::from_bytes(encoded.into_bytes()))
    }

    pub fn sign(&self, state: &SessionState) -> Result<String, StateError> {
        let payload = canonical_payload(state)?;
        Ok(keyed_sha256_hex(&self.bytes, &payload))
    }

    pub fn seal(&self, state: &mut SessionState) -> Result<(), StateError> {
        state.signature = Some(self.sign(state)?);
        Ok(())
    }

    pub fn verify(&self, state: &SessionState) -> Result<IntegrityStatus, StateError> {
        let Some(claimed) = state.signature.as_deref() else {
            return Ok(IntegrityStatus::Missing);
        };
        let expected = self.sign(state)?;
        if constant_time_eq(claimed, &expected) {
            Ok(IntegrityStatus::Valid)
        } else {
            Ok(IntegrityStatus::Mismatch)
        }
    }
}

fn canonical_payload(state: &SessionState) -> Result<Vec<u8>, StateError> {
    let mut unsigned = state.clone();
    unsigned.signature = None;
    // serde_json::Value keeps object keys sorted, which makes the encoding canonical.
    let value = serde_json::to_value(&unsigned).map_err(StateError::Encode)?;
    serde_json::to_vec(&value).map_err(StateError::Encode)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
