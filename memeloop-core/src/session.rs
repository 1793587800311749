use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session io error at {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Opaque authenticated-session state for the publishing target. The store
/// never inspects it; validity is only discovered when the publisher tries
/// to use it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionBlob(Value);

impl SessionBlob {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Remove non-portable top-level fields before persisting.
    pub fn strip(&mut self, fields: &[String]) {
        if let Value::Object(map) = &mut self.0 {
            for field in fields {
                map.remove(field);
            }
        }
    }
}

/// At most one session blob exists on disk at a time; its presence means
/// "skip interactive login".
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> SessionResult<Option<SessionBlob>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(SessionBlob(serde_json::from_str(&content)?))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionError::Io {
                source,
                path: self.path.clone(),
            }),
        }
    }

    pub fn save(&self, blob: &SessionBlob) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| SessionError::Io {
                    source,
                    path: parent.to_path_buf(),
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(&blob.0)?;
        std::fs::write(&self.path, serialized).map_err(|source| SessionError::Io {
            source,
            path: self.path.clone(),
        })?;
        debug!(path = %self.path.display(), "session blob saved");
        Ok(())
    }

    /// Idempotent: deleting an absent blob is not an error.
    pub fn invalidate(&self) -> SessionResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "session blob invalidated");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io {
                source,
                path: self.path.clone(),
            }),
        }
    }
}
