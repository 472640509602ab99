use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use facegate_core::{Descriptor, DescriptorGallery, GalleryStore, IdentityId, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

use crate::codec::{decode_values, encode_values};
use crate::crypto::{CryptoError, DescriptorCipher};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    identity TEXT PRIMARY KEY,
    has_face_recognition INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS descriptors (
    id TEXT PRIMARY KEY,
    identity TEXT NOT NULL REFERENCES identities(identity) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    data BLOB NOT NULL,
    encrypted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_descriptors_identity ON descriptors(identity, position);
";

#[derive(Error, Debug)]
pub enum SqliteStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("descriptor {id} is encrypted but no store key is configured")]
    KeyRequired { id: String },
    #[error("descriptor {id}: {source}")]
    Crypto {
        id: String,
        #[source]
        source: CryptoError,
    },
    #[error("database connection lock poisoned")]
    Poisoned,
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        StoreError::backend(err)
    }
}

/// Gallery store backed by a single SQLite database.
///
/// Writes from this process are serialized by the connection mutex. Writers
/// in other processes are last-write-wins per identity.
pub struct SqliteGalleryStore {
    conn: Mutex<Connection>,
    cipher: Option<DescriptorCipher>,
}

impl SqliteGalleryStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, SqliteStoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SqliteStoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened gallery database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, SqliteStoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            cipher: None,
        })
    }

    /// Seal descriptors written from now on. Existing plaintext rows stay
    /// readable.
    pub fn with_cipher(mut self, cipher: DescriptorCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.conn.lock().map_err(|_| SqliteStoreError::Poisoned)
    }

    fn seal(&self, id: &str, descriptor: &Descriptor) -> Result<(Vec<u8>, bool), SqliteStoreError> {
        let plain = encode_values(descriptor.values());
        match &self.cipher {
            Some(cipher) => {
                let sealed = cipher.seal(&plain).map_err(|source| SqliteStoreError::Crypto {
                    id: id.to_string(),
                    source,
                })?;
                Ok((sealed, true))
            }
            None => Ok((plain, false)),
        }
    }

    fn unseal(&self, id: &str, data: Vec<u8>, encrypted: bool) -> Result<Descriptor, SqliteStoreError> {
        let plain = if encrypted {
            let cipher = self.cipher.as_ref().ok_or_else(|| SqliteStoreError::KeyRequired {
                id: id.to_string(),
            })?;
            cipher.open(&data).map_err(|source| SqliteStoreError::Crypto {
                id: id.to_string(),
                source,
            })?
        } else {
            data
        };

        // Ragged blobs load as empty descriptors; the matcher skips them.
        let values = decode_values(&plain).unwrap_or_else(|| {
            tracing::warn!(id, len = plain.len(), "descriptor blob is not a whole number of values");
            Vec::new()
        });
        Ok(Descriptor::from_values(values))
    }

    fn load(&self, identity: &IdentityId) -> Result<Option<DescriptorGallery>, SqliteStoreError> {
        let conn = self.lock()?;
        let enrolled: Option<bool> = conn
            .query_row(
                "SELECT has_face_recognition FROM identities WHERE identity = ?1",
                params![identity.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if enrolled != Some(true) {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT id, data, encrypted FROM descriptors WHERE identity = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![identity.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;

        let mut descriptors = Vec::new();
        for row in rows {
            let (id, data, encrypted) = row?;
            descriptors.push(self.unseal(&id, data, encrypted)?);
        }

        if descriptors.is_empty() {
            tracing::warn!(identity = %identity, "identity flagged enrolled but has no descriptors");
            return Ok(None);
        }
        Ok(Some(DescriptorGallery::new(descriptors)))
    }

    fn replace(
        &self,
        identity: &IdentityId,
        gallery: &DescriptorGallery,
    ) -> Result<(), SqliteStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        tx.execute(
            "INSERT INTO identities (identity, has_face_recognition, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(identity) DO UPDATE SET
                has_face_recognition = excluded.has_face_recognition,
                updated_at = excluded.updated_at",
            params![identity.as_str(), !gallery.is_empty(), now],
        )?;
        tx.execute(
            "DELETE FROM descriptors WHERE identity = ?1",
            params![identity.as_str()],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO descriptors (id, identity, position, data, encrypted, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (position, descriptor) in gallery.iter().enumerate() {
                let id = Uuid::new_v4().to_string();
                let (data, encrypted) = self.seal(&id, descriptor)?;
                insert.execute(params![
                    id,
                    identity.as_str(),
                    position as i64,
                    data,
                    encrypted,
                    now
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(identity = %identity, count = gallery.len(), "gallery replaced");
        Ok(())
    }

    fn enrolled(&self, identity: &IdentityId) -> Result<bool, SqliteStoreError> {
        let conn = self.lock()?;
        let enrolled: bool = conn.query_row(
            "SELECT EXISTS (
                SELECT 1 FROM identities i JOIN descriptors d ON d.identity = i.identity
                WHERE i.identity = ?1 AND i.has_face_recognition = 1
             )",
            params![identity.as_str()],
            |row| row.get(0),
        )?;
        Ok(enrolled)
    }

    fn identities(&self) -> Result<Vec<IdentityId>, SqliteStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT identity FROM identities WHERE has_face_recognition = 1 ORDER BY identity",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(IdentityId::from).collect())
    }
}

impl GalleryStore for SqliteGalleryStore {
    fn load_gallery(&self, identity: &IdentityId) -> Result<Option<DescriptorGallery>, StoreError> {
        Ok(self.load(identity)?)
    }

    fn save_gallery(
        &self,
        identity: &IdentityId,
        gallery: &DescriptorGallery,
    ) -> Result<(), StoreError> {
        Ok(self.replace(identity, gallery)?)
    }

    fn clear_gallery(&self, identity: &IdentityId) -> Result<(), StoreError> {
        Ok(self.replace(identity, &DescriptorGallery::default())?)
    }

    fn enrolled_identities(&self) -> Result<Vec<IdentityId>, StoreError> {
        Ok(self.identities()?)
    }

    fn is_enrolled(&self, identity: &IdentityId) -> Result<bool, StoreError> {
        Ok(self.enrolled(identity)?)
    }
}
