use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{DescribeIoError, SyncError};
use crate::state::{format_timestamp, parse_optional_timestamp, FileRecord, Timestamp};
use crate::store::MetadataStore;

const SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS files (filename TEXT, bucket TEXT, hash TEXT, last_modified TEXT)";

/// The metadata this machine recorded after each of its syncs, kept in a SQLite file.
///
/// A connection is opened for every call and closed again afterwards, so a
/// `get` straight after a `put` always sees the write.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Opens the store, creating the file and the `files` table if needed.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, SyncError> {
        let store = LocalStore { path: path.into() };
        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .describe(|| format!("creating directory for local store {:?}", store.path))?;
            }
        }
        store.connect()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, SyncError> {
        trace!("Opening local store {:?}", self.path);
        let conn = Connection::open(&self.path)?;
        conn.execute(SCHEMA, [])?;
        Ok(conn)
    }

    /// Every record for `bucket`, ordered by filename.
    pub fn records(&self, bucket: &str) -> Result<Vec<FileRecord>, SyncError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT filename, hash, last_modified FROM files WHERE bucket = ?1 ORDER BY filename",
        )?;
        let rows = stmt.query_map(params![bucket], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (filename, hash, last_modified) = row?;
            let last_modified = parse_optional_timestamp(last_modified.as_deref())?;
            records.push(FileRecord::new(bucket, &filename, &hash, last_modified));
        }
        Ok(records)
    }
}

impl MetadataStore for LocalStore {
    fn get(&self, bucket: &str, filename: &str) -> Result<Option<FileRecord>, SyncError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT hash, last_modified FROM files WHERE filename = ?1 AND bucket = ?2",
                params![filename, bucket],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;

        match row {
            Some((hash, last_modified)) => {
                let last_modified = parse_optional_timestamp(last_modified.as_deref())?;
                trace!("Local record for {}/{}: {} {:?}", bucket, filename, hash, last_modified);
                Ok(Some(FileRecord::new(bucket, filename, &hash, last_modified)))
            }
            None => {
                trace!("No local record for {}/{}", bucket, filename);
                Ok(None)
            }
        }
    }

    fn put(
        &self,
        bucket: &str,
        filename: &str,
        hash: &str,
        last_modified: Option<&Timestamp>,
    ) -> Result<(), SyncError> {
        let mut conn = self.connect()?;
        let last_modified = last_modified.map(format_timestamp);
        let tx = conn.transaction()?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM files WHERE filename = ?1 AND bucket = ?2",
                params![filename, bucket],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if exists {
            tx.execute(
                "UPDATE files SET hash = ?1, last_modified = ?2 WHERE filename = ?3 AND bucket = ?4",
                params![hash, last_modified, filename, bucket],
            )?;
        } else {
            tx.execute(
                "INSERT INTO files (filename, bucket, hash, last_modified) VALUES (?1, ?2, ?3, ?4)",
                params![filename, bucket, hash, last_modified],
            )?;
        }
        tx.commit()?;
        debug!("Stored local record {}/{} = {} {:?}", bucket, filename, hash, last_modified);
        Ok(())
    }
}
