//! A remote table kept as a folder of item files, typically on a share every machine mounts.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::RemoteError;
use crate::store::remote::{RemoteBackend, RemoteItem};
use crate::util::hash_single;

const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct Archive {
    pub directory: PathBuf,
}

impl Archive {
    pub fn new(directory: PathBuf) -> Result<Self, io::Error> {
        // creates the archive directory
        if !directory.exists() {
            fs::create_dir_all(&directory)?;
        }
        Ok(Archive { directory })
    }

    pub fn file_for_key(&self, key: &str) -> PathBuf {
        self.directory.join(hash_single(key).to_string())
    }
}

impl RemoteBackend for Archive {
    fn get_item(&self, key: &str) -> Result<Option<RemoteItem>, RemoteError> {
        let archive_file = self.file_for_key(key);
        trace!("Reading archive file {:?} for {:?}", archive_file, key);
        let file = match File::open(&archive_file) {
            Ok(file) => file,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(transport_error(&archive_file, e)),
        };

        let item = read_item(&mut BufReader::new(file)).map_err(|e| match e {
            ReadError::IoError(e) => transport_error(&archive_file, e),
            ReadError::InvalidVersion(version) => RemoteError::Malformed(format!(
                "archive file {:?} has version {}, expected {}",
                archive_file, version, ARCHIVE_VERSION
            )),
            ReadError::DeserializeError(e) => {
                RemoteError::Malformed(format!("archive file {:?}: {}", archive_file, e))
            }
        })?;

        if item.key != key {
            return Err(RemoteError::Malformed(format!(
                "archive file {:?} holds {:?}, not {:?}",
                archive_file, item.key, key
            )));
        }
        Ok(Some(item))
    }

    fn put_item(&self, item: &RemoteItem) -> Result<(), RemoteError> {
        let archive_file = self.file_for_key(&item.key);
        let partial = archive_file.with_extension("part");
        debug!("Writing archive file {:?} for {:?}", archive_file, item.key);

        let write = || -> Result<(), WriteError> {
            let mut out = BufWriter::new(File::create(&partial)?);
            write_item(&mut out, item)?;
            out.flush()?;
            fs::rename(&partial, &archive_file)?;
            Ok(())
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&partial);
            match e {
                WriteError::IoError(e) => transport_error(&archive_file, e),
                WriteError::SerializeError(e) => {
                    RemoteError::Malformed(format!("encoding {:?}: {}", item.key, e))
                }
            }
        })
    }
}

fn transport_error(path: &Path, e: io::Error) -> RemoteError {
    RemoteError::Transport(format!("{:?}: {}", path, e))
}

#[derive(Debug)]
pub enum ReadError {
    InvalidVersion(u32),
    IoError(io::Error),
    DeserializeError(bincode::Error),
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        ReadError::IoError(e)
    }
}

impl From<bincode::Error> for ReadError {
    fn from(e: bincode::Error) -> Self {
        ReadError::DeserializeError(e)
    }
}

#[derive(Debug)]
pub enum WriteError {
    IoError(io::Error),
    SerializeError(bincode::Error),
}

impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        WriteError::IoError(e)
    }
}

impl From<bincode::Error> for WriteError {
    fn from(e: bincode::Error) -> Self {
        WriteError::SerializeError(e)
    }
}

/// reads an item from a binary stream
fn read_item<R: io::Read>(read: &mut R) -> Result<RemoteItem, ReadError> {
    let version = read.read_u32::<LittleEndian>()?;
    if version != ARCHIVE_VERSION {
        return Err(ReadError::InvalidVersion(version));
    }
    let result = bincode::deserialize_from(read)?;
    Ok(result)
}

// writes an item to a binary stream
fn write_item<W: io::Write>(out: &mut W, item: &RemoteItem) -> Result<(), WriteError> {
    out.write_u32::<LittleEndian>(ARCHIVE_VERSION)?;
    bincode::serialize_into(out, item)?;
    Ok(())
}
