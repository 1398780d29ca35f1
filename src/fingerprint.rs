use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use sha1::{Digest, Sha1};

use crate::error::{DescribeIoError, SyncError};

const BUFFER_SIZE: usize = 64 * 1024;

/// Digests everything `read` yields, a buffer at a time, into a lowercase hex SHA-1.
pub fn fingerprint<R: Read>(read: &mut R) -> io::Result<String> {
    let mut hasher = Sha1::new();
    let mut buffer = vec![0; BUFFER_SIZE];
    loop {
        let n = match read.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Fingerprints the file at `path`.
pub fn fingerprint_file(path: &Path) -> Result<String, SyncError> {
    trace!("Fingerprinting {:?}", path);
    let mut file = File::open(path).describe(|| format!("opening {:?} for hashing", path))?;
    fingerprint(&mut file).describe(|| format!("reading {:?} for hashing", path))
}
