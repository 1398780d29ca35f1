use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use walkdir::Error as WalkDirError;

#[derive(Debug)]
pub enum SyncError {
    IoError(io::Error),
    /// An io error along with a description of what was being attempted.
    DescribedIoError { context: String, source: io::Error },
    LocalStore(rusqlite::Error),
    Remote(RemoteError),
    RootDoesntExist(PathBuf),
    InvalidTimestamp(String),
    InvalidConfig(String),
    /// The object transport has no object under `key` in `container`.
    ObjectNotFound { container: String, key: String },
    WalkDirError(WalkDirError),
}

impl SyncError {
    /// Returns the remote store error, if that is what this is.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match *self {
            SyncError::Remote(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SyncError {
    fn from(e: io::Error) -> Self {
        SyncError::IoError(e)
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::LocalStore(e)
    }
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        SyncError::Remote(e)
    }
}

impl From<WalkDirError> for SyncError {
    fn from(e: WalkDirError) -> Self {
        SyncError::WalkDirError(e)
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SyncError::IoError(ref io) => write!(f, "io error: {}", io),
            SyncError::DescribedIoError { ref context, ref source } => {
                write!(f, "io error {}: {}", context, source)
            }
            SyncError::LocalStore(ref e) => write!(f, "local metadata store error: {}", e),
            SyncError::Remote(ref e) => write!(f, "remote metadata store error: {}", e),
            SyncError::RootDoesntExist(ref root) => write!(f, "root does not exist: {:?}", root),
            SyncError::InvalidTimestamp(ref value) => {
                write!(f, "invalid timestamp {:?} (expected RFC 3339 with an offset)", value)
            }
            SyncError::InvalidConfig(ref reason) => write!(f, "invalid configuration: {}", reason),
            SyncError::ObjectNotFound { ref container, ref key } => {
                write!(f, "no object {:?} in container {:?}", key, container)
            }
            SyncError::WalkDirError(ref e) => write!(f, "walk dir error: {}", e),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            SyncError::IoError(ref e) => Some(e),
            SyncError::DescribedIoError { ref source, .. } => Some(source),
            SyncError::LocalStore(ref e) => Some(e),
            SyncError::Remote(ref e) => Some(e),
            SyncError::WalkDirError(ref e) => Some(e),
            _ => None,
        }
    }
}

/// A failed call against the remote metadata store.
///
/// "Not found" is not an error: lookups return `Ok(None)` for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The store could not be reached (network failure, unreadable share, timeout).
    Transport(String),
    /// The store answered with a failure status other than "not found".
    Service { status: u16, message: String },
    /// The store answered with something that can't be interpreted.
    Malformed(String),
}

impl RemoteError {
    /// Whether the call that produced this error may be attempted again.
    pub fn is_transient(&self) -> bool {
        match *self {
            RemoteError::Transport(_) | RemoteError::Service { .. } => true,
            RemoteError::Malformed(_) => false,
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RemoteError::Transport(ref msg) => write!(f, "transport failure: {}", msg),
            RemoteError::Service { status, ref message } => {
                write!(f, "service returned status {}: {}", status, message)
            }
            RemoteError::Malformed(ref msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl Error for RemoteError {}

/// Attaches a description of the failed operation to an io error.
pub trait DescribeIoError<T> {
    fn describe<F: FnOnce() -> String>(self, context: F) -> Result<T, SyncError>;
}

impl<T> DescribeIoError<T> for io::Result<T> {
    fn describe<F: FnOnce() -> String>(self, context: F) -> Result<T, SyncError> {
        self.map_err(|source| SyncError::DescribedIoError { context: context(), source })
    }
}
