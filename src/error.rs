//! Errors returned by the filesystem callbacks.
//!
//! Every callback fails with one of three kinds of error, each of which maps onto an errno
//! value for the transport:
//!
//! - [`FsError::NotFound`]: the path does not resolve (`ENOENT`)
//! - [`FsError::InvalidArgument`]: wrong kind of node, or an unknown handle (`EINVAL`)
//! - [`FsError::Io`]: the underlying file failed, with its original errno

use rustix::io::Errno;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FsError {
    #[error("No such entry {0:?}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("I/O error: {0}")]
    Io(#[from] Errno),
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        FsError::Io(Errno::from_io_error(&err).unwrap_or(Errno::IO))
    }
}

impl FsError {
    pub fn errno(&self) -> Errno {
        match self {
            FsError::NotFound(..) => Errno::NOENT,
            FsError::InvalidArgument(..) => Errno::INVAL,
            FsError::Io(errno) => *errno,
        }
    }

    pub fn raw_os_error(&self) -> i32 {
        self.errno().raw_os_error()
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(FsError::NotFound("/x".into()).errno(), Errno::NOENT);
        assert_eq!(FsError::InvalidArgument("x".into()).errno(), Errno::INVAL);
        assert_eq!(FsError::Io(Errno::ACCESS).errno(), Errno::ACCESS);
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::from_raw_os_error(Errno::PERM.raw_os_error());
        assert_eq!(FsError::from(err), FsError::Io(Errno::PERM));

        // errors without an errno still need to map onto something
        let err = std::io::Error::from(ErrorKind::UnexpectedEof);
        assert_eq!(FsError::from(err), FsError::Io(Errno::IO));
    }
}
