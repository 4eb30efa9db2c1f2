//! The error taxonomy returned by the core: a closed sum type instead of raw
//! integers, with no retry or rollback semantics attached to any variant.

use std::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FsError>;

/// Everything that can go wrong while mounting, resolving, allocating,
/// syncing or dropping a tree.
#[derive(Debug)]
pub enum FsError {
	/// The driver failed a read or write, or a read returned short.
	Io(io::Error),
	/// The inode or data bitmap is exhausted.
	NoSpace,
	/// A dentry was not present during detach, or a path component was not
	/// present during a non-`lookup` operation that requires existence.
	NotFound,
	/// Dropping the root, overflowing a directory's allocated data blocks,
	/// or a path without a leading slash.
	Invalid(&'static str),
	/// Reserved for the VFS adapter; the core itself never raises this.
	Exists,
	/// Reserved for the VFS adapter.
	IsDir,
	/// Reserved for the VFS adapter.
	NotDir,
}

impl fmt::Display for FsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FsError::Io(e) => write!(f, "I/O error: {e}"),
			FsError::NoSpace => write!(f, "no space left on device"),
			FsError::NotFound => write!(f, "not found"),
			FsError::Invalid(why) => write!(f, "invalid operation: {why}"),
			FsError::Exists => write!(f, "already exists"),
			FsError::IsDir => write!(f, "is a directory"),
			FsError::NotDir => write!(f, "not a directory"),
		}
	}
}

impl std::error::Error for FsError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			FsError::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for FsError {
	fn from(e: io::Error) -> Self {
		FsError::Io(e)
	}
}
