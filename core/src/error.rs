//! The closed set of error kinds every core operation can return.

use thiserror::Error;

/// Every public operation returns this result type.
pub type SffsResult<T> = Result<T, SffsError>;

/// A core operation failure.
///
/// The kinds mirror `original_source/include/sffs.h`'s `sffs_err_t`: a closed set, never
/// translated by callers. `Fs` is reserved for corruption signals (a bitmap bit already set,
/// an allocator scan exhausting the volume without filling its request).
#[derive(Debug, Error)]
pub enum SffsError {
	/// Bad arguments passed to an operation.
	#[error("invalid argument")]
	InvArg,
	/// Unsupported block size (not a power of two, or larger than the page size).
	#[error("invalid block size")]
	InvBlk,
	/// Volume arithmetic self-check failed during formatting.
	#[error("filesystem initialization failed")]
	Init,
	/// Host memory allocation failed.
	#[error("memory allocation failed")]
	MemAlloc,
	/// An on-disk invariant was violated: a bitmap bit was already set, or a scan exhausted
	/// the volume without finding the blocks the free count promised.
	#[error("filesystem structure is corrupted")]
	Fs,
	/// The volume has no space left for the requested allocation.
	#[error("no space left on volume")]
	NoSpc,
	/// A block read failed.
	#[error("device read error: {0}")]
	DevRead(#[source] std::io::Error),
	/// A block write failed.
	#[error("device write error: {0}")]
	DevWrite(#[source] std::io::Error),
	/// Positioning the device for a read or write failed.
	#[error("device seek error: {0}")]
	DevSeek(#[source] std::io::Error),
	/// Querying the backing device's metadata failed.
	#[error("device stat error: {0}")]
	DevStat(#[source] std::io::Error),
	/// The requested entry does not exist.
	#[error("no such entry")]
	NoEnt,
	/// The entry already exists.
	#[error("entry already exists")]
	EntExis,
}

impl SffsError {
	/// Suggests a POSIX errno for a bridge translating this error into a host-visible result.
	///
	/// Mirrors the per-call-site mapping `original_source/src/sffs_fuse.c` does ad hoc (e.g. its
	/// lookup path returning `-ENOENT`). The core never uses this itself; it exists so a FUSE
	/// bridge doesn't have to re-derive the mapping.
	pub fn errno_hint(&self) -> i32 {
		match self {
			Self::InvArg => libc::EINVAL,
			Self::InvBlk => libc::EINVAL,
			Self::Init => libc::EIO,
			Self::MemAlloc => libc::ENOMEM,
			Self::Fs => libc::EUCLEAN,
			Self::NoSpc => libc::ENOSPC,
			Self::DevRead(_) | Self::DevWrite(_) | Self::DevSeek(_) | Self::DevStat(_) => libc::EIO,
			Self::NoEnt => libc::ENOENT,
			Self::EntExis => libc::EEXIST,
		}
	}
}
