//! The per-mount context: disk handle, in-memory superblock and scratch buffer.
//!
//! Grounded on `original_source/include/sffs_context.h`'s `sffs_context_t`. Unlike the C
//! version there is no process-global instance: a mount owns exactly one `Context`, threaded
//! explicitly into every operation (Design Note 9's "no process-global singletons").

use std::path::Path;

use crate::bitmap::Bitmap;
use crate::config::MountOptions;
use crate::device::Device;
use crate::error::SffsResult;
use crate::superblock::Superblock;

/// A mounted volume: the open device, its superblock, and a scratch block buffer shared by
/// every operation run through this context.
pub struct Context {
	pub dev: Device,
	pub sb: Superblock,
	scratch: Vec<u8>,
}

impl Context {
	/// Opens `path` and loads its superblock.
	///
	/// The superblock's own location (byte offset 1024) doesn't depend on knowing the
	/// volume's real block size in advance, so the device is opened with a bootstrap block
	/// size of 1024 for the initial read, then reconfigured to the volume's actual block size.
	pub fn mount(path: &Path, _options: MountOptions) -> SffsResult<Self> {
		let mut dev = Device::open(path, 1024)?;
		let sb = Superblock::read(&mut dev)?;
		dev.set_block_size(sb.block_size);
		let scratch = vec![0u8; sb.block_size as usize];
		log::debug!("mounted volume: {} data blocks, {} inodes", sb.blocks_count, sb.inodes_count);
		Ok(Self { dev, sb, scratch })
	}

	/// Wraps an already-open device and freshly formatted superblock, as returned by
	/// [`crate::format::format`].
	pub fn from_parts(dev: Device, sb: Superblock) -> Self {
		let scratch = vec![0u8; sb.block_size as usize];
		Self { dev, sb, scratch }
	}

	/// Serializes the in-memory superblock back to disk. Per `spec.md` §5, this is only
	/// required at unmount and at bridge-issued `statfs`; every other operation leaves the
	/// on-disk copy stale until then.
	pub fn write_superblock(&mut self) -> SffsResult<()> {
		self.sb.write(&mut self.dev)
	}

	pub fn data_bitmap(&mut self) -> Bitmap<'_> {
		Bitmap::new(&mut self.dev, self.sb.data_bitmap, self.sb.block_size)
	}

	pub fn git_bitmap(&mut self) -> Bitmap<'_> {
		Bitmap::new(&mut self.dev, self.sb.git_bitmap, self.sb.block_size)
	}

	/// The per-context scratch buffer. Its contents must not be assumed to persist across
	/// calls; every operation that borrows it overwrites it freely.
	pub fn scratch(&mut self) -> &mut [u8] {
		&mut self.scratch
	}
}
