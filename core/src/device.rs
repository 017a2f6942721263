//! The block-level device abstraction.
//!
//! Grounded on `original_source/src/sffs_device.c`: every operation seeks to
//! `block * block_size` and transfers an exact `n * block_size` bytes. Writing to block 0 (the
//! reserved boot block) is refused, matching the C implementation's explicit check.

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;

use crate::error::SffsError;
use crate::error::SffsResult;

/// A fixed-size-block backing store.
///
/// Holds the block size used to translate block numbers into byte offsets; it knows nothing
/// about the volume's layout beyond that, mirroring the dependency order of `spec.md` §2 where
/// `Device` sits below `Superblock`.
pub struct Device {
	file: File,
	block_size: u32,
}

impl Device {
	/// Opens `path` as a backing store, truncating neither its length nor its contents.
	pub fn open(path: &Path, block_size: u32) -> SffsResult<Self> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.open(path)
			.map_err(SffsError::DevStat)?;
		Ok(Self { file, block_size })
	}

	/// Wraps an already-open file, e.g. one created fresh by the formatting routine.
	pub fn from_file(file: File, block_size: u32) -> Self {
		Self { file, block_size }
	}

	pub fn block_size(&self) -> u32 {
		self.block_size
	}

	/// Reconfigures the block size used for subsequent addressing. Used once, at mount time,
	/// after the superblock (read with a bootstrap block size of 1024) reveals the volume's
	/// real block size.
	pub fn set_block_size(&mut self, block_size: u32) {
		self.block_size = block_size;
	}

	fn seek_to(&mut self, block: u32) -> SffsResult<()> {
		let offset = block as u64 * self.block_size as u64;
		self.file
			.seek(SeekFrom::Start(offset))
			.map_err(SffsError::DevSeek)?;
		Ok(())
	}

	/// Reads `n` blocks starting at `block` into `out`, which must be exactly `n * block_size`
	/// bytes long.
	pub fn read_blocks(&mut self, block: u32, n: u32, out: &mut [u8]) -> SffsResult<()> {
		let len = n as usize * self.block_size as usize;
		if out.len() != len {
			return Err(SffsError::InvArg);
		}
		self.seek_to(block)?;
		self.file.read_exact(out).map_err(SffsError::DevRead)?;
		log::trace!("read {n} block(s) from {block}");
		Ok(())
	}

	/// Writes `n` blocks starting at `block` from `data`, which must be exactly
	/// `n * block_size` bytes long. Block 0 (the boot block) is refused.
	pub fn write_blocks(&mut self, block: u32, n: u32, data: &[u8]) -> SffsResult<()> {
		if block == 0 {
			return Err(SffsError::InvArg);
		}
		let len = n as usize * self.block_size as usize;
		if data.len() != len {
			return Err(SffsError::InvArg);
		}
		self.seek_to(block)?;
		self.file.write_all(data).map_err(SffsError::DevWrite)?;
		self.file.sync_data().map_err(SffsError::DevWrite)?;
		log::trace!("wrote {n} block(s) to {block}");
		Ok(())
	}

	/// Like [`Self::read_blocks`], but `block` is relative to the start of the data region.
	pub fn read_data_blocks(
		&mut self,
		data_start: u32,
		block: u32,
		n: u32,
		out: &mut [u8],
	) -> SffsResult<()> {
		self.read_blocks(data_start + block, n, out)
	}

	/// Like [`Self::write_blocks`], but `block` is relative to the start of the data region.
	pub fn write_data_blocks(
		&mut self,
		data_start: u32,
		block: u32,
		n: u32,
		data: &[u8],
	) -> SffsResult<()> {
		self.write_blocks(data_start + block, n, data)
	}

	/// Raw byte-offset read, bypassing the block-size quantization and the block-0 refusal.
	/// Reserved for the superblock, which `original_source/src/sffs.c` seeks to directly
	/// (`sffs_read_sb`/`sffs_write_sb`) rather than routing through the block-oriented calls.
	pub fn read_at(&mut self, offset: u64, out: &mut [u8]) -> SffsResult<()> {
		self.file
			.seek(SeekFrom::Start(offset))
			.map_err(SffsError::DevSeek)?;
		self.file.read_exact(out).map_err(SffsError::DevRead)
	}

	/// Raw byte-offset write, bypassing the block-size quantization and the block-0 refusal.
	pub fn write_at(&mut self, offset: u64, data: &[u8]) -> SffsResult<()> {
		self.file
			.seek(SeekFrom::Start(offset))
			.map_err(SffsError::DevSeek)?;
		self.file.write_all(data).map_err(SffsError::DevWrite)?;
		self.file.sync_data().map_err(SffsError::DevWrite)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::NamedTempFile;

	fn open_scratch(block_size: u32, blocks: u32) -> (Device, NamedTempFile) {
		let tmp = NamedTempFile::new().unwrap();
		tmp.as_file()
			.set_len(block_size as u64 * blocks as u64)
			.unwrap();
		let dev = Device::open(tmp.path(), block_size).unwrap();
		(dev, tmp)
	}

	#[test]
	fn write_then_read_roundtrip() {
		let (mut dev, _tmp) = open_scratch(512, 4);
		let data = vec![0xAB; 512];
		dev.write_blocks(1, 1, &data).unwrap();

		let mut out = vec![0u8; 512];
		dev.read_blocks(1, 1, &mut out).unwrap();
		assert_eq!(out, data);
	}

	#[test]
	fn block_zero_write_refused() {
		let (mut dev, _tmp) = open_scratch(512, 4);
		let data = vec![0u8; 512];
		assert!(matches!(
			dev.write_blocks(0, 1, &data),
			Err(SffsError::InvArg)
		));
	}

	#[test]
	fn wrong_length_buffer_refused() {
		let (mut dev, _tmp) = open_scratch(512, 4);
		let data = vec![0u8; 10];
		assert!(matches!(
			dev.write_blocks(1, 1, &data),
			Err(SffsError::InvArg)
		));
	}

	#[test]
	fn data_relative_addressing() {
		let (mut dev, _tmp) = open_scratch(512, 8);
		let data = vec![0x11; 512];
		dev.write_data_blocks(2, 1, 1, &data).unwrap();

		let mut out = vec![0u8; 512];
		dev.read_blocks(3, 1, &mut out).unwrap();
		assert_eq!(out, data);
	}
}
