//! Bit-set/clear/test over the data-block and GIT bitmaps, plus group-word fetch.
//!
//! Grounded on `original_source/bitmaps.c`. That file's `sffs_set_data_bm` and
//! `sffs_set_GIT_bm` both address `s_GIT_bitmap_start` — the historical bug `spec.md` calls
//! out under Open Questions. Here the two regions are passed in explicitly by the caller
//! (`Context`), so there is no base to confuse: a `Bitmap` only ever knows about the one
//! region it was constructed over.

use crate::device::Device;
use crate::error::SffsError;
use crate::error::SffsResult;
use crate::superblock::Region;

/// A bitmap over one region of the volume (the data bitmap or the GIT bitmap).
///
/// Bit `id` lives in byte `id/8` of block `id/(block_size*8)` within the region; the chosen
/// bit is `id mod 8`.
pub struct Bitmap<'a> {
	region: Region,
	block_size: u32,
	dev: &'a mut Device,
}

impl<'a> Bitmap<'a> {
	pub fn new(dev: &'a mut Device, region: Region, block_size: u32) -> Self {
		Self {
			region,
			block_size,
			dev,
		}
	}

	fn locate(&self, id: u32) -> (u32, usize, u8) {
		let bits_per_block = self.block_size * 8;
		let block = id / bits_per_block;
		let within = id % bits_per_block;
		(block, (within / 8) as usize, (within % 8) as u8)
	}

	fn read_block(&mut self, block: u32) -> SffsResult<Vec<u8>> {
		let mut buf = vec![0u8; self.block_size as usize];
		self.dev.read_blocks(self.region.start + block, 1, &mut buf)?;
		Ok(buf)
	}

	fn write_block(&mut self, block: u32, buf: &[u8]) -> SffsResult<()> {
		self.dev.write_blocks(self.region.start + block, 1, buf)
	}

	/// Sets bit `id`. Fails with `SffsError::Fs` if it was already set — a double-set is a
	/// corruption signal, not a no-op.
	pub fn set(&mut self, id: u32) -> SffsResult<()> {
		let (block, byte, bit) = self.locate(id);
		let mut buf = self.read_block(block)?;
		let mask = 1u8 << bit;
		if buf[byte] & mask != 0 {
			log::warn!("double-set of bitmap bit {id}");
			return Err(SffsError::Fs);
		}
		buf[byte] |= mask;
		self.write_block(block, &buf)
	}

	/// Clears bit `id`. Always succeeds (clearing an already-clear bit is a no-op).
	pub fn unset(&mut self, id: u32) -> SffsResult<()> {
		let (block, byte, bit) = self.locate(id);
		let mut buf = self.read_block(block)?;
		buf[byte] &= !(1u8 << bit);
		self.write_block(block, &buf)
	}

	/// Returns whether bit `id` is set.
	pub fn check(&mut self, id: u32) -> SffsResult<bool> {
		let (block, byte, bit) = self.locate(id);
		let buf = self.read_block(block)?;
		Ok(buf[byte] & (1u8 << bit) != 0)
	}

	/// Reads the 32-bit word covering group `group_index`, given `blocks_per_group` bits per
	/// group. Used by the allocator to test an entire group for freeness at once.
	pub fn group_word(&mut self, group_index: u32, blocks_per_group: u32) -> SffsResult<u32> {
		let first_id = group_index * blocks_per_group;
		let (block, byte, _) = self.locate(first_id);
		let buf = self.read_block(block)?;
		let bytes_per_group = (blocks_per_group / 8) as usize;
		let mut word = [0u8; 4];
		let n = bytes_per_group.min(4);
		word[..n].copy_from_slice(&buf[byte..byte + n]);
		Ok(u32::from_le_bytes(word))
	}
}
