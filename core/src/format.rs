//! The format routine: compute region sizes, write the initial superblock, zero the bitmaps.
//!
//! Grounded on `original_source/utils/sffs_mkfs.c`'s `__sffs_init`, generalizing the
//! teacher's `Ext2Factory::create` (`mkfs/src/ext2.rs`) from a hardcoded ext2 layout to
//! SFFS's own region arithmetic.

use std::fs::OpenOptions;
use std::path::Path;

use crate::config::FormatOptions;
use crate::context::Context;
use crate::device::Device;
use crate::error::SffsError;
use crate::error::SffsResult;

/// Creates (or truncates to size) the file at `path`, writes a fresh superblock and zeroed
/// bitmaps, and returns a [`Context`] ready to use.
pub fn format(path: &Path, volume_size: u64, options: FormatOptions) -> SffsResult<Context> {
	let sb = options.resolve(volume_size)?;

	let file = OpenOptions::new()
		.create(true)
		.read(true)
		.write(true)
		.truncate(true)
		.open(path)
		.map_err(SffsError::DevStat)?;
	file.set_len(volume_size).map_err(SffsError::DevStat)?;

	let mut dev = Device::from_file(file, sb.block_size);

	log::debug!(
		"formatting volume: {} data blocks, {} inodes, block size {}",
		sb.blocks_count,
		sb.inodes_count,
		sb.block_size
	);

	zero_region(&mut dev, sb.data_bitmap.start, sb.data_bitmap.size, sb.block_size)?;
	zero_region(&mut dev, sb.git_bitmap.start, sb.git_bitmap.size, sb.block_size)?;

	sb.write(&mut dev)?;

	Ok(Context::from_parts(dev, sb))
}

fn zero_region(dev: &mut Device, start: u32, size: u32, block_size: u32) -> SffsResult<()> {
	let zeros = vec![0u8; block_size as usize];
	for block in start..start + size {
		dev.write_blocks(block, 1, &zeros)?;
	}
	Ok(())
}
