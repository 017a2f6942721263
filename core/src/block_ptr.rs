//! Maps an inode-relative block index to an absolute data block id.
//!
//! Grounded on `original_source/src/sffs.c`'s `sffs_get_data_block_info`.

use crate::context::Context;
use crate::error::SffsError;
use crate::error::SffsResult;
use crate::inode::InodeEntry;
use crate::inode::P;
use crate::inode::S;

/// Flags accepted by [`get_data_block_info`]. A plain bitmask rather than the `bitflags`
/// crate, matching the teacher's own small C-derived constant style
/// (`mkfs/src/ext2.rs`'s `OPTIONAL_FEATURE_*`/`REQUIRED_FEATURE_*`).
pub type GetBlockFlags = u8;

/// Read the resolved block's bytes into `content`.
pub const GET_BLK_RD: GetBlockFlags = 0b01;
/// Resolve the inode's *last* block instead of `block_index`.
pub const GET_BLK_LT: GetBlockFlags = 0b10;

/// Result of resolving one inode-relative block index.
#[derive(Debug, Clone)]
pub struct DataBlockInfo {
	/// Id of the primary or supplemental entry the block id was found in.
	pub inode_id: u32,
	/// Data-region-relative block id (the same coordinate space the data bitmap uses).
	pub block_id: u32,
	/// Slot within that entry's block-id array.
	pub slot: usize,
	/// Present only when [`GET_BLK_RD`] was set.
	pub content: Option<Vec<u8>>,
}

fn ceil_div(n: u32, d: u32) -> u32 {
	(n + d - 1) / d
}

/// Resolves `block_index` (or the inode's last block, if [`GET_BLK_LT`] is set) to an
/// absolute data block id, optionally reading its content.
pub fn get_data_block_info(
	ctx: &mut Context,
	mut block_index: u32,
	flags: GetBlockFlags,
	inode: &InodeEntry,
) -> SffsResult<DataBlockInfo> {
	if flags & GET_BLK_LT != 0 && inode.blocks_count > 0 {
		block_index = inode.blocks_count - 1;
	}
	if block_index > inode.blocks_count {
		return Err(SffsError::InvArg);
	}

	let (inode_id, block_id, slot) = if (block_index as usize) < P {
		let slot = block_index as usize;
		(inode.id, inode.blks[slot], slot)
	} else {
		let r = block_index - P as u32;
		let hops = ceil_div(r + 1, S as u32);
		let slot = (r % S as u32) as usize;

		let mut next = inode.next_entry;
		if next == 0 {
			return Err(SffsError::InvArg);
		}
		let mut entry = crate::inode::read_supplemental_entry(ctx, next)?;
		for _ in 1..hops {
			next = entry.next_entry;
			if next == 0 {
				return Err(SffsError::InvArg);
			}
			entry = crate::inode::read_supplemental_entry(ctx, next)?;
		}
		(entry.id, entry.blks[slot], slot)
	};

	let content = if flags & GET_BLK_RD != 0 {
		let block_size = ctx.sb.block_size;
		let mut buf = vec![0u8; block_size as usize];
		let data_start = ctx.sb.data.start;
		ctx.dev.read_data_blocks(data_start, block_id, 1, &mut buf)?;
		Some(buf)
	} else {
		None
	};

	Ok(DataBlockInfo {
		inode_id,
		block_id,
		slot,
		content,
	})
}
