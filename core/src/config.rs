//! Format-time and mount-time configuration, generalizing the teacher's `Ext2Factory`
//! optional-field builder (`mkfs/src/ext2.rs`) to SFFS's own region layout.

use serde::Deserialize;
use serde::Serialize;

use crate::error::SffsError;
use crate::error::SffsResult;
use crate::inode::INODE_ENTRY_SIZE;
use crate::inode::INLINE_BLOCK_AREA_SIZE;
use crate::superblock::Region;
use crate::superblock::Superblock;

/// Bytes of data per inode at format time, per `spec.md` §4.8 ("Inode ratio").
pub const INODE_RATIO: u64 = 131_072;

/// Largest block size the core accepts. Mirrors a common page size; the exact OS page size is
/// the bridge's business to enforce tighter if it knows one.
pub const MAX_BLOCK_SIZE: u32 = 65_536;

/// Smallest block size the core accepts; the superblock must fit starting at byte 1024.
pub const MIN_BLOCK_SIZE: u32 = 1024;

/// Options accepted by [`crate::format::format`]. Every field defaults when absent, mirroring
/// the teacher's `Ext2Factory` builder pattern of all-optional knobs resolved at creation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatOptions {
	pub block_size: Option<u32>,
	pub reserved_inodes: Option<u32>,
	pub blocks_per_group: Option<u32>,
	pub file_prealloc: Option<u16>,
	pub dir_prealloc: Option<u16>,
	pub max_inode_list: Option<u32>,
	pub label: Option<String>,
}

/// Options accepted when opening an existing volume. Currently empty; reserved for
/// mount-time knobs (read-only, noatime, …) the bridge may want to add without breaking the
/// core's signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MountOptions {}

impl FormatOptions {
	fn block_size(&self) -> u32 {
		self.block_size.unwrap_or(1024)
	}

	fn reserved_inodes(&self) -> u32 {
		self.reserved_inodes.unwrap_or(0)
	}

	fn file_prealloc(&self) -> u16 {
		self.file_prealloc.unwrap_or(0)
	}

	fn dir_prealloc(&self) -> u16 {
		self.dir_prealloc.unwrap_or(0)
	}

	fn max_inode_list(&self) -> u32 {
		self.max_inode_list.unwrap_or(32)
	}

	/// Validates the block size: a power of two, within the accepted range.
	fn validate_block_size(block_size: u32) -> SffsResult<()> {
		if block_size < MIN_BLOCK_SIZE || block_size > MAX_BLOCK_SIZE {
			return Err(SffsError::InvBlk);
		}
		if !block_size.is_power_of_two() {
			return Err(SffsError::InvBlk);
		}
		Ok(())
	}

	/// Runs the region-sizing arithmetic of `spec.md` §4.8 / `original_source/utils/sffs_mkfs.c`'s
	/// `__sffs_init` and returns a fully populated superblock (not yet written to disk).
	pub fn resolve(&self, volume_size: u64) -> SffsResult<Superblock> {
		let block_size = self.block_size();
		Self::validate_block_size(block_size)?;

		let reserved_inodes = self.reserved_inodes();
		let total_blocks_u64 = volume_size / block_size as u64;
		if total_blocks_u64 <= reserved_inodes as u64 {
			return Err(SffsError::Init);
		}
		let total_blocks = (total_blocks_u64 - reserved_inodes as u64) as u32;

		let total_inodes_0 = ((total_blocks as u64 * block_size as u64) / INODE_RATIO) as u32;
		let entries_per_block = block_size / INODE_ENTRY_SIZE as u32;
		if entries_per_block == 0 {
			return Err(SffsError::Init);
		}
		let git_size_blks = ceil_div_u32(total_inodes_0, entries_per_block);
		let git_bitmap_bytes = ceil_div_u32(total_inodes_0, 8);
		let git_bitmap_blks = ceil_div_u32(git_bitmap_bytes, block_size);

		// `spec.md` §4.8 allows `sb_start_block` to collapse to 0 for large block sizes, but
		// that would place the superblock in the reserved boot block, which `Device` always
		// refuses to write. Per the spec's own fallback ("by default treat it as 1"), always
		// reserve a dedicated superblock block.
		let sb_start: u32 = 1;
		let meta = (sb_start + 1) + git_bitmap_blks + git_size_blks;
		if meta >= total_blocks {
			return Err(SffsError::Init);
		}
		let data_0 = total_blocks - meta;
		let data_bitmap_bytes = ceil_div_u32(data_0, 8);
		let data_bitmap_blks = ceil_div_u32(data_bitmap_bytes, block_size);
		if data_bitmap_blks >= data_0 {
			return Err(SffsError::Init);
		}
		let data_blocks = data_0 - data_bitmap_blks;

		let blocks_per_group = self
			.blocks_per_group
			.unwrap_or(INLINE_BLOCK_AREA_SIZE as u32 / 4);
		if blocks_per_group == 0 {
			return Err(SffsError::Init);
		}
		// Re-derive total_inodes from the final data block count, as the original format
		// routine does, then re-check the self-consistency of the two derivations.
		let total_inodes = data_blocks / blocks_per_group;
		if total_inodes == 0 {
			return Err(SffsError::Init);
		}
		let group_count = total_inodes;

		let git_bitmap_start = sb_start + 1;
		let git_start = git_bitmap_start + git_bitmap_blks;
		let data_bitmap_start = git_start + git_size_blks;
		let data_start = data_bitmap_start + data_bitmap_blks;

		Ok(Superblock {
			block_size,
			blocks_count: data_blocks,
			free_blocks_count: data_blocks,
			inodes_count: total_inodes,
			free_inodes_count: total_inodes.saturating_sub(reserved_inodes),
			inodes_reserved: reserved_inodes,
			blocks_per_group,
			group_count,
			free_groups: group_count,
			inode_entry_size: INODE_ENTRY_SIZE as u32,
			max_inode_list: self.max_inode_list(),
			mount_time: 0,
			write_time: 0,
			features: 0,
			prealloc_blocks: self.file_prealloc(),
			prealloc_dir_blocks: self.dir_prealloc(),
			data_bitmap: Region {
				start: data_bitmap_start,
				size: data_bitmap_blks,
			},
			git_bitmap: Region {
				start: git_bitmap_start,
				size: git_bitmap_blks,
			},
			git: Region {
				start: git_start,
				size: git_size_blks,
			},
			data: Region {
				start: data_start,
				size: data_blocks,
			},
		})
	}
}

fn ceil_div_u32(n: u32, d: u32) -> u32 {
	(n + d - 1) / d
}
