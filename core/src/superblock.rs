//! The superblock: layout constants, free counts, and region pointers.
//!
//! Grounded on `original_source/include/sffs.h`'s `struct sffs_superblock`, re-expressed as an
//! in-memory struct plus an explicit little-endian byte codec instead of a packed C struct
//! (Design Note 9). The on-disk copy lives at byte offset 1024, inside whichever block that
//! falls into for the configured block size.

use std::io::Cursor;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::device::Device;
use crate::error::SffsError;
use crate::error::SffsResult;

/// `original_source/include/sffs.h`'s `SFFS_MAGIC`.
pub const MAGIC: u32 = 0x53FF5346;

/// Byte offset of the superblock from the start of the volume.
pub const SUPERBLOCK_OFFSET: u64 = 1024;

/// Size in bytes of the serialized superblock. Comfortably under one block for every block
/// size the format routine accepts (minimum 1024).
pub const SUPERBLOCK_SIZE: usize = 128;

/// One region of the volume: a starting block number and a length in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
	pub start: u32,
	pub size: u32,
}

/// The in-memory superblock. Authoritative during an operation; periodic write-back (unmount,
/// `statfs`) is the bridge's responsibility per `spec.md` §4.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
	pub block_size: u32,
	pub blocks_count: u32,
	pub free_blocks_count: u32,
	pub inodes_count: u32,
	pub free_inodes_count: u32,
	pub inodes_reserved: u32,
	pub blocks_per_group: u32,
	pub group_count: u32,
	pub free_groups: u32,
	pub inode_entry_size: u32,
	pub max_inode_list: u32,
	pub mount_time: u32,
	pub write_time: u32,
	pub features: u32,
	pub prealloc_blocks: u16,
	pub prealloc_dir_blocks: u16,
	pub data_bitmap: Region,
	pub git_bitmap: Region,
	pub git: Region,
	pub data: Region,
}

impl Superblock {
	/// The block holding byte offset 1024, given this superblock's own block size.
	pub fn superblock_block(&self) -> u32 {
		(SUPERBLOCK_OFFSET / self.block_size as u64) as u32
	}

	/// Encodes the superblock into its on-disk byte representation.
	pub fn to_bytes(&self) -> [u8; SUPERBLOCK_SIZE] {
		let mut buf = [0u8; SUPERBLOCK_SIZE];
		let mut w = Cursor::new(&mut buf[..]);
		w.write_u32::<LittleEndian>(MAGIC).unwrap();
		w.write_u32::<LittleEndian>(self.block_size).unwrap();
		w.write_u32::<LittleEndian>(self.blocks_count).unwrap();
		w.write_u32::<LittleEndian>(self.free_blocks_count).unwrap();
		w.write_u32::<LittleEndian>(self.inodes_count).unwrap();
		w.write_u32::<LittleEndian>(self.free_inodes_count).unwrap();
		w.write_u32::<LittleEndian>(self.inodes_reserved).unwrap();
		w.write_u32::<LittleEndian>(self.blocks_per_group).unwrap();
		w.write_u32::<LittleEndian>(self.group_count).unwrap();
		w.write_u32::<LittleEndian>(self.free_groups).unwrap();
		w.write_u32::<LittleEndian>(self.inode_entry_size).unwrap();
		w.write_u32::<LittleEndian>(self.max_inode_list).unwrap();
		w.write_u32::<LittleEndian>(self.mount_time).unwrap();
		w.write_u32::<LittleEndian>(self.write_time).unwrap();
		w.write_u32::<LittleEndian>(self.features).unwrap();
		w.write_u16::<LittleEndian>(self.prealloc_blocks).unwrap();
		w.write_u16::<LittleEndian>(self.prealloc_dir_blocks).unwrap();
		for region in [&self.data_bitmap, &self.git_bitmap, &self.git, &self.data] {
			w.write_u32::<LittleEndian>(region.start).unwrap();
			w.write_u32::<LittleEndian>(region.size).unwrap();
		}
		buf
	}

	/// Decodes a superblock from its on-disk byte representation.
	pub fn from_bytes(buf: &[u8; SUPERBLOCK_SIZE]) -> SffsResult<Self> {
		let mut r = Cursor::new(&buf[..]);
		let magic = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		if magic != MAGIC {
			return Err(SffsError::Fs);
		}
		let block_size = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let blocks_count = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let free_blocks_count = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let inodes_count = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let free_inodes_count = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let inodes_reserved = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let blocks_per_group = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let group_count = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let free_groups = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let inode_entry_size = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let max_inode_list = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let mount_time = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let write_time = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let features = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let prealloc_blocks = r.read_u16::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let prealloc_dir_blocks = r.read_u16::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let mut read_region = |r: &mut Cursor<&[u8]>| -> SffsResult<Region> {
			let start = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
			let size = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
			Ok(Region { start, size })
		};
		let data_bitmap = read_region(&mut r)?;
		let git_bitmap = read_region(&mut r)?;
		let git = read_region(&mut r)?;
		let data = read_region(&mut r)?;

		Ok(Self {
			block_size,
			blocks_count,
			free_blocks_count,
			inodes_count,
			free_inodes_count,
			inodes_reserved,
			blocks_per_group,
			group_count,
			free_groups,
			inode_entry_size,
			max_inode_list,
			mount_time,
			write_time,
			features,
			prealloc_blocks,
			prealloc_dir_blocks,
			data_bitmap,
			git_bitmap,
			git,
			data,
		})
	}

	/// Loads the superblock at byte offset 1024 from `dev`.
	///
	/// Uses [`Device::read_at`] rather than the block-oriented calls: for large block sizes
	/// byte 1024 falls inside block 0 (the reserved boot block), which the ordinary
	/// `read_blocks`/`write_blocks` path refuses to touch. `original_source/src/sffs.c` reads
	/// the superblock the same way, seeking directly rather than calling `sffs_read_blk`.
	pub fn read(dev: &mut Device) -> SffsResult<Self> {
		let mut buf = [0u8; SUPERBLOCK_SIZE];
		dev.read_at(SUPERBLOCK_OFFSET, &mut buf)?;
		Self::from_bytes(&buf)
	}

	/// Serializes this superblock to byte offset 1024 on `dev`.
	pub fn write(&self, dev: &mut Device) -> SffsResult<()> {
		dev.write_at(SUPERBLOCK_OFFSET, &self.to_bytes())
	}
}
