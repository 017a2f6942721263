//! Core of the SFFS block filesystem: on-disk layout, device abstraction, space-accounting
//! bitmaps, inode store and three-phase data-block allocator.
//!
//! This crate implements the filesystem core only. A user-space bridge (FUSE or otherwise),
//! the `mkfs` CLI, and process bootstrap are external collaborators that consume the
//! operations exposed here.

pub mod alloc;
pub mod bitmap;
pub mod block_ptr;
pub mod config;
pub mod context;
pub mod device;
pub mod dirent;
pub mod error;
pub mod format;
pub mod inode;
pub mod superblock;

pub use alloc::alloc_data_blocks;
pub use bitmap::Bitmap;
pub use block_ptr::get_data_block_info;
pub use block_ptr::DataBlockInfo;
pub use block_ptr::GetBlockFlags;
pub use block_ptr::GET_BLK_LT;
pub use block_ptr::GET_BLK_RD;
pub use config::FormatOptions;
pub use config::MountOptions;
pub use context::Context;
pub use dirent::add_direntry;
pub use dirent::init_direntry;
pub use dirent::lookup_direntry;
pub use dirent::new_direntry;
pub use dirent::DirEntryInfo;
pub use dirent::DirRecord;
pub use error::SffsError;
pub use error::SffsResult;
pub use format::format;
pub use inode::alloc_inode;
pub use inode::alloc_inode_list;
pub use inode::creat_inode;
pub use inode::read_inode;
pub use inode::write_inode;
pub use inode::InodeEntry;
pub use superblock::Region;
pub use superblock::Superblock;
