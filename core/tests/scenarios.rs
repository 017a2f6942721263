//! Integration-style scenarios from `spec.md` §8, run against a real backing file.

use sffs_core::config::FormatOptions;
use sffs_core::context::Context;
use sffs_core::dirent;
use sffs_core::error::SffsError;
use sffs_core::format::format;
use sffs_core::inode;
use sffs_core::inode::mode;
use sffs_core::inode::P;

const VOLUME_SIZE: u64 = 52_428_800; // 50 MiB, per spec.md §8.

fn fresh(path: &std::path::Path) -> Context {
	format(path, VOLUME_SIZE, FormatOptions::default()).expect("format")
}

#[test]
fn format_scenario() {
	let tmp = tempfile::NamedTempFile::new().unwrap();
	let ctx = fresh(tmp.path());

	assert_eq!(ctx.sb.block_size, 1024);
	assert_eq!(ctx.sb.free_blocks_count, ctx.sb.blocks_count);
	assert!(ctx.sb.blocks_count > 0);
}

#[test]
fn data_and_git_bitmaps_start_zeroed() {
	let tmp = tempfile::NamedTempFile::new().unwrap();
	let mut ctx = fresh(tmp.path());

	assert!(!ctx.data_bitmap().check(0).unwrap());
	assert!(!ctx.git_bitmap().check(0).unwrap());
}

#[test]
fn root_creation_scenario() {
	let tmp = tempfile::NamedTempFile::new().unwrap();
	let mut ctx = fresh(tmp.path());

	let id = inode::alloc_inode(&mut ctx, mode::IFDIR | 0o755).unwrap();
	assert_eq!(id, 0);

	let mut root = inode::creat_inode(id, mode::IFDIR | 0o755, 0).unwrap();
	inode::write_inode(&mut ctx, &root).unwrap();
	assert!(ctx.git_bitmap().check(0).unwrap());

	dirent::init_direntry(&mut ctx, None, &mut root).unwrap();
	assert_eq!(root.blocks_count, 1);

	let info = sffs_core::block_ptr::get_data_block_info(
		&mut ctx,
		0,
		sffs_core::block_ptr::GET_BLK_RD,
		&root,
	)
	.unwrap();
	let buf = info.content.unwrap();

	// "." record: rec_len=9, name=".".
	assert_eq!(u32::from_le_bytes(buf[0..4].try_into().unwrap()), 0);
	assert_eq!(u16::from_le_bytes(buf[4..6].try_into().unwrap()), 9);
	assert_eq!(&buf[8..9], b".");

	// ".." record: rec_len=10, name="..".
	assert_eq!(u32::from_le_bytes(buf[9..13].try_into().unwrap()), 0);
	assert_eq!(u16::from_le_bytes(buf[13..15].try_into().unwrap()), 10);
	assert_eq!(&buf[17..19], b"..");

	// Terminator: inode_id=0, rec_len = B - 19.
	assert_eq!(u32::from_le_bytes(buf[19..23].try_into().unwrap()), 0);
	let term_len = u16::from_le_bytes(buf[23..25].try_into().unwrap());
	assert_eq!(term_len, ctx.sb.block_size as u16 - 19);
}

#[test]
fn small_file_allocation_scenario() {
	let tmp = tempfile::NamedTempFile::new().unwrap();
	let mut ctx = fresh(tmp.path());

	let root_id = inode::alloc_inode(&mut ctx, mode::IFDIR | 0o755).unwrap();
	let mut root = inode::creat_inode(root_id, mode::IFDIR | 0o755, 0).unwrap();
	inode::write_inode(&mut ctx, &root).unwrap();
	dirent::init_direntry(&mut ctx, None, &mut root).unwrap();

	let free_before = ctx.sb.free_blocks_count;

	let file_id = inode::alloc_inode(&mut ctx, mode::IFREG | 0o644).unwrap();
	assert_eq!(file_id, 1);
	let mut f = inode::creat_inode(file_id, mode::IFREG | 0o644, 0).unwrap();
	inode::write_inode(&mut ctx, &f).unwrap();

	sffs_core::alloc::alloc_data_blocks(&mut ctx, 3, &mut f).unwrap();

	assert_eq!(f.blocks_count, 3);
	assert_eq!(ctx.sb.free_blocks_count, free_before - 3);

	let ids: Vec<u32> = (0..3)
		.map(|i| {
			sffs_core::block_ptr::get_data_block_info(&mut ctx, i, 0, &f)
				.unwrap()
				.block_id
		})
		.collect();
	assert_eq!(ids.len(), 3);
	assert_ne!(ids[0], ids[1]);
	assert_ne!(ids[1], ids[2]);
	for &id in &ids {
		assert!(ctx.data_bitmap().check(id).unwrap());
	}

	let resolved = sffs_core::block_ptr::get_data_block_info(&mut ctx, 0, 0, &f).unwrap();
	assert_eq!(resolved.inode_id, 1);
}

#[test]
fn inode_list_growth_scenario() {
	let tmp = tempfile::NamedTempFile::new().unwrap();
	let mut ctx = fresh(tmp.path());

	let file_id = inode::alloc_inode(&mut ctx, mode::IFREG | 0o644).unwrap();
	let mut f = inode::creat_inode(file_id, mode::IFREG | 0o644, 0).unwrap();
	inode::write_inode(&mut ctx, &f).unwrap();

	sffs_core::alloc::alloc_data_blocks(&mut ctx, P as u32 + 5, &mut f).unwrap();

	assert_eq!(f.list_size, 2);
	assert_ne!(f.next_entry, 0);

	let at_p = sffs_core::block_ptr::get_data_block_info(&mut ctx, P as u32, 0, &f).unwrap();
	assert_eq!(at_p.inode_id, f.next_entry);
}

#[test]
fn duplicate_direntry_refusal_scenario() {
	let tmp = tempfile::NamedTempFile::new().unwrap();
	let mut ctx = fresh(tmp.path());

	let dir_id = inode::alloc_inode(&mut ctx, mode::IFDIR | 0o755).unwrap();
	let mut dir = inode::creat_inode(dir_id, mode::IFDIR | 0o755, 0).unwrap();
	inode::write_inode(&mut ctx, &dir).unwrap();
	dirent::init_direntry(&mut ctx, None, &mut dir).unwrap();

	let child_id = inode::alloc_inode(&mut ctx, mode::IFREG | 0o644).unwrap();
	let child = inode::creat_inode(child_id, mode::IFREG | 0o644, 0).unwrap();
	inode::write_inode(&mut ctx, &child).unwrap();

	// Longer than "."/".." records so it can never be mistaken for one of their slots even
	// when an ancestor's id happens to be 0 (the root bootstrap case makes its own ".."
	// record carry inode_id == 0, the same sentinel a terminator uses).
	let record = dirent::new_direntry(&child, b"entry").unwrap();
	dirent::add_direntry(&mut ctx, &mut dir, &record).unwrap();

	let blocks_before = dir.blocks_count;

	let record_again = dirent::new_direntry(&child, b"entry").unwrap();
	let err = dirent::add_direntry(&mut ctx, &mut dir, &record_again).unwrap_err();
	assert!(matches!(err, SffsError::EntExis));
	assert_eq!(dir.blocks_count, blocks_before);

	let (found, _info) = dirent::lookup_direntry(&mut ctx, &dir, b"entry").unwrap().unwrap();
	assert_eq!(found.inode_id, child_id);
}

#[test]
fn double_set_corruption_scenario() {
	let tmp = tempfile::NamedTempFile::new().unwrap();
	let mut ctx = fresh(tmp.path());

	ctx.data_bitmap().set(0).unwrap();
	let err = ctx.data_bitmap().set(0).unwrap_err();
	assert!(matches!(err, SffsError::Fs));
}
