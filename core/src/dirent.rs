//! Directory blocks: variable-length records terminated by a zero-ino record filling the
//! rest of the block.
//!
//! Grounded on `original_source/src/sffs_direntry.c`.

use std::io::Cursor;
use std::io::Write;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::alloc::alloc_data_blocks;
use crate::block_ptr::get_data_block_info;
use crate::block_ptr::GET_BLK_RD;
use crate::context::Context;
use crate::error::SffsError;
use crate::error::SffsResult;
use crate::inode::InodeEntry;

/// Fixed header size of a directory record, before the (non-NUL-terminated) name bytes.
pub const DIRENTRY_LENGTH: u16 = 8;

/// Largest record length a directory block will hold.
pub const MAX_DIR_ENTRY: u16 = 256;

/// A directory record read from a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirRecord {
	pub inode_id: u32,
	pub rec_len: u16,
	pub file_type: u16,
	pub name: Vec<u8>,
}

/// Where a matched record was found, per `spec.md` §4.7.
#[derive(Debug, Clone, Copy)]
pub struct DirEntryInfo {
	pub block_id: u32,
	pub list_id: u32,
	pub inode_id: u32,
}

impl DirRecord {
	fn encode_into(&self, buf: &mut [u8]) {
		let mut w = Cursor::new(&mut buf[..]);
		w.write_u32::<LittleEndian>(self.inode_id).unwrap();
		w.write_u16::<LittleEndian>(self.rec_len).unwrap();
		w.write_u16::<LittleEndian>(self.file_type).unwrap();
		w.write_all(&self.name).unwrap();
	}

	fn decode_at(buf: &[u8], offset: usize) -> SffsResult<Self> {
		let mut r = Cursor::new(&buf[offset..]);
		let inode_id = r.read_u32::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let rec_len = r.read_u16::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		let file_type = r.read_u16::<LittleEndian>().map_err(|_| SffsError::Fs)?;
		if rec_len < DIRENTRY_LENGTH || (offset + rec_len as usize) > buf.len() {
			return Err(SffsError::Fs);
		}
		let name_len = rec_len as usize - DIRENTRY_LENGTH as usize;
		let name = buf[offset + DIRENTRY_LENGTH as usize..offset + rec_len as usize].to_vec();
		debug_assert_eq!(name.len(), name_len);
		Ok(Self {
			inode_id,
			rec_len,
			file_type,
			name,
		})
	}

	fn new(inode: &InodeEntry, name: &[u8]) -> SffsResult<Self> {
		if name.is_empty() || DIRENTRY_LENGTH as usize + name.len() > MAX_DIR_ENTRY as usize {
			return Err(SffsError::InvArg);
		}
		Ok(Self {
			inode_id: inode.id,
			rec_len: DIRENTRY_LENGTH + name.len() as u16,
			file_type: (inode.mode & crate::inode::mode::IFMT) >> 12,
			name: name.to_vec(),
		})
	}
}

/// Builds a directory record for `name` pointing at `inode`, ready to pass to
/// [`add_direntry`].
pub fn new_direntry(inode: &InodeEntry, name: &[u8]) -> SffsResult<DirRecord> {
	DirRecord::new(inode, name)
}

fn read_block(ctx: &mut Context, dir: &InodeEntry, block_index: u32) -> SffsResult<(u32, Vec<u8>)> {
	let info = get_data_block_info(ctx, block_index, GET_BLK_RD, dir)?;
	Ok((info.block_id, info.content.unwrap()))
}

fn write_block(ctx: &mut Context, block_id: u32, buf: &[u8]) -> SffsResult<()> {
	let data_start = ctx.sb.data.start;
	ctx.dev.write_data_blocks(data_start, block_id, 1, buf)
}

/// Initializes a freshly allocated directory's sole block with `.` and `..`. `child` must be
/// a directory with zero blocks. When `parent` is `None` the root bootstraps by pointing
/// `..` at itself.
pub fn init_direntry(ctx: &mut Context, parent: Option<&InodeEntry>, child: &mut InodeEntry) -> SffsResult<()> {
	if child.mode & crate::inode::mode::IFMT != crate::inode::mode::IFDIR || child.blocks_count != 0 {
		return Err(SffsError::InvArg);
	}

	alloc_data_blocks(ctx, 1, child)?;
	let info = get_data_block_info(ctx, 0, 0, child)?;
	let block_size = ctx.sb.block_size as usize;
	let mut buf = vec![0u8; block_size];

	let parent_id = parent.map(|p| p.id).unwrap_or(child.id);
	let dot = DirRecord {
		inode_id: child.id,
		rec_len: DIRENTRY_LENGTH + 1,
		file_type: (child.mode & crate::inode::mode::IFMT) >> 12,
		name: b".".to_vec(),
	};
	let dotdot = DirRecord {
		inode_id: parent_id,
		rec_len: DIRENTRY_LENGTH + 2,
		file_type: (child.mode & crate::inode::mode::IFMT) >> 12,
		name: b"..".to_vec(),
	};
	let used = (dot.rec_len + dotdot.rec_len) as usize;
	let terminator = DirRecord {
		inode_id: 0,
		rec_len: (block_size - used) as u16,
		file_type: 0,
		name: Vec::new(),
	};

	dot.encode_into(&mut buf[0..dot.rec_len as usize]);
	dotdot.encode_into(&mut buf[dot.rec_len as usize..used]);
	terminator.encode_into(&mut buf[used..block_size]);

	write_block(ctx, info.block_id, &buf)
}

/// Sweeps every block of `parent` looking for an exact byte-wise match on `name`.
pub fn lookup_direntry(ctx: &mut Context, parent: &InodeEntry, name: &[u8]) -> SffsResult<Option<(DirRecord, DirEntryInfo)>> {
	let mut accum: u32 = 0;
	for block_index in 0..parent.blocks_count {
		let (block_id, buf) = read_block(ctx, parent, block_index)?;
		let mut offset = 0usize;
		while offset < buf.len() {
			let record = DirRecord::decode_at(&buf, offset)?;
			if record.inode_id != 0 && record.name == name {
				let info = DirEntryInfo {
					block_id,
					list_id: accum,
					inode_id: parent.id,
				};
				return Ok(Some((record, info)));
			}
			accum += record.rec_len as u32;
			offset += record.rec_len as usize;
		}
	}
	Ok(None)
}

/// Appends `record` to `parent`'s directory blocks, refusing a name that already exists.
pub fn add_direntry(ctx: &mut Context, parent: &mut InodeEntry, record: &DirRecord) -> SffsResult<()> {
	if lookup_direntry(ctx, parent, &record.name)?.is_some() {
		return Err(SffsError::EntExis);
	}

	for block_index in 0..parent.blocks_count {
		let (block_id, mut buf) = read_block(ctx, parent, block_index)?;
		let mut offset = 0usize;
		while offset < buf.len() {
			let existing = DirRecord::decode_at(&buf, offset)?;
			if existing.inode_id == 0 && existing.rec_len >= record.rec_len {
				let leftover = existing.rec_len - record.rec_len;
				record.encode_into(&mut buf[offset..offset + record.rec_len as usize]);
				if leftover > 0 {
					let shrunk = DirRecord {
						inode_id: 0,
						rec_len: leftover,
						file_type: 0,
						name: Vec::new(),
					};
					let shrunk_offset = offset + record.rec_len as usize;
					shrunk.encode_into(&mut buf[shrunk_offset..shrunk_offset + leftover as usize]);
				}
				write_block(ctx, block_id, &buf)?;
				return Ok(());
			}
			offset += existing.rec_len as usize;
		}
	}

	alloc_data_blocks(ctx, 1, parent)?;
	let new_index = parent.blocks_count - 1;
	let info = get_data_block_info(ctx, new_index, 0, parent)?;
	let block_size = ctx.sb.block_size as usize;
	let mut buf = vec![0u8; block_size];

	record.encode_into(&mut buf[0..record.rec_len as usize]);
	let leftover = block_size as u16 - record.rec_len;
	if leftover > 0 {
		let shrunk = DirRecord {
			inode_id: 0,
			rec_len: leftover,
			file_type: 0,
			name: Vec::new(),
		};
		shrunk.encode_into(&mut buf[record.rec_len as usize..block_size]);
	}
	write_block(ctx, info.block_id, &buf)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn record_roundtrip() {
		let record = DirRecord {
			inode_id: 7,
			rec_len: DIRENTRY_LENGTH + 3,
			file_type: 1,
			name: b"abc".to_vec(),
		};
		let mut buf = vec![0u8; record.rec_len as usize];
		record.encode_into(&mut buf);
		let back = DirRecord::decode_at(&buf, 0).unwrap();
		assert_eq!(record, back);
	}
}
