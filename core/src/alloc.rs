//! Three-phase data-block allocator: extend-in-place, whole-group, global scan.
//!
//! Grounded on `original_source/src/sffs.c`'s `sffs_alloc_data_blocks`. The `goto`-driven
//! phase sequence of the original becomes an ordered sequence of phase functions, each
//! shrinking `needed`, per Design Note 9.

use std::collections::HashSet;

use crate::context::Context;
use crate::error::SffsError;
use crate::error::SffsResult;
use crate::inode::mode;
use crate::inode::read_supplemental_entry;
use crate::inode::write_supplemental_entry;
use crate::inode::InodeEntry;
use crate::inode::P;
use crate::inode::S;

fn ceil_div(n: u32, d: u32) -> u32 {
	(n + d - 1) / d
}

fn prealloc_for(sb: &crate::superblock::Superblock, inode: &InodeEntry) -> u32 {
	if inode.mode & mode::IFMT == mode::IFDIR {
		sb.prealloc_dir_blocks as u32
	} else {
		sb.prealloc_blocks as u32
	}
}

/// Allocates `n` data blocks and appends them to `inode`. `inode` is mutated in place
/// (`blocks_count`, and the list fields if [`crate::inode::alloc_inode_list`] had to grow it);
/// the caller is responsible for persisting it with [`crate::inode::write_inode`] — this
/// function already does that as its final step, matching the commit-phase contract in
/// `spec.md` §4.6.
pub fn alloc_data_blocks(ctx: &mut Context, n: u32, inode: &mut InodeEntry) -> SffsResult<()> {
	if n == 0 {
		return Ok(());
	}

	let prealloc = prealloc_for(&ctx.sb, inode);
	let mut effective = n + prealloc;
	if ctx.sb.free_blocks_count < effective {
		effective = n;
	}
	if ctx.sb.free_blocks_count < effective {
		return Err(SffsError::NoSpc);
	}

	let capacity = P as u32 + inode.list_size.saturating_sub(1) * S as u32;
	let remaining_capacity = capacity.saturating_sub(inode.blocks_count);
	if remaining_capacity < effective {
		let deficit = effective - remaining_capacity;
		let growth = ceil_div(deficit, S as u32);
		log::debug!("inode {} needs {} more list entries", inode.id, growth);
		crate::inode::alloc_inode_list(ctx, inode, growth)?;
	}

	let mut pending: Vec<u32> = Vec::with_capacity(effective as usize);
	let mut claimed: HashSet<u32> = HashSet::with_capacity(effective as usize);
	let mut needed = effective;
	let blocks_per_group = ctx.sb.blocks_per_group;

	// Phase 1: extend in place, from the group holding the inode's last block.
	if inode.blocks_count > 0 && needed > 0 {
		log::debug!("allocator phase 1: extend-in-place for inode {}", inode.id);
		let last = crate::block_ptr::get_data_block_info(
			ctx,
			inode.blocks_count - 1,
			0,
			inode,
		)?
		.block_id;
		let group = last / blocks_per_group;
		let offset_in_group = last % blocks_per_group;
		let word = ctx.data_bitmap().group_word(group, blocks_per_group)?;
		let mut bit = offset_in_group + 1;
		while bit < blocks_per_group && needed > 0 {
			if word & (1 << bit) == 0 {
				let id = group * blocks_per_group + bit;
				pending.push(id);
				claimed.insert(id);
				needed -= 1;
			}
			bit += 1;
		}
	}

	// Phase 2: whole free groups. `free_groups` only tracks the budget for this scan; the
	// superblock isn't touched until the bitmap commit below succeeds (spec.md §5's commit
	// order: metadata, then bitmap, then in-memory counters).
	let mut groups_claimed = 0u32;
	if needed > 0 {
		log::debug!("allocator phase 2: whole-group scan for inode {}", inode.id);
		let group_count = ctx.sb.group_count;
		let mut group = 0u32;
		let mut groups_budget = ctx.sb.free_groups;
		while group < group_count && needed > 0 && groups_budget > 0 {
			let word = ctx.data_bitmap().group_word(group, blocks_per_group)?;
			if word == 0 {
				let take = needed.min(blocks_per_group);
				for bit in 0..take {
					let id = group * blocks_per_group + bit;
					pending.push(id);
					claimed.insert(id);
				}
				needed -= take;
				groups_budget -= 1;
				groups_claimed += 1;
			}
			group += 1;
		}
	}

	// Phase 3: global bit-by-bit scan.
	if needed > 0 {
		log::debug!("allocator phase 3: global scan for inode {}", inode.id);
		for id in 0..ctx.sb.blocks_count {
			if needed == 0 {
				break;
			}
			if claimed.contains(&id) {
				continue;
			}
			if !ctx.data_bitmap().check(id)? {
				pending.push(id);
				claimed.insert(id);
				needed -= 1;
			}
		}
		if needed > 0 {
			log::warn!("allocator scan exhausted the volume with {needed} blocks unfilled");
			return Err(SffsError::Fs);
		}
	}

	commit(ctx, inode, &pending, groups_claimed)
}

fn commit(ctx: &mut Context, inode: &mut InodeEntry, pending: &[u32], groups_claimed: u32) -> SffsResult<()> {
	let mut idx = inode.blocks_count;
	let mut cursor = 0usize;

	while (idx as usize) < P && cursor < pending.len() {
		inode.blks[idx as usize] = pending[cursor];
		idx += 1;
		cursor += 1;
	}

	let mut entry_start = P as u32;
	let mut current_id = inode.next_entry;
	while cursor < pending.len() {
		if current_id == 0 {
			return Err(SffsError::Fs);
		}
		let mut entry = read_supplemental_entry(ctx, current_id)?;
		let mut slot = (idx - entry_start) as usize;
		while slot < S && cursor < pending.len() {
			entry.blks[slot] = pending[cursor];
			slot += 1;
			cursor += 1;
			idx += 1;
		}
		write_supplemental_entry(ctx, &entry)?;
		entry_start += S as u32;
		current_id = entry.next_entry;
	}

	inode.blocks_count += pending.len() as u32;
	crate::inode::write_inode(ctx, inode)?;

	// Reflect every claimed id in the data bitmap, unwinding on partial failure.
	let mut set_so_far = Vec::with_capacity(pending.len());
	for &id in pending {
		match ctx.data_bitmap().set(id) {
			Ok(()) => set_so_far.push(id),
			Err(err) => {
				log::warn!("bitmap commit failed at block {id}, unwinding {} prior bits", set_so_far.len());
				for &done in set_so_far.iter().rev() {
					let _ = ctx.data_bitmap().unset(done);
				}
				return Err(err);
			}
		}
	}

	ctx.sb.free_blocks_count -= pending.len() as u32;
	ctx.sb.free_groups -= groups_claimed;

	Ok(())
}
