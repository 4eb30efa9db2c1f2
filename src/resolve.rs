//! C6: path resolution over the cached tree, faulting inodes in from disk
//! on demand. Grounded on `newfs_lookup` / `newfs_read_inode` in
//! `examples/original_source/fs/newfs/src/newfs_utils.c`, with the
//! name-matching bug spec.md §9 flags as a REDESIGN FLAG fixed: the
//! reference implementation compares only `strlen(token)` bytes of the
//! stored name, so `"ab"` matches a query for `"a"`. This resolver
//! compares full, trimmed names instead.

use crate::block_io;
use crate::cache::Dentry;
use crate::cache::DentryId;
use crate::cache::Inode;
use crate::cache::InodeId;
use crate::driver::BlockDriver;
use crate::error::FsError;
use crate::error::Result;
use crate::layout::DIRECT_BLOCKS_PER_FILE;
use crate::mount::FileSystem;
use crate::ondisk::DentryRecord;
use crate::ondisk::FileType;
use crate::ondisk::InodeRecord;

/// The outcome of a [`FileSystem::lookup`] call.
pub struct LookupResult {
	pub found: bool,
	pub is_root: bool,
	pub dentry: DentryId,
}

/// Returns the number of `/`-separated path components (`"/"` is depth 0).
pub fn depth_of(path: &str) -> usize {
	if path == "/" {
		0
	} else {
		path.split('/').filter(|s| !s.is_empty()).count()
	}
}

/// Returns the last path component.
pub fn name_of(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

impl<D: BlockDriver> FileSystem<D> {
	/// Walks `path` against the cached tree, faulting inodes in as
	/// needed. `path` must start with `/`.
	pub fn lookup(&mut self, path: &str) -> Result<LookupResult> {
		if !path.starts_with('/') {
			return Err(FsError::Invalid("path must start with '/'"));
		}

		if depth_of(path) == 0 {
			return Ok(LookupResult {
				found: true,
				is_root: true,
				dentry: self.root_dentry(),
			});
		}

		let mut cursor = self.root_dentry();
		let tokens: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

		for token in tokens {
			let inode_id = self.ensure_inode_loaded(cursor)?;

			if self.inode(inode_id).ftype != FileType::Dir {
				// The path still has components left but `cursor` names a
				// leaf; nothing to descend into.
				return Ok(LookupResult {
					found: false,
					is_root: false,
					dentry: cursor,
				});
			}

			let hit = self
				.cache
				.children(inode_id)
				.into_iter()
				.find(|&child| self.dentry(child).name == token);

			match hit {
				Some(child) => cursor = child,
				None => {
					return Ok(LookupResult {
						found: false,
						is_root: false,
						dentry: cursor,
					});
				}
			}
		}

		self.ensure_inode_loaded(cursor)?;
		Ok(LookupResult {
			found: true,
			is_root: false,
			dentry: cursor,
		})
	}

	/// Faults `dentry`'s inode in if it isn't resident yet, returning its
	/// id either way.
	fn ensure_inode_loaded(&mut self, dentry: DentryId) -> Result<InodeId> {
		if let Some(id) = self.dentry(dentry).inode {
			return Ok(id);
		}
		let ino = self.dentry(dentry).ino;
		let inode_id = self.read_inode(dentry, ino)?;
		self.cache.dentry_mut(dentry).inode = Some(inode_id);
		Ok(inode_id)
	}

	/// C6 subroutine (§4.7): reads inode `ino`'s record and, for
	/// directories, its directory entries, or, for regular files, its
	/// data blocks. `parent` becomes the parent of every faulted-in child
	/// dentry.
	pub(crate) fn read_inode(&mut self, parent: DentryId, ino: u32) -> Result<InodeId> {
		let record_bytes = block_io::read(
			&mut self.driver,
			self.layout.block_size,
			self.layout.inode_record_offset(ino),
			std::mem::size_of::<InodeRecord>(),
		)?;
		let record = InodeRecord::from_bytes(&record_bytes);
		let ftype = FileType::try_from(record.ftype)?;
		let bno: Vec<u32> = record.bno.iter().map(|&b| b as u32).collect();

		let inode_id = self.cache.insert_inode(Inode {
			ino: record.ino as u32,
			size: record.size as u32,
			dir_cnt: 0,
			ftype,
			bno: bno.clone(),
			children_head: None,
			data: None,
			dentry: parent,
		});

		match ftype {
			FileType::Dir => {
				let mut dir_cnt_remaining = record.dir_cnt as u32;
				let mut k = 0usize;
				while dir_cnt_remaining > 0 {
					let bno_k = bno[k];
					let block_start = self.layout.data_block_offset(bno_k);
					let block_end = self.layout.data_block_offset(bno_k + 1);
					let mut offset = block_start;
					let rec_size = std::mem::size_of::<DentryRecord>() as u64;

					while offset + rec_size <= block_end {
						let bytes = block_io::read(
							&mut self.driver,
							self.layout.block_size,
							offset,
							rec_size as usize,
						)?;
						let rec = DentryRecord::from_bytes(&bytes);
						let child_ftype = FileType::try_from(rec.ftype)?;
						let child = self.cache.insert_dentry(Dentry {
							name: rec.name_str(),
							ino: rec.ino as u32,
							ftype: child_ftype,
							parent: Some(parent),
							sibling: None,
							inode: None,
						});
						self.cache.attach_child(inode_id, child);

						offset += rec_size;
						dir_cnt_remaining -= 1;
						if dir_cnt_remaining == 0 {
							break;
						}
					}
					k += 1;
				}
			}
			FileType::Reg => {
				let mut buffers = Vec::with_capacity(DIRECT_BLOCKS_PER_FILE);
				for k in 0..DIRECT_BLOCKS_PER_FILE {
					let buf = block_io::read(
						&mut self.driver,
						self.layout.block_size,
						self.layout.data_block_offset(bno[k]),
						self.layout.block_size as usize,
					)?;
					buffers.push(buf);
				}
				self.cache.inode_mut(inode_id).data = Some(buffers);
			}
			FileType::SymLink => {}
		}

		Ok(inode_id)
	}
}
