//! C8: recursive teardown. Grounded on `newfs_drop_inode` /
//! `newfs_drop_dentry` in
//! `examples/original_source/fs/newfs/src/newfs_utils.c`, including the
//! asymmetry the reference implementation leaves in place: a directory's
//! own inode bit (and its data blocks) are never cleared by the recursive
//! drop, only its children's. [`Self::unlink`] is the higher-level
//! primitive the drop engine alone can't express: a full reclaim of a
//! subtree's bitmap bits, inode included.

use crate::cache::DentryId;
use crate::cache::InodeId;
use crate::driver::BlockDriver;
use crate::error::FsError;
use crate::error::Result;
use crate::layout::ROOT_INO;
use crate::mount::FileSystem;
use crate::ondisk::FileType;

impl<D: BlockDriver> FileSystem<D> {
	/// Recursively tears down the in-memory state rooted at `inode`.
	///
	/// Directories recurse into every child's inode, detach and release
	/// each child dentry, but do not clear their own inode-bitmap bit or
	/// any data-bitmap bit; reclaiming a directory's own storage is
	/// [`Self::unlink`]'s job. Regular files and symlinks clear their own
	/// inode-bitmap bit (but not their `bno` data bits) and release their
	/// cache entry. The root inode can never be dropped.
	pub fn drop_inode(&mut self, inode: InodeId) -> Result<()> {
		if self.inode(inode).ino == ROOT_INO {
			return Err(FsError::Invalid("cannot drop the root inode"));
		}

		match self.inode(inode).ftype {
			FileType::Dir => {
				let children = self.cache.children(inode);
				for child in children {
					if let Some(child_inode) = self.dentry(child).inode {
						self.drop_inode(child_inode)?;
					}
					self.cache.detach_child(inode, child);
					self.cache.release_dentry(child);
				}
			}
			FileType::Reg | FileType::SymLink => {
				let ino = self.inode(inode).ino;
				self.inode_bitmap.free(ino);
			}
		}

		self.cache.release_inode(inode);
		Ok(())
	}

	/// Fully reclaims `child_dentry` (a direct child of `parent_inode`):
	/// recursively clears every inode-bitmap bit and every `bno`
	/// data-bitmap bit in the dropped subtree, including the removed
	/// entry itself, then detaches it from its parent.
	pub fn unlink(&mut self, parent_inode: InodeId, child_dentry: DentryId) -> Result<()> {
		let child_ino = self.dentry(child_dentry).ino;
		if child_ino == ROOT_INO {
			return Err(FsError::Invalid("cannot unlink the root"));
		}

		let child_inode = match self.dentry(child_dentry).inode {
			Some(id) => id,
			None => {
				let ino = self.dentry(child_dentry).ino;
				self.read_inode(child_dentry, ino)?
			}
		};

		self.reclaim_subtree(child_inode)?;
		self.cache
			.detach_child(parent_inode, child_dentry)
			.ok_or(FsError::NotFound)?;
		self.cache.release_dentry(child_dentry);
		Ok(())
	}

	/// Clears every bitmap bit owned by `inode` and its descendants,
	/// recursing first so a directory's own bits are cleared only after
	/// its children's are.
	fn reclaim_subtree(&mut self, inode: InodeId) -> Result<()> {
		let ftype = self.inode(inode).ftype;

		if ftype == FileType::Dir {
			let children = self.cache.children(inode);
			for child in children {
				let grandchild_inode = match self.dentry(child).inode {
					Some(id) => id,
					None => {
						let ino = self.dentry(child).ino;
						self.read_inode(child, ino)?
					}
				};
				self.reclaim_subtree(grandchild_inode)?;
				self.cache.detach_child(inode, child);
				self.cache.release_dentry(child);
			}
		}

		let bno = self.inode(inode).bno.clone();
		for b in bno {
			self.data_bitmap.free(b);
		}
		let ino = self.inode(inode).ino;
		self.inode_bitmap.free(ino);
		self.cache.release_inode(inode);
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::cache::Dentry;
	use crate::driver::MemDriver;

	fn fresh_fs() -> FileSystem<MemDriver> {
		let driver = MemDriver::new(32 * 1024 * 1024, 512);
		FileSystem::mount(driver).unwrap()
	}

	#[test]
	fn drop_inode_rejects_root() {
		let mut fs = fresh_fs();
		let root_inode = fs.root_inode();
		assert!(matches!(
			fs.drop_inode(root_inode),
			Err(FsError::Invalid(_))
		));
	}

	#[test]
	fn drop_inode_clears_only_the_leaf_bit() {
		let mut fs = fresh_fs();
		let root_dentry = fs.root_dentry();
		let root_inode = fs.root_inode();

		let file_dentry = fs.cache.insert_dentry(Dentry {
			name: "a".to_string(),
			ino: 0,
			ftype: FileType::Reg,
			parent: Some(root_dentry),
			sibling: None,
			inode: None,
		});
		fs.attach_child(root_inode, file_dentry);
		let file_inode = fs.alloc_inode_for(file_dentry).unwrap();
		let ino = fs.inode(file_inode).ino;

		fs.drop_inode(file_inode).unwrap();
		assert!(!fs.inode_bitmap.is_set(ino));
	}

	#[test]
	fn unlink_reclaims_data_blocks_too() {
		let mut fs = fresh_fs();
		let root_dentry = fs.root_dentry();
		let root_inode = fs.root_inode();

		let file_dentry = fs.cache.insert_dentry(Dentry {
			name: "a".to_string(),
			ino: 0,
			ftype: FileType::Reg,
			parent: Some(root_dentry),
			sibling: None,
			inode: None,
		});
		fs.attach_child(root_inode, file_dentry);
		let file_inode = fs.alloc_inode_for(file_dentry).unwrap();
		let ino = fs.inode(file_inode).ino;
		let bno = fs.inode(file_inode).bno.clone();

		fs.unlink(root_inode, file_dentry).unwrap();
		assert!(!fs.inode_bitmap.is_set(ino));
		for b in bno {
			assert!(!fs.data_bitmap.is_set(b));
		}
	}
}
