//! C7: recursive write-back. Grounded on `newfs_sync_inode` in
//! `examples/original_source/fs/newfs/src/newfs_utils.c`: pack the inode's
//! own record first, then walk its children (or data buffers) writing
//! them into the blocks the inode already owns, recursing into any
//! resident child inode in post-order.

use crate::block_io;
use crate::cache::InodeId;
use crate::driver::BlockDriver;
use crate::error::FsError;
use crate::error::Result;
use crate::mount::FileSystem;
use crate::ondisk::DentryRecord;
use crate::ondisk::InodeRecord;
use crate::ondisk::FileType;

impl<D: BlockDriver> FileSystem<D> {
	/// Flushes `inode` and, for a directory, every resident child's
	/// dentry record and (recursively) its own inode, in post-order.
	///
	/// A directory's entries must fit within the data blocks it was
	/// allocated up front (one block at creation, grown here into
	/// further `bno` slots only up to `DIRECT_BLOCKS_PER_FILE`); once
	/// those slots are exhausted this returns
	/// [`FsError::Invalid`] rather than silently truncating the
	/// directory.
	pub fn sync(&mut self, inode: InodeId) -> Result<()> {
		let ftype = self.inode(inode).ftype;

		match ftype {
			FileType::Dir => self.sync_dir(inode)?,
			FileType::Reg => self.sync_reg(inode)?,
			FileType::SymLink => {}
		}

		self.write_inode_record(inode)
	}

	fn sync_dir(&mut self, inode: InodeId) -> Result<()> {
		let rec_size = std::mem::size_of::<DentryRecord>() as u64;
		let block_size = self.layout.block_size as u64;
		let entries_per_block = block_size / rec_size;

		let children = self.cache.children(inode);
		let max_blocks = self.inode(inode).bno.len() as u64;
		let needed_blocks = if children.is_empty() {
			1
		} else {
			(children.len() as u64 + entries_per_block - 1) / entries_per_block
		};

		if needed_blocks > max_blocks {
			if max_blocks >= crate::layout::DIRECT_BLOCKS_PER_FILE as u64 {
				return Err(FsError::Invalid("directory has outgrown its allocated blocks"));
			}
			let to_add = (needed_blocks - max_blocks)
				.min(crate::layout::DIRECT_BLOCKS_PER_FILE as u64 - max_blocks);
			for _ in 0..to_add {
				let bno = self.data_bitmap.alloc()?;
				self.cache.inode_mut(inode).bno.push(bno);
			}
			if (self.inode(inode).bno.len() as u64) < needed_blocks {
				return Err(FsError::Invalid("directory has outgrown its allocated blocks"));
			}
		}

		for (i, &child) in children.iter().enumerate() {
			let block_index = (i as u64 / entries_per_block) as usize;
			let within = i as u64 % entries_per_block;
			let bno = self.inode(inode).bno[block_index];
			let offset = self.layout.data_block_offset(bno) + within * rec_size;

			let d = self.dentry(child);
			let record = DentryRecord::new(&d.name, d.ftype, d.ino);
			block_io::write(&mut self.driver, self.layout.block_size, offset, &record.to_bytes())?;

			if let Some(child_inode) = self.dentry(child).inode {
				self.sync(child_inode)?;
			}
		}

		self.cache.inode_mut(inode).dir_cnt = children.len() as u32;
		Ok(())
	}

	fn sync_reg(&mut self, inode: InodeId) -> Result<()> {
		let bno = self.inode(inode).bno.clone();
		let buffers = self.inode(inode).data.clone();
		if let Some(buffers) = buffers {
			for (k, buf) in buffers.iter().enumerate() {
				let offset = self.layout.data_block_offset(bno[k]);
				block_io::write(&mut self.driver, self.layout.block_size, offset, buf)?;
			}
		}
		Ok(())
	}

	fn write_inode_record(&mut self, inode: InodeId) -> Result<()> {
		let i = self.inode(inode);
		let mut bno = [0i32; crate::layout::DIRECT_BLOCKS_PER_FILE];
		for (k, slot) in bno.iter_mut().enumerate() {
			*slot = *i.bno.get(k).unwrap_or(&0) as i32;
		}
		let record = InodeRecord {
			ino: i.ino as i32,
			size: i.size as i32,
			dir_cnt: i.dir_cnt as i32,
			block_pointer: [0; crate::layout::DIRECT_BLOCKS_PER_FILE],
			ftype: i.ftype as i32,
			bno,
		};
		let offset = self.layout.inode_record_offset(i.ino);
		block_io::write(&mut self.driver, self.layout.block_size, offset, &record.to_bytes())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::driver::MemDriver;

	fn fresh_fs() -> FileSystem<MemDriver> {
		let driver = MemDriver::new(32 * 1024 * 1024, 512);
		FileSystem::mount(driver).unwrap()
	}

	#[test]
	fn root_sync_then_remount_preserves_empty_tree() {
		let fs = fresh_fs();
		fs.unmount().unwrap();
	}

	#[test]
	fn creating_a_child_and_syncing_persists_the_dentry() {
		let mut fs = fresh_fs();
		let root_dentry = fs.root_dentry();
		let root_inode = fs.root_inode();

		let child_dentry = fs.cache.insert_dentry(crate::cache::Dentry {
			name: "etc".to_string(),
			ino: 0,
			ftype: FileType::Dir,
			parent: Some(root_dentry),
			sibling: None,
			inode: None,
		});
		fs.attach_child(root_inode, child_dentry);
		let child_inode = fs.alloc_inode_for(child_dentry).unwrap();
		fs.sync(child_inode).unwrap();
		fs.sync(root_inode).unwrap();

		assert_eq!(fs.inode(root_inode).dir_cnt, 1);
	}
}
