//! C5: the in-memory inode/dentry tree. Modeled as two arenas with stable
//! indices rather than the reference implementation's raw
//! `parent`/`brother`/`inode` pointers, using the language-neutral strategy
//! from the design notes, made safe: only the parent-to-child edge is
//! owning, everything else is an index, and a freed slot is recycled by
//! the next allocation.

use crate::ondisk::FileType;

/// A stable handle to a [`Dentry`] in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DentryId(usize);

/// A stable handle to an [`Inode`] in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeId(usize);

/// One edge in the namespace tree: a name bound to an inode number.
pub struct Dentry {
	pub name: String,
	pub ino: u32,
	pub ftype: FileType,
	pub parent: Option<DentryId>,
	/// Threads a directory's children as a singly-linked list, in reverse
	/// insertion order.
	pub sibling: Option<DentryId>,
	pub inode: Option<InodeId>,
}

/// In-memory inode state. `bno_used` tracks how many of `bno`'s slots are
/// populated (`1..=DIRECT_BLOCKS_PER_FILE` for directories, growing as
/// entries are allocated; always `DIRECT_BLOCKS_PER_FILE` for regular
/// files, allocated upfront).
pub struct Inode {
	pub ino: u32,
	pub size: u32,
	pub dir_cnt: u32,
	pub ftype: FileType,
	pub bno: Vec<u32>,
	/// Head of the children list, directories only.
	pub children_head: Option<DentryId>,
	/// Owned data buffers, regular files only; one `block_size`-sized
	/// buffer per populated `bno` slot.
	pub data: Option<Vec<Vec<u8>>>,
	pub dentry: DentryId,
}

/// The two arenas backing the cached tree.
#[derive(Default)]
pub struct Cache {
	dentries: Vec<Option<Dentry>>,
	free_dentries: Vec<usize>,
	inodes: Vec<Option<Inode>>,
	free_inodes: Vec<usize>,
}

impl Cache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_dentry(&mut self, d: Dentry) -> DentryId {
		if let Some(slot) = self.free_dentries.pop() {
			self.dentries[slot] = Some(d);
			DentryId(slot)
		} else {
			self.dentries.push(Some(d));
			DentryId(self.dentries.len() - 1)
		}
	}

	pub fn insert_inode(&mut self, i: Inode) -> InodeId {
		if let Some(slot) = self.free_inodes.pop() {
			self.inodes[slot] = Some(i);
			InodeId(slot)
		} else {
			self.inodes.push(Some(i));
			InodeId(self.inodes.len() - 1)
		}
	}

	pub fn dentry(&self, id: DentryId) -> &Dentry {
		self.dentries[id.0].as_ref().expect("dangling DentryId")
	}

	pub fn dentry_mut(&mut self, id: DentryId) -> &mut Dentry {
		self.dentries[id.0].as_mut().expect("dangling DentryId")
	}

	pub fn inode(&self, id: InodeId) -> &Inode {
		self.inodes[id.0].as_ref().expect("dangling InodeId")
	}

	pub fn inode_mut(&mut self, id: InodeId) -> &mut Inode {
		self.inodes[id.0].as_mut().expect("dangling InodeId")
	}

	/// Releases a dentry's slot for reuse. The caller is responsible for
	/// having already unlinked it from any parent's children list.
	pub fn release_dentry(&mut self, id: DentryId) {
		self.dentries[id.0] = None;
		self.free_dentries.push(id.0);
	}

	/// Releases an inode's slot for reuse.
	pub fn release_inode(&mut self, id: InodeId) {
		self.inodes[id.0] = None;
		self.free_inodes.push(id.0);
	}

	/// Prepends `dentry` onto `inode`'s children list (head insertion) and
	/// increments `dir_cnt`.
	pub fn attach_child(&mut self, inode: InodeId, dentry: DentryId) {
		let head = self.inode(inode).children_head;
		self.dentry_mut(dentry).sibling = head;
		let i = self.inode_mut(inode);
		i.children_head = Some(dentry);
		i.dir_cnt += 1;
	}

	/// Unlinks the first occurrence of `dentry` (by identity) from
	/// `inode`'s children list and decrements `dir_cnt`.
	pub fn detach_child(&mut self, inode: InodeId, dentry: DentryId) -> Option<u32> {
		let mut cursor = self.inode(inode).children_head;
		let mut prev: Option<DentryId> = None;

		while let Some(cur) = cursor {
			if cur == dentry {
				let next = self.dentry(cur).sibling;
				match prev {
					Some(p) => self.dentry_mut(p).sibling = next,
					None => self.inode_mut(inode).children_head = next,
				}
				let i = self.inode_mut(inode);
				i.dir_cnt -= 1;
				return Some(i.dir_cnt);
			}
			prev = Some(cur);
			cursor = self.dentry(cur).sibling;
		}
		None
	}

	/// Walks the children list returning the entry at zero-based position
	/// `index`, in list order (reverse insertion order).
	pub fn nth_child(&self, inode: InodeId, index: u32) -> Option<DentryId> {
		let mut cursor = self.inode(inode).children_head;
		let mut i = 0;
		while let Some(cur) = cursor {
			if i == index {
				return Some(cur);
			}
			i += 1;
			cursor = self.dentry(cur).sibling;
		}
		None
	}

	/// Collects every child dentry id, in list order.
	pub fn children(&self, inode: InodeId) -> Vec<DentryId> {
		let mut out = Vec::new();
		let mut cursor = self.inode(inode).children_head;
		while let Some(cur) = cursor {
			out.push(cur);
			cursor = self.dentry(cur).sibling;
		}
		out
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn mk_dentry(cache: &mut Cache, name: &str, parent: Option<DentryId>) -> DentryId {
		cache.insert_dentry(Dentry {
			name: name.to_string(),
			ino: 0,
			ftype: FileType::Reg,
			parent,
			sibling: None,
			inode: None,
		})
	}

	fn mk_dir_inode(cache: &mut Cache, ino: u32, dentry: DentryId) -> InodeId {
		cache.insert_inode(Inode {
			ino,
			size: 0,
			dir_cnt: 0,
			ftype: FileType::Dir,
			bno: vec![0],
			children_head: None,
			data: None,
			dentry,
		})
	}

	#[test]
	fn attach_is_reverse_insertion_order() {
		let mut cache = Cache::new();
		let root_dentry = mk_dentry(&mut cache, "/", None);
		let root_inode = mk_dir_inode(&mut cache, 0, root_dentry);

		let a = mk_dentry(&mut cache, "a", Some(root_dentry));
		let b = mk_dentry(&mut cache, "b", Some(root_dentry));
		let c = mk_dentry(&mut cache, "c", Some(root_dentry));
		cache.attach_child(root_inode, a);
		cache.attach_child(root_inode, b);
		cache.attach_child(root_inode, c);

		assert_eq!(cache.inode(root_inode).dir_cnt, 3);
		assert_eq!(cache.nth_child(root_inode, 0), Some(c));
		assert_eq!(cache.nth_child(root_inode, 1), Some(b));
		assert_eq!(cache.nth_child(root_inode, 2), Some(a));
		assert_eq!(cache.nth_child(root_inode, 3), None);
	}

	#[test]
	fn detach_middle_preserves_order_and_count() {
		let mut cache = Cache::new();
		let root_dentry = mk_dentry(&mut cache, "/", None);
		let root_inode = mk_dir_inode(&mut cache, 0, root_dentry);

		let a = mk_dentry(&mut cache, "a", Some(root_dentry));
		let b = mk_dentry(&mut cache, "b", Some(root_dentry));
		let c = mk_dentry(&mut cache, "c", Some(root_dentry));
		cache.attach_child(root_inode, a);
		cache.attach_child(root_inode, b);
		cache.attach_child(root_inode, c);

		let new_count = cache.detach_child(root_inode, b).unwrap();
		assert_eq!(new_count, 2);
		assert_eq!(cache.children(root_inode), vec![c, a]);
	}

	#[test]
	fn detach_unknown_is_not_found() {
		let mut cache = Cache::new();
		let root_dentry = mk_dentry(&mut cache, "/", None);
		let root_inode = mk_dir_inode(&mut cache, 0, root_dentry);
		let stray = mk_dentry(&mut cache, "x", Some(root_dentry));

		assert_eq!(cache.detach_child(root_inode, stray), None);
	}
}
