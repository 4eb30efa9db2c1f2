//! C2: on-disk geometry. Fixed constants plus the offsets derived from them,
//! grounded on `types.h`'s `NFS_*` macros in
//! `examples/original_source/fs/newfs/include/types.h`.

/// Identifies a formatted volume.
pub const MAGIC: u32 = 0x5241_5453;
/// Directory-entry file name length, NUL/zero-padded.
pub const NAME_MAX: usize = 128;
/// Data blocks directly reachable from one inode; no indirection.
pub const DIRECT_BLOCKS_PER_FILE: usize = 6;
pub const INODE_BITMAP_BLOCKS: u32 = 1;
pub const DATA_BITMAP_BLOCKS: u32 = 1;
pub const SUPER_BLOCKS: u32 = 1;
pub const INODE_CAPACITY: u32 = 585;
pub const DATA_CAPACITY: u32 = 3508;
/// The root directory's inode number; never dropped.
pub const ROOT_INO: u32 = 0;

/// The on-disk regions' offsets and sizes, derived once at mount time
/// (either read back from an existing superblock, or computed fresh on an
/// unformatted device) and otherwise immutable for the life of the mount.
#[derive(Clone, Copy, Debug)]
pub struct Layout {
	pub io_unit: u32,
	pub block_size: u32,
	pub map_inode_blocks: u32,
	pub map_inode_offset: u64,
	pub map_data_blocks: u32,
	pub map_data_offset: u64,
	pub inode_offset: u64,
	pub data_offset: u64,
}

impl Layout {
	/// Derives a fresh layout for an unformatted device with the given I/O
	/// unit size. Regions are laid out back to back, each a multiple of
	/// `BLOCK_SIZE`: superblock, inode bitmap, data bitmap, inode table,
	/// data area.
	pub fn fresh(io_unit: u32) -> Self {
		let block_size = io_unit * 2;
		let map_inode_offset = SUPER_BLOCKS as u64 * block_size as u64;
		let map_data_offset = map_inode_offset + INODE_BITMAP_BLOCKS as u64 * block_size as u64;
		let inode_offset = map_data_offset + DATA_BITMAP_BLOCKS as u64 * block_size as u64;
		let inode_table_blocks = INODE_CAPACITY as u64 * (1 + DIRECT_BLOCKS_PER_FILE as u64);
		let data_offset = inode_offset + inode_table_blocks * block_size as u64;

		Self {
			io_unit,
			block_size,
			map_inode_blocks: INODE_BITMAP_BLOCKS,
			map_inode_offset,
			map_data_blocks: DATA_BITMAP_BLOCKS,
			map_data_offset,
			inode_offset,
			data_offset,
		}
	}

	/// Offset of inode `ino`'s record. The inode table reserves
	/// `1 + DIRECT_BLOCKS_PER_FILE` blocks per inode, but only the first
	/// block of each stride holds the record; the rest is historical and
	/// preserved bit-exactly for compatibility with existing volumes.
	pub fn inode_record_offset(&self, ino: u32) -> u64 {
		self.inode_offset
			+ ino as u64 * self.block_size as u64 * (1 + DIRECT_BLOCKS_PER_FILE as u64)
	}

	/// Offset of data block `bno` within the data area.
	pub fn data_block_offset(&self, bno: u32) -> u64 {
		self.data_offset + bno as u64 * self.block_size as u64
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn regions_are_contiguous_and_block_aligned() {
		let l = Layout::fresh(512);
		assert_eq!(l.block_size, 1024);
		assert_eq!(l.map_inode_offset, 1024);
		assert_eq!(l.map_data_offset, 1024 + 1024);
		assert_eq!(l.inode_offset, 1024 + 1024 + 1024);
		assert_eq!(
			l.data_offset,
			l.inode_offset + INODE_CAPACITY as u64 * 7 * 1024
		);
	}

	#[test]
	fn inode_record_offset_reserves_full_stride() {
		let l = Layout::fresh(512);
		assert_eq!(l.inode_record_offset(0), l.inode_offset);
		assert_eq!(
			l.inode_record_offset(1),
			l.inode_offset + 7 * l.block_size as u64
		);
	}
}
