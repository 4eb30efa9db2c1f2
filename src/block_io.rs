//! C1: translates arbitrary `(offset, len)` transfers into aligned,
//! `BLOCK_SIZE`-bounded sequences of exactly-one-I/O-unit calls against the
//! driver. Grounded on `newfs_driver_read`/`newfs_driver_write` in
//! `examples/original_source/fs/newfs/src/newfs_utils.c`: round down/up to
//! the block size, transfer the aligned range, slice out the bias.

use crate::driver::BlockDriver;
use crate::error::Result;

fn round_down(value: u64, round: u64) -> u64 {
	(value / round) * round
}

fn round_up(value: u64, round: u64) -> u64 {
	round_down(value + round - 1, round)
}

/// Reads the aligned region covering `[offset, offset + len)` and returns
/// `(offset_aligned, bias, buffer)` where `buffer[bias..bias + len]` is the
/// requested range.
fn read_aligned(
	driver: &mut dyn BlockDriver,
	block_size: u32,
	offset: u64,
	len: usize,
) -> Result<(u64, usize, Vec<u8>)> {
	let block_size = block_size as u64;
	let offset_aligned = round_down(offset, block_size);
	let bias = (offset - offset_aligned) as usize;
	let size_aligned = round_up(bias as u64 + len as u64, block_size) as usize;

	let mut buf = vec![0u8; size_aligned];
	let io_unit = driver.io_unit_size() as usize;
	driver.seek(offset_aligned)?;
	let mut cur = 0;
	while cur < size_aligned {
		driver.read_unit(&mut buf[cur..cur + io_unit])?;
		cur += io_unit;
	}

	Ok((offset_aligned, bias, buf))
}

/// Reads `len` bytes at `offset`, transparently aligning to `block_size`.
pub fn read(driver: &mut dyn BlockDriver, block_size: u32, offset: u64, len: usize) -> Result<Vec<u8>> {
	let (_, bias, buf) = read_aligned(driver, block_size, offset, len)?;
	Ok(buf[bias..bias + len].to_vec())
}

/// Writes `bytes` at `offset`, performing a read-modify-write of the
/// enclosing aligned region so that neighboring records sharing the same
/// I/O unit are preserved.
pub fn write(driver: &mut dyn BlockDriver, block_size: u32, offset: u64, bytes: &[u8]) -> Result<()> {
	let (offset_aligned, bias, mut buf) = read_aligned(driver, block_size, offset, bytes.len())?;
	buf[bias..bias + bytes.len()].copy_from_slice(bytes);

	let io_unit = driver.io_unit_size() as usize;
	driver.seek(offset_aligned)?;
	let mut cur = 0;
	while cur < buf.len() {
		driver.write_unit(&buf[cur..cur + io_unit])?;
		cur += io_unit;
	}

	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::driver::MemDriver;

	#[test]
	fn round_trip_within_one_block() {
		let mut drv = MemDriver::new(4096, 512);
		write(&mut drv, 1024, 100, b"hello").unwrap();
		let out = read(&mut drv, 1024, 100, 5).unwrap();
		assert_eq!(&out, b"hello");
	}

	#[test]
	fn write_preserves_neighbors_in_same_io_unit() {
		let mut drv = MemDriver::new(4096, 512);
		write(&mut drv, 1024, 0, b"AAAA").unwrap();
		write(&mut drv, 1024, 4, b"BBBB").unwrap();
		let out = read(&mut drv, 1024, 0, 8).unwrap();
		assert_eq!(&out, b"AAAABBBB");
	}

	#[test]
	fn crosses_block_boundary() {
		let mut drv = MemDriver::new(8192, 512);
		let data: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
		write(&mut drv, 1024, 900, &data).unwrap();
		let out = read(&mut drv, 1024, 900, data.len()).unwrap();
		assert_eq!(out, data);
	}
}
