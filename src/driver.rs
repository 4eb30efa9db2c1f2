//! The block-device driver contract consumed by the core.
//!
//! The driver itself (whatever sits behind `open`/`close`/`seek`/`read`/
//! `write`/`ioctl`) is out of scope for this crate; the core only needs
//! something that can report its own geometry and move an exact I/O unit
//! at a time. [`FileDriver`] is the real implementation, backed by a
//! device node or a plain file, the same way the teacher's disk utilities
//! talk to `/dev/sdX` through `libc::ioctl`. [`MemDriver`] is a
//! `Vec<u8>`-backed stand-in used by this crate's own tests.

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::Path;

/// ioctl macro: command.
macro_rules! ioc {
	($a:expr, $b:expr, $c:expr, $d:expr) => {
		(($a) << 30) | (($b) << 8) | ($c) | (($d) << 16)
	};
}

/// ioctl macro: read command.
macro_rules! ior {
	($a:expr, $b:expr, $c:ty) => {
		ioc!(2u64, $a, $b, std::mem::size_of::<$c>() as u64)
	};
}

/// ioctl command: total size of the device, in bytes.
const REQ_DEVICE_SIZE: u64 = ior!(0x12, 120, u64);
/// ioctl command: the device's minimum I/O transfer size, in bytes.
const REQ_DEVICE_IO_SZ: u64 = ior!(0x12, 121, u32);

/// The contract the core relies on to talk to the underlying block device.
pub trait BlockDriver {
	/// Returns the device's I/O unit size in bytes, as reported by the
	/// driver at open time. Constant for the lifetime of the mount.
	fn io_unit_size(&self) -> u32;

	/// Returns the total size of the device in bytes.
	fn device_size(&self) -> u64;

	/// Seeks to an absolute byte offset.
	fn seek(&mut self, offset: u64) -> io::Result<()>;

	/// Reads exactly one I/O unit into `buf` (`buf.len()` must equal
	/// [`Self::io_unit_size`]).
	fn read_unit(&mut self, buf: &mut [u8]) -> io::Result<()>;

	/// Writes exactly one I/O unit from `buf`.
	fn write_unit(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// A driver backed by a real device node (or, for development, a plain
/// file) opened through the standard library and queried via `ioctl`.
pub struct FileDriver {
	file: File,
	io_unit: u32,
	size: u64,
}

impl FileDriver {
	/// Opens `path` for reading and writing and queries its geometry.
	///
	/// Device nodes answer both ioctls; plain files (used for development
	/// and for building disk images on a host without the real character
	/// driver) fall back to the file's length and a 512-byte I/O unit.
	pub fn open(path: &Path) -> io::Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		let fd = file.as_raw_fd();

		let mut size: u64 = 0;
		let mut io_unit: u32 = 0;
		let queried = unsafe {
			libc::ioctl(fd, REQ_DEVICE_SIZE as _, &mut size as *mut u64) >= 0
				&& libc::ioctl(fd, REQ_DEVICE_IO_SZ as _, &mut io_unit as *mut u32) >= 0
		};
		if !queried {
			size = file.metadata()?.len();
			io_unit = 512;
		}

		Ok(Self {
			file,
			io_unit,
			size,
		})
	}
}

impl BlockDriver for FileDriver {
	fn io_unit_size(&self) -> u32 {
		self.io_unit
	}

	fn device_size(&self) -> u64 {
		self.size
	}

	fn seek(&mut self, offset: u64) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(offset))?;
		Ok(())
	}

	fn read_unit(&mut self, buf: &mut [u8]) -> io::Result<()> {
		self.file.read_exact(buf)
	}

	fn write_unit(&mut self, buf: &[u8]) -> io::Result<()> {
		self.file.write_all(buf)
	}
}

/// An in-memory driver used by this crate's own tests, since no real
/// device node can be exercised without running the toolchain.
pub struct MemDriver {
	data: Vec<u8>,
	io_unit: u32,
	cursor: usize,
}

impl MemDriver {
	/// Creates a zeroed device of `size` bytes with the given I/O unit.
	pub fn new(size: usize, io_unit: u32) -> Self {
		Self {
			data: vec![0; size],
			io_unit,
			cursor: 0,
		}
	}
}

impl BlockDriver for MemDriver {
	fn io_unit_size(&self) -> u32 {
		self.io_unit
	}

	fn device_size(&self) -> u64 {
		self.data.len() as u64
	}

	fn seek(&mut self, offset: u64) -> io::Result<()> {
		self.cursor = offset as usize;
		Ok(())
	}

	fn read_unit(&mut self, buf: &mut [u8]) -> io::Result<()> {
		let unit = self.io_unit as usize;
		if self.cursor + unit > self.data.len() {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short read"));
		}
		buf[..unit].copy_from_slice(&self.data[self.cursor..self.cursor + unit]);
		self.cursor += unit;
		Ok(())
	}

	fn write_unit(&mut self, buf: &[u8]) -> io::Result<()> {
		let unit = self.io_unit as usize;
		if self.cursor + unit > self.data.len() {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short write"));
		}
		self.data[self.cursor..self.cursor + unit].copy_from_slice(&buf[..unit]);
		self.cursor += unit;
		Ok(())
	}
}
