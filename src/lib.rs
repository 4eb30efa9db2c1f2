//! A small block-oriented filesystem core: superblock, inode/data
//! bitmaps, a fixed inode table, and a data area, built on top of
//! whatever implements [`driver::BlockDriver`].
//!
//! The crate is organized the way a character-driver-backed disk image
//! is laid out on disk, bottom to top: [`block_io`] moves bytes across
//! the driver boundary, [`layout`] and [`bitmap`] describe and allocate
//! the on-disk regions, [`ondisk`] packs and unpacks the fixed-size
//! records living in them, [`cache`] holds the in-memory tree those
//! records are faulted into, and [`mount`], [`resolve`], [`sync`], and
//! [`reclaim`] implement the operations a mounted volume supports.

pub mod bitmap;
pub mod block_io;
pub mod cache;
pub mod driver;
pub mod error;
pub mod layout;
pub mod mount;
pub mod ondisk;
pub mod reclaim;
pub mod resolve;
pub mod sync;

pub use cache::Dentry;
pub use cache::DentryId;
pub use cache::InodeId;
pub use driver::BlockDriver;
pub use driver::FileDriver;
pub use driver::MemDriver;
pub use error::FsError;
pub use error::Result;
pub use layout::DATA_CAPACITY;
pub use layout::DIRECT_BLOCKS_PER_FILE;
pub use layout::INODE_CAPACITY;
pub use layout::NAME_MAX;
pub use layout::ROOT_INO;
pub use mount::FileSystem;
pub use ondisk::FileType;
pub use resolve::depth_of;
pub use resolve::name_of;
pub use resolve::LookupResult;
