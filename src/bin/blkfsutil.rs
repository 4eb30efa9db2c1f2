//! `blkfsutil` mounts a device (formatting it on first use) and performs
//! one operation against it, the way `mkfs`/`mount` split those concerns
//! across separate single-purpose tools.

use std::env;
use std::io;
use std::io::Read;
use std::path::PathBuf;
use std::process::exit;

use blockfs::BlockDriver;
use blockfs::FileDriver;
use blockfs::FileSystem;
use blockfs::FileType;

/// Structure storing command line arguments.
struct Args {
	/// The name of the current program used in the command line.
	prog: String,
	/// The subcommand to run.
	cmd: Command,
	/// The path to the device file backing the volume.
	device_path: Option<PathBuf>,
	/// The path within the volume the subcommand operates on.
	target: Option<String>,
}

enum Command {
	Help,
	/// Lists the entries of a directory.
	List,
	/// Writes stdin's content into a regular file, creating it first if
	/// it doesn't exist yet.
	Write,
	/// Creates an empty subdirectory.
	Mkdir,
	/// Creates an empty regular file.
	Touch,
	/// Fully reclaims a file or empty directory.
	Rm,
}

fn parse_args() -> Args {
	let mut iter = env::args();
	let prog = iter.next().unwrap_or_else(|| "blkfsutil".to_owned());

	let cmd = match iter.next().as_deref() {
		Some("ls") => Command::List,
		Some("write") => Command::Write,
		Some("mkdir") => Command::Mkdir,
		Some("touch") => Command::Touch,
		Some("rm") => Command::Rm,
		_ => Command::Help,
	};

	let device_path = iter.next().map(PathBuf::from);
	let target = iter.next();

	Args {
		prog,
		cmd,
		device_path,
		target,
	}
}

fn print_help(prog: &str) {
	eprintln!("usage: {prog} ls <device> <path>");
	eprintln!("       {prog} write <device> <path>  (content read from stdin)");
	eprintln!("       {prog} mkdir <device> <path>");
	eprintln!("       {prog} touch <device> <path>");
	eprintln!("       {prog} rm <device> <path>");
}

fn main() {
	let args = parse_args();

	if matches!(args.cmd, Command::Help) {
		print_help(&args.prog);
		exit(if args.device_path.is_none() { 1 } else { 0 });
	}

	let device_path = args.device_path.unwrap_or_else(|| {
		eprintln!("{}: specify path to a device", args.prog);
		exit(1);
	});
	let target = args.target.unwrap_or_else(|| {
		eprintln!("{}: specify a path within the volume", args.prog);
		exit(1);
	});

	let driver = FileDriver::open(&device_path).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, device_path.display(), e);
		exit(1);
	});

	let mut fs = FileSystem::mount(driver).unwrap_or_else(|e| {
		eprintln!("{}: mount: {}", args.prog, e);
		exit(1);
	});

	let result = match args.cmd {
		Command::List => run_list(&mut fs, &target),
		Command::Write => run_write(&mut fs, &target),
		Command::Mkdir => run_create(&mut fs, &target, FileType::Dir),
		Command::Touch => run_create(&mut fs, &target, FileType::Reg),
		Command::Rm => run_rm(&mut fs, &target),
		Command::Help => unreachable!(),
	};

	if let Err(e) = result {
		eprintln!("{}: {}", args.prog, e);
		fs.unmount().ok();
		exit(1);
	}

	if let Err(e) = fs.unmount() {
		eprintln!("{}: unmount: {}", args.prog, e);
		exit(1);
	}
}

fn run_list(fs: &mut FileSystem<FileDriver>, path: &str) -> blockfs::Result<()> {
	let lookup = fs.lookup(path)?;
	if !lookup.found {
		return Err(blockfs::FsError::NotFound);
	}

	let inode = match fs.dentry(lookup.dentry).inode {
		Some(id) => id,
		None => return Err(blockfs::FsError::NotFound),
	};

	if fs.inode(inode).ftype != FileType::Dir {
		return Err(blockfs::FsError::NotDir);
	}

	for child in fs.cache_children(inode) {
		let d = fs.dentry(child);
		let kind = match d.ftype {
			FileType::Dir => "d",
			FileType::Reg => "-",
			FileType::SymLink => "l",
		};
		println!("{kind} {}", d.name);
	}
	Ok(())
}

fn run_write(fs: &mut FileSystem<FileDriver>, path: &str) -> blockfs::Result<()> {
	let mut content = Vec::new();
	io::stdin()
		.read_to_end(&mut content)
		.map_err(blockfs::FsError::from)?;

	let lookup = fs.lookup(path)?;
	let inode = if lookup.found {
		fs.dentry(lookup.dentry)
			.inode
			.ok_or(blockfs::FsError::NotFound)?
	} else {
		create_entry(fs, path, lookup, FileType::Reg)?
	};

	fs.write_file(inode, &content)
}

/// Creates an empty entry (directory or regular file) at `path`.
fn run_create(
	fs: &mut FileSystem<FileDriver>,
	path: &str,
	ftype: FileType,
) -> blockfs::Result<()> {
	let lookup = fs.lookup(path)?;
	if lookup.found {
		return Err(blockfs::FsError::Exists);
	}
	create_entry(fs, path, lookup, ftype)?;
	Ok(())
}

/// Shared by [`run_create`] and [`run_write`]'s auto-create path: binds a
/// freshly inserted dentry named after `path`'s last component to the
/// directory `lookup` pointed at (the "hint" C6 returns on a miss), and
/// allocates an inode for it.
fn create_entry(
	fs: &mut FileSystem<FileDriver>,
	path: &str,
	lookup: blockfs::LookupResult,
	ftype: FileType,
) -> blockfs::Result<blockfs::InodeId> {
	let parent_dentry = lookup.dentry;
	let parent_inode = fs
		.dentry(parent_dentry)
		.inode
		.ok_or(blockfs::FsError::NotFound)?;
	if fs.inode(parent_inode).ftype != FileType::Dir {
		return Err(blockfs::FsError::NotDir);
	}

	let name = blockfs::name_of(path).to_string();
	let child_dentry = fs.insert_dentry(blockfs::Dentry {
		name,
		ino: 0,
		ftype,
		parent: Some(parent_dentry),
		sibling: None,
		inode: None,
	});
	fs.attach_child(parent_inode, child_dentry);
	fs.alloc_inode_for(child_dentry)
}

fn run_rm(fs: &mut FileSystem<FileDriver>, path: &str) -> blockfs::Result<()> {
	let lookup = fs.lookup(path)?;
	if !lookup.found || lookup.is_root {
		return Err(blockfs::FsError::NotFound);
	}
	let parent = fs
		.dentry(lookup.dentry)
		.parent
		.ok_or(blockfs::FsError::Invalid("entry has no parent"))?;
	let parent_inode = fs.dentry(parent).inode.ok_or(blockfs::FsError::NotFound)?;
	fs.unlink(parent_inode, lookup.dentry)
}
