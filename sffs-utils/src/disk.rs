//! Implements disk-related utility functions.

use libc::ioctl;
use std::ffi::c_long;
use std::fs;
use std::fs::File;
use std::io;
use std::io::Error;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

/// ioctl macro: Command.
macro_rules! ioc {
	($a:expr, $b:expr, $c:expr, $d:expr) => {
		(($a) << 30) | (($b) << 8) | ($c) | (($d) << 16)
	};
}

/// ioctl macro: Read command.
macro_rules! ior {
	($a:expr, $b:expr, $c:ty) => {
		ioc!(2, $a, $b, std::mem::size_of::<$c>() as c_long)
	};
}

/// ioctl command: Get size of disk in number of sectors.
const BLKGETSIZE64: c_long = ior!(0x12, 114, u64);

/// Sector size assumed for block devices exposing `BLKGETSIZE64`.
const SECTOR_SIZE: u64 = 512;

/// Returns the size in bytes of the volume backing `path`.
///
/// Block and character devices are queried through `ioctl`; regular files use their length
/// directly, which lets a backing image double as a volume during development and testing.
pub fn get_volume_size(path: &Path) -> io::Result<u64> {
	let metadata = fs::metadata(path)?;
	let file_type = metadata.file_type();

	if file_type.is_block_device() || file_type.is_char_device() {
		let dev = File::open(path)?;
		let mut sectors: u64 = 0;

		let ret = unsafe { ioctl(dev.as_raw_fd(), BLKGETSIZE64 as _, &mut sectors) };
		if ret < 0 {
			return Err(Error::last_os_error());
		}

		Ok(sectors * SECTOR_SIZE)
	} else if file_type.is_file() {
		Ok(metadata.len())
	} else {
		Ok(0)
	}
}
