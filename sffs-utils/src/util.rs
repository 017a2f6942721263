//! Small numeric helpers used throughout the filesystem core.

use std::mem::size_of;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns the current timestamp since the Unix epoch.
pub fn get_timestamp() -> Duration {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is before the Unix epoch")
}

/// Returns `floor(log2(n))`, or `None` if `n` is zero.
pub fn log2(n: u64) -> Option<u64> {
	let num_bits = (size_of::<u64>() * 8) as u64;

	let n = num_bits - n.leading_zeros() as u64;
	if n > 0 {
		Some(n - 1)
	} else {
		None
	}
}

/// Returns `2^n`.
pub fn pow2(n: u32) -> u64 {
	1u64 << n
}

/// Returns `ceil(n / d)`.
pub fn ceil_division(n: u64, d: u64) -> u64 {
	(n + d - 1) / d
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn log2_values() {
		assert_eq!(log2(0), None);
		assert_eq!(log2(1), Some(0));
		assert_eq!(log2(2), Some(1));
		assert_eq!(log2(1024), Some(10));
		assert_eq!(log2(1023), Some(9));
	}

	#[test]
	fn pow2_values() {
		assert_eq!(pow2(0), 1);
		assert_eq!(pow2(10), 1024);
	}

	#[test]
	fn ceil_division_values() {
		assert_eq!(ceil_division(0, 8), 0);
		assert_eq!(ceil_division(1, 8), 1);
		assert_eq!(ceil_division(8, 8), 1);
		assert_eq!(ceil_division(9, 8), 2);
	}
}
