//! Proof-of-work difficulty for initialization.
//!
//! ```text
//! difficulty = 2^256 / num_labels
//! ```
//!
//! With this threshold one label position in `num_labels` is expected to
//! produce a qualifying value, so a nonce falls out of a full run for free.
//! The value is a 256-bit big-endian integer; `num_labels == 1` saturates to
//! 2^256 - 1 since 2^256 itself does not fit.

use byteorder::{BigEndian, ByteOrder};

use crate::consts::DIFFICULTY_SIZE;
use crate::error::{InitError, Result};

pub type Difficulty = [u8; DIFFICULTY_SIZE];

pub fn difficulty(num_labels: u64) -> Result<Difficulty> {
    if num_labels == 0 {
        return Err(InitError::InvalidConfig(
            "difficulty: number of labels must be > 0".into(),
        ));
    }

    // 2^256 / 1 не влезает в 256 бит.
    if num_labels == 1 {
        return Ok([0xff; DIFFICULTY_SIZE]);
    }

    // Long division by 64-bit limbs: dividend is 1 followed by four zero limbs.
    // The leading quotient limb (1 / n) is zero for n > 1.
    let divisor = num_labels as u128;
    let mut rem: u128 = 1;
    let mut out = [0u8; DIFFICULTY_SIZE];
    for limb in out.chunks_exact_mut(8) {
        let cur = rem << 64;
        // rem < divisor <= u64::MAX, so the limb fits
        BigEndian::write_u64(limb, (cur / divisor) as u64);
        rem = cur % divisor;
    }
    Ok(out)
}

/// Big-endian `value < threshold`.
#[inline]
pub fn meets_difficulty(value: &[u8; DIFFICULTY_SIZE], threshold: &Difficulty) -> bool {
    value < threshold
}
