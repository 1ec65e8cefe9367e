//! Random primitives used by the sampler.
//!
//! Every draw goes through an explicitly passed generator so a seeded run is
//! reproducible.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::utils::{GrammarError, Result};

const SURROGATE_START: u32 = 0xD800;
const SURROGATE_LEN: u32 = 0x800;

/// Uniform integer in `[lo, hi]`.
pub fn pick_int32<R: Rng + ?Sized>(rng: &mut R, lo: i32, hi: i32) -> Result<i32> {
    if lo > hi {
        return Err(GrammarError::InvalidRange(format!(
            "lower bound {} exceeds upper bound {}",
            lo, hi
        )));
    }
    Ok(rng.gen_range(lo..=hi))
}

/// Unbiased coin flip.
pub fn pick_bool<R: Rng + ?Sized>(rng: &mut R) -> bool {
    rng.gen_bool(0.5)
}

/// Uniform Unicode scalar value in `[lo, hi]`.
///
/// Surrogate code points are not characters; when the range spans the
/// surrogate block the draw is taken over the remaining values only.
pub fn pick_rune<R: Rng + ?Sized>(rng: &mut R, lo: char, hi: char) -> Result<char> {
    let (lo, hi) = (lo as u32, hi as u32);
    if lo > hi {
        return Err(GrammarError::InvalidRange(format!(
            "U+{:04X} is above U+{:04X}",
            lo, hi
        )));
    }
    let gap = if lo < SURROGATE_START && hi >= SURROGATE_START + SURROGATE_LEN {
        SURROGATE_LEN
    } else {
        0
    };
    // Scalar values stay below 0x110000, so they always fit an i32.
    let drawn = pick_int32(rng, lo as i32, (hi - gap) as i32)? as u32;
    let code = if gap > 0 && drawn >= SURROGATE_START {
        drawn + gap
    } else {
        drawn
    };
    char::from_u32(code)
        .ok_or_else(|| GrammarError::InvalidRange(format!("U+{:04X} is not a character", code)))
}

/// Position-wise draw: the i-th character lies in `[begin[i], end[i]]`.
pub fn pick_string<R: Rng + ?Sized>(rng: &mut R, begin: &str, end: &str) -> Result<String> {
    let lower: Vec<char> = begin.chars().collect();
    let upper: Vec<char> = end.chars().collect();
    if lower.len() != upper.len() {
        return Err(GrammarError::InvalidRange(format!(
            "{:?} and {:?} differ in length",
            begin, end
        )));
    }
    if let Some((lo, hi)) = lower.iter().zip(&upper).find(|(lo, hi)| lo > hi) {
        return Err(GrammarError::InvalidRange(format!(
            "{:?} is above {:?} in {:?}…{:?}",
            lo, hi, begin, end
        )));
    }

    lower
        .iter()
        .zip(&upper)
        .map(|(&lo, &hi)| pick_rune(rng, lo, hi))
        .collect()
}

/// One character out of a padding set, `None` when the set is empty.
pub fn pick_padding<R: Rng + ?Sized>(rng: &mut R, chars: &[char]) -> Option<char> {
    chars.choose(rng).copied()
}
