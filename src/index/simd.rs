//! Vectorized splitter comparison for FAST descent.
//!
//! Each 3-key group of a cacheline block is compared against the probe in one
//! greater-than instruction. Bit `i` of the result is set when the probe is
//! strictly greater than lane `i`. Callers always pass at least four lanes;
//! the fourth is loaded but masked off.

use crate::table::TupleKey;

/// Lanes read per group compare.
pub const GROUP_LANES: usize = 4;

/// Mask selecting the three splitter lanes.
const SPLITTER_MASK: u32 = 0b111;

/// Keys a [`FastIndex`](crate::FastIndex) can be built over.
pub trait FastKey: TupleKey {
    /// Greater-than mask of `key` against `lanes[0..3]`.
    #[inline]
    fn gt_mask(lanes: &[Self], key: Self) -> u32 {
        scalar_gt_mask(lanes, key)
    }
}

#[inline]
pub fn scalar_gt_mask<K: Ord>(lanes: &[K], key: K) -> u32 {
    u32::from(key > lanes[0]) | (u32::from(key > lanes[1]) << 1) | (u32::from(key > lanes[2]) << 2)
}

impl FastKey for u8 {}
impl FastKey for i8 {}
impl FastKey for u16 {}
impl FastKey for i16 {}

impl FastKey for u32 {
    #[cfg(target_arch = "x86_64")]
    #[inline]
    fn gt_mask(lanes: &[Self], key: Self) -> u32 {
        x86::gt_mask_u32(lanes, key)
    }
}

impl FastKey for i32 {
    #[cfg(target_arch = "x86_64")]
    #[inline]
    fn gt_mask(lanes: &[Self], key: Self) -> u32 {
        x86::gt_mask_i32(lanes, key)
    }
}

impl FastKey for u64 {
    #[cfg(target_arch = "x86_64")]
    #[inline]
    fn gt_mask(lanes: &[Self], key: Self) -> u32 {
        if std::is_x86_feature_detected!("sse4.2") {
            // SAFETY: feature detected at runtime.
            return unsafe { x86::gt_mask_u64_sse42(lanes, key) };
        }
        scalar_gt_mask(lanes, key)
    }
}

impl FastKey for i64 {
    #[cfg(target_arch = "x86_64")]
    #[inline]
    fn gt_mask(lanes: &[Self], key: Self) -> u32 {
        if std::is_x86_feature_detected!("sse4.2") {
            // SAFETY: feature detected at runtime.
            return unsafe { x86::gt_mask_i64_sse42(lanes, key) };
        }
        scalar_gt_mask(lanes, key)
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::*;

    use super::{GROUP_LANES, SPLITTER_MASK};

    // SSE2 is part of the x86_64 baseline, so the 32-bit paths need no
    // runtime detection.

    #[inline]
    pub(super) fn gt_mask_i32(lanes: &[i32], key: i32) -> u32 {
        assert!(lanes.len() >= GROUP_LANES);
        // SAFETY: four lanes checked above; unaligned load.
        unsafe {
            let splitters = _mm_loadu_si128(lanes.as_ptr() as *const __m128i);
            let gt = _mm_cmpgt_epi32(_mm_set1_epi32(key), splitters);
            _mm_movemask_ps(_mm_castsi128_ps(gt)) as u32 & SPLITTER_MASK
        }
    }

    #[inline]
    pub(super) fn gt_mask_u32(lanes: &[u32], key: u32) -> u32 {
        assert!(lanes.len() >= GROUP_LANES);
        // SAFETY: four lanes checked above; unaligned load. Flipping the sign
        // bit maps unsigned order onto the signed compare.
        unsafe {
            let bias = _mm_set1_epi32(i32::MIN);
            let splitters = _mm_xor_si128(_mm_loadu_si128(lanes.as_ptr() as *const __m128i), bias);
            let probe = _mm_set1_epi32((key ^ 0x8000_0000) as i32);
            let gt = _mm_cmpgt_epi32(probe, splitters);
            _mm_movemask_ps(_mm_castsi128_ps(gt)) as u32 & SPLITTER_MASK
        }
    }

    #[target_feature(enable = "sse4.2")]
    pub(super) unsafe fn gt_mask_i64_sse42(lanes: &[i64], key: i64) -> u32 {
        assert!(lanes.len() >= GROUP_LANES);
        // SAFETY: caller guarantees SSE4.2; four lanes checked above.
        unsafe { gt_mask_epi64(lanes.as_ptr(), _mm_set1_epi64x(key), _mm_setzero_si128()) }
    }

    #[target_feature(enable = "sse4.2")]
    pub(super) unsafe fn gt_mask_u64_sse42(lanes: &[u64], key: u64) -> u32 {
        assert!(lanes.len() >= GROUP_LANES);
        // SAFETY: caller guarantees SSE4.2; four lanes checked above.
        unsafe {
            let bias = _mm_set1_epi64x(i64::MIN);
            let probe = _mm_set1_epi64x((key ^ (1 << 63)) as i64);
            gt_mask_epi64(lanes.as_ptr() as *const i64, probe, bias)
        }
    }

    #[target_feature(enable = "sse4.2")]
    unsafe fn gt_mask_epi64(lanes: *const i64, probe: __m128i, bias: __m128i) -> u32 {
        // SAFETY: `lanes` points at four readable i64 lanes.
        unsafe {
            let lo = _mm_xor_si128(_mm_loadu_si128(lanes as *const __m128i), bias);
            let hi = _mm_xor_si128(_mm_loadu_si128(lanes.add(2) as *const __m128i), bias);
            let gt_lo = _mm_movemask_pd(_mm_castsi128_pd(_mm_cmpgt_epi64(probe, lo)));
            let gt_hi = _mm_movemask_pd(_mm_castsi128_pd(_mm_cmpgt_epi64(probe, hi)));
            (gt_lo | (gt_hi << 2)) as u32 & SPLITTER_MASK
        }
    }
}
