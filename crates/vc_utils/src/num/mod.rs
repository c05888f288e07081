//! Alignment arithmetic.
//!
//! All functions expect `align` to be a power of two, which is what every
//! basic type and every laid-out aggregate reports.

/// Rounds `offset` up to the next multiple of `align`.
///
/// # Examples
///
/// ```
/// use vc_utils::num::align_up;
///
/// assert_eq!(align_up(5, 4), 8);
/// assert_eq!(align_up(8, 4), 8);
/// assert_eq!(align_up(0, 8), 0);
/// ```
#[inline]
pub const fn align_up(offset: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}

/// Returns how many padding bytes follow `offset` to reach `align`.
#[inline]
pub const fn padding_for(offset: usize, align: usize) -> usize {
    align_up(offset, align) - offset
}

/// Returns the smallest power of two greater than or equal to `value`,
/// with a floor of `min`.
#[inline]
pub const fn power_of_two_at_least(value: usize, min: usize) -> usize {
    let v = if value < min { min } else { value };
    v.next_power_of_two()
}
