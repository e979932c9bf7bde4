//! Branch-weight hints for the decode hot path.

#[cold]
#[inline(always)]
fn mark_cold() {}

/// `cond`, with the `false` branch marked cold.
#[inline(always)]
pub(crate) fn likely(cond: bool) -> bool {
    if !cond {
        mark_cold();
    }
    cond
}

/// `cond`, with the `true` branch marked cold.
#[inline(always)]
pub(crate) fn unlikely(cond: bool) -> bool {
    if cond {
        mark_cold();
    }
    cond
}
