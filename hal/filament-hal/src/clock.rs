//! Monotonic time source

/// Raw monotonic millisecond clock
///
/// The counter is free-running and wraps at `u32::MAX`; consumers must use
/// wrapping arithmetic when comparing readings.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed epoch (usually boot)
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}
