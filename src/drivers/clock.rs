//! Time source abstraction
//!
//! The engine never sleeps on its own. It only needs to know "what time is it"
//! to gate conversion delays and to time-base the vertical speed derivative.

/// Monotonic millisecond clock (milliseconds since an arbitrary start)
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
