//! Single-flight guard for console submissions.

use std::sync::atomic::{AtomicBool, Ordering};

use novel_admin_core::error::{AdminError, AdminResult};

/// Holds the console's busy flag until dropped.
///
/// At most one guard exists per flag at a time, so a second submission
/// while the first is in flight fails with [`AdminError::Busy`] instead of
/// racing it. The flag is released on every exit path, errors included.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// Takes the flag or fails if it is already held.
    pub fn acquire(flag: &'a AtomicBool) -> AdminResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AdminError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails() {
        let flag = AtomicBool::new(false);
        let guard = BusyGuard::acquire(&flag).unwrap();
        assert!(matches!(BusyGuard::acquire(&flag), Err(AdminError::Busy)));
        drop(guard);
        assert!(BusyGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn test_released_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = BusyGuard::acquire(&flag).unwrap();
            assert!(flag.load(Ordering::Acquire));
        }
        assert!(!flag.load(Ordering::Acquire));
    }
}
