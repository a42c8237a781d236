//! Process-wide vendor SDK lifecycle
//!
//! The vendor SDK keeps process-global state and must be initialized once
//! before any device call and torn down once after the last session is
//! gone. `SdkRuntime` models that lifecycle as a reference-counted object
//! that sessions acquire on construction and release on drop, instead of
//! as ambient global state.

use crate::core::error::{CameraError, Result};
use crate::sdk::backend::CameraSdk;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

/// Reference-counted owner of the vendor SDK's process-wide init state.
///
/// Thread-safe: session constructors and destructors on different threads
/// may acquire and release concurrently; the count is guarded by a single
/// mutex. Vendor init runs on the first acquire, vendor teardown when the
/// count returns to zero.
pub struct SdkRuntime {
    backend: Arc<dyn CameraSdk>,
    refs: Mutex<usize>,
}

impl SdkRuntime {
    /// Create a runtime over the given backend. No vendor call is made
    /// until the first `acquire`.
    pub fn new(backend: Arc<dyn CameraSdk>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            refs: Mutex::new(0),
        })
    }

    /// The backend this runtime manages
    pub fn backend(&self) -> Arc<dyn CameraSdk> {
        Arc::clone(&self.backend)
    }

    /// Acquire a reference to the initialized SDK.
    ///
    /// The first successful acquire performs vendor initialization and any
    /// persistent process context it needs (the FFI backend pins the
    /// working directory to the SDK's adapter-library directory and does
    /// not restore it). Fails with [`CameraError::Init`] if the vendor
    /// runtime or its native libraries are unavailable; a later acquire
    /// retries, so an externally corrected install can recover.
    pub fn acquire(self: &Arc<Self>) -> Result<RuntimeGuard> {
        let mut refs = self.refs.lock().unwrap();

        if *refs == 0 {
            info!("Initializing vendor SDK");
            self.backend
                .init()
                .map_err(|e| CameraError::Init(e.to_string()))?;
        }

        *refs += 1;
        debug!("SDK runtime acquired (refs: {})", *refs);

        Ok(RuntimeGuard {
            runtime: Arc::clone(self),
        })
    }

    /// Current number of outstanding references. Mainly useful for
    /// leak-checking in tests.
    pub fn active_refs(&self) -> usize {
        *self.refs.lock().unwrap()
    }

    fn release_one(&self) {
        let mut refs = self.refs.lock().unwrap();

        if *refs == 0 {
            warn!("SDK runtime released more often than acquired");
            return;
        }

        *refs -= 1;
        debug!("SDK runtime released (refs: {})", *refs);

        if *refs == 0 {
            info!("Releasing vendor SDK");
            self.backend.release();
        }
    }
}

/// RAII guard for one runtime reference.
///
/// Dropping the guard decrements the count; the last drop triggers vendor
/// teardown.
pub struct RuntimeGuard {
    runtime: Arc<SdkRuntime>,
}

impl std::fmt::Debug for RuntimeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeGuard").finish_non_exhaustive()
    }
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        self.runtime.release_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::mock::{MockSdk, MockSdkConfig};

    #[test]
    fn test_acquire_release_refcount() {
        let sdk = MockSdk::new();
        let runtime = SdkRuntime::new(sdk.clone());
        assert_eq!(runtime.active_refs(), 0);

        let a = runtime.acquire().unwrap();
        let b = runtime.acquire().unwrap();
        assert_eq!(runtime.active_refs(), 2);
        assert_eq!(sdk.init_calls(), 1);

        drop(a);
        assert_eq!(runtime.active_refs(), 1);
        assert_eq!(sdk.release_calls(), 0);

        drop(b);
        assert_eq!(runtime.active_refs(), 0);
        assert_eq!(sdk.release_calls(), 1);
    }

    #[test]
    fn test_reinit_after_full_release() {
        let sdk = MockSdk::new();
        let runtime = SdkRuntime::new(sdk.clone());

        drop(runtime.acquire().unwrap());
        drop(runtime.acquire().unwrap());

        // Two full cycles mean two inits and two teardowns
        assert_eq!(sdk.init_calls(), 2);
        assert_eq!(sdk.release_calls(), 2);
    }

    #[test]
    fn test_init_failure_is_surfaced_and_retryable() {
        let sdk = MockSdk::with_config(MockSdkConfig {
            fail_init: true,
            ..Default::default()
        });
        let runtime = SdkRuntime::new(sdk.clone());

        let err = runtime.acquire().unwrap_err();
        assert!(matches!(err, CameraError::Init(_)));
        assert_eq!(runtime.active_refs(), 0);

        // Simulates the missing native libraries being installed
        sdk.set_fail_init(false);
        let guard = runtime.acquire().unwrap();
        assert_eq!(runtime.active_refs(), 1);
        drop(guard);
    }

    #[test]
    fn test_concurrent_acquire_single_init() {
        let sdk = MockSdk::new();
        let runtime = SdkRuntime::new(sdk.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rt = Arc::clone(&runtime);
                std::thread::spawn(move || {
                    let guard = rt.acquire().unwrap();
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    drop(guard);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(runtime.active_refs(), 0);
        assert_eq!(sdk.init_calls(), sdk.release_calls());
    }
}
