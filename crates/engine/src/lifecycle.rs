//! Hooks for host application lifecycles
//!
//! Applications that already run a main loop or a shutdown sequence can drive
//! persistence from there instead of (or as well as) the background task.

use crate::store::SaveStore;
use keystash_core::Result;
use std::sync::Arc;

/// Persistence entry points for an external scheduler
pub trait LifecycleHooks {
    /// Periodic tick; flushes only if a save was requested
    fn on_tick(&self) -> Result<usize>;

    /// Shutdown; flushes every dirty record
    fn on_shutdown(&self) -> Result<usize>;
}

impl LifecycleHooks for SaveStore {
    fn on_tick(&self) -> Result<usize> {
        self.flush_if_needed()
    }

    fn on_shutdown(&self) -> Result<usize> {
        self.force_save()
    }
}

impl<T: LifecycleHooks + ?Sized> LifecycleHooks for Arc<T> {
    fn on_tick(&self) -> Result<usize> {
        (**self).on_tick()
    }

    fn on_shutdown(&self) -> Result<usize> {
        (**self).on_shutdown()
    }
}
