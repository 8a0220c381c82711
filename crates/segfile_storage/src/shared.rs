//! Reference-counted ownership with exactly-once teardown.
//!
//! Several readers of one immutable data file share a single descriptor and a
//! single set of memory mappings. Each reader holds its own
//! [`SharedCloseable`] handle; closing a handle gives up that reader's claim,
//! and the resource's [`Tidy::tidy`] runs exactly once, when the last claim is
//! given up.
//!
//! # Invariants
//!
//! - Every handle is closed at most once (explicitly or on drop)
//! - `tidy` runs exactly once per resource, after every handle is closed
//! - Handles may be closed from any thread, in any order

use std::fmt;
use std::sync::Arc;

/// Physical teardown of a shared resource.
pub trait Tidy: Send + Sync + Sized {
    /// A human-readable name for log messages.
    fn name(&self) -> String;

    /// Releases the resource. Called once, by the last owner to close.
    fn tidy(self);
}

/// One logical owner of a shared resource.
///
/// Cloning is deliberately explicit through [`SharedCloseable::shared_copy`]
/// so that every additional owner is visible at the call site.
pub struct SharedCloseable<T: Tidy> {
    shared: Option<Arc<T>>,
}

impl<T: Tidy> SharedCloseable<T> {
    /// Wraps a resource with a single owner.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            shared: Some(Arc::new(value)),
        }
    }

    /// Creates another owner of the same resource.
    ///
    /// # Panics
    ///
    /// Panics if this handle has already been closed.
    #[must_use]
    pub fn shared_copy(&self) -> Self {
        Self {
            shared: Some(Arc::clone(self.live())),
        }
    }

    /// Returns the shared resource.
    ///
    /// # Panics
    ///
    /// Panics if this handle has already been closed.
    #[must_use]
    pub fn get(&self) -> &T {
        self.live()
    }

    /// Returns the shared resource, or `None` once this handle is closed.
    #[must_use]
    pub fn try_get(&self) -> Option<&T> {
        self.shared.as_deref()
    }

    /// Returns whether this handle has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_none()
    }

    /// Returns the number of live owners, or 0 if this handle is closed.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.shared.as_ref().map_or(0, Arc::strong_count)
    }

    /// Gives up this handle's claim on the resource.
    ///
    /// Returns `true` if this call was the last release and tore the resource
    /// down. Closing an already closed handle is a no-op returning `false`.
    pub fn close(&mut self) -> bool {
        let Some(shared) = self.shared.take() else {
            return false;
        };

        // into_inner hands the value to exactly one of the racing releases.
        match Arc::into_inner(shared) {
            Some(value) => {
                let name = value.name();
                value.tidy();
                tracing::trace!(resource = %name, "released last reference");
                true
            }
            None => false,
        }
    }

    fn live(&self) -> &Arc<T> {
        match &self.shared {
            Some(shared) => shared,
            None => panic!("attempted to use a closed shared handle"),
        }
    }
}

impl<T: Tidy> Drop for SharedCloseable<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Tidy> fmt::Debug for SharedCloseable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCloseable")
            .field("resource", &self.try_get().map(Tidy::name))
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
