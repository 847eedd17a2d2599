//! Atomic publication of compiled configuration generations.
//!
//! Readers take cheap `Arc` snapshots; a reload builds a complete new
//! generation and swaps it in, so a half-built configuration is never
//! visible.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

/// Holds the current generation of a compiled value.
///
/// ```
/// use rsrconf::{Published, RsrParsers};
///
/// let rules = Published::new(RsrParsers::compile("~*req.Account").unwrap());
/// let snapshot = rules.load();
/// rules.publish(RsrParsers::compile("~*req.Subject").unwrap());
/// assert_eq!(snapshot.rule(), "~*req.Account");
/// assert_eq!(rules.load().rule(), "~*req.Subject");
/// ```
pub struct Published<T> {
    current: ArcSwap<T>,
}

impl<T> Published<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Snapshot of the current generation. It stays valid after later
    /// publications.
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Replace the current generation, returning the previous one.
    pub fn publish(&self, next: T) -> Arc<T> {
        debug!("publishing new configuration generation");
        self.current.swap(Arc::new(next))
    }

    /// Build a new generation from the current one and publish it only if
    /// the builder succeeds. On error the current generation stays in place.
    ///
    /// # Arguments
    ///
    /// * `build` - Receives the current generation and returns the next one
    pub fn reload_with<E, F>(&self, build: F) -> Result<Arc<T>, E>
    where
        F: FnOnce(&T) -> Result<T, E>,
        E: fmt::Display,
    {
        let current = self.load();
        match build(&current) {
            Ok(next) => {
                let next = Arc::new(next);
                self.current.store(Arc::clone(&next));
                debug!("reloaded configuration generation");
                Ok(next)
            }
            Err(err) => {
                warn!(error = %err, "reload failed, keeping current configuration");
                Err(err)
            }
        }
    }
}

impl<T: Default> Default for Published<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Published<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Published")
            .field("current", &self.load())
            .finish()
    }
}
