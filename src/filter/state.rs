//! User-controlled filter settings.

use super::transform::Intensity;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Filter settings read once per render tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Whether the filter is applied at all.
    pub enabled: bool,
    /// Blend amount between the raw and fully filtered frame.
    pub intensity: Intensity,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: Intensity::DEFAULT,
        }
    }
}

impl FilterState {
    /// Creates an enabled state with the given intensity.
    pub fn with_intensity(intensity: Intensity) -> Self {
        Self {
            enabled: true,
            intensity,
        }
    }

    /// A state that passes frames through untouched.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Returns true if applying this state would change any pixel.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.intensity.is_off()
    }
}

/// Filter state shared between the control layer (writer) and the
/// render loop (reader).
///
/// Every read returns a whole `FilterState`, so a tick never sees a
/// half-applied update.
#[derive(Debug, Clone, Default)]
pub struct SharedFilterState {
    inner: Arc<RwLock<FilterState>>,
}

impl SharedFilterState {
    pub fn new(state: FilterState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns a consistent copy of the current settings.
    pub fn snapshot(&self) -> FilterState {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the whole state.
    pub fn set(&self, state: FilterState) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn set_intensity(&self, intensity: Intensity) {
        self.update(|s| s.intensity = intensity);
        tracing::debug!(intensity = intensity.value(), "Filter intensity changed");
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.update(|s| s.enabled = enabled);
        tracing::debug!(enabled, "Filter toggled");
    }

    /// Flips the enabled flag and returns the new value.
    pub fn toggle(&self) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.enabled = !guard.enabled;
        guard.enabled
    }

    fn update(&self, f: impl FnOnce(&mut FilterState)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}
