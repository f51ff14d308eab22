//! Base display scale
//!
//! Manages the zoom factor every page is rasterized at for normal viewing.
//! Zoom-in/zoom-out controls step it and it always stays within bounds.

use super::{DEFAULT_BASE_SCALE, MAX_SCALE, MIN_SCALE, ZOOM_STEP, positive_or};

/// Base scale state for a render session
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoom {
    /// Current zoom factor (1.0 = 100%)
    factor: f32,
    min: f32,
    max: f32,
    step: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            factor: DEFAULT_BASE_SCALE,
            min: MIN_SCALE,
            max: MAX_SCALE,
            step: ZOOM_STEP,
        }
    }
}

impl Zoom {
    /// Zoom with custom bounds. Bounds are swapped if given in the wrong order;
    /// a bound that is not a positive finite number falls back to the default.
    #[must_use]
    pub fn with_bounds(factor: f32, min: f32, max: f32, step: f32) -> Self {
        let min = positive_or(min, MIN_SCALE);
        let max = positive_or(max, MAX_SCALE);
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let mut zoom = Self {
            factor: DEFAULT_BASE_SCALE,
            min,
            max,
            step: if step.is_finite() && step > 0.0 {
                step
            } else {
                ZOOM_STEP
            },
        };
        zoom.factor = zoom.clamp_factor(factor);
        zoom
    }

    /// Returns the current zoom factor
    #[must_use]
    pub fn factor(&self) -> f32 {
        self.factor
    }

    #[must_use]
    pub fn bounds(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// Zoom in by one step. Returns true if the factor changed.
    pub fn step_in(&mut self) -> bool {
        self.set(self.factor + self.step)
    }

    /// Zoom out by one step. Returns true if the factor changed.
    pub fn step_out(&mut self) -> bool {
        self.set(self.factor - self.step)
    }

    /// Set the factor, clamped. Returns true if the factor changed.
    pub fn set(&mut self, factor: f32) -> bool {
        let clamped = self.clamp_factor(factor);
        if (clamped - self.factor).abs() > f32::EPSILON {
            self.factor = clamped;
            true
        } else {
            false
        }
    }

    /// Clamp factor to valid range, handling NaN/Inf
    #[must_use]
    pub fn clamp_factor(&self, factor: f32) -> f32 {
        if !factor.is_finite() {
            self.factor.clamp(self.min, self.max)
        } else {
            factor.clamp(self.min, self.max)
        }
    }
}
