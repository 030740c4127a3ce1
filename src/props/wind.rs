// src/props/wind.rs
//! Wind phase accumulator.
//!
//! Shaders animate with `sin(phase)`; integrating the rate here instead of
//! scaling raw time means a change of wind strength changes the *speed*, never
//! the current phase.

/// Wind inputs for the detail shader.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WindSample {
    pub amplitude: f32,
    pub phase: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WindPhaseClock {
    phase: f32,
}

impl WindPhaseClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    #[inline]
    pub fn rate(wind_strength: f32) -> f32 {
        1.0 + 3.0 * wind_strength
    }

    pub fn advance(&mut self, dt: f32, wind_strength: f32) -> WindSample {
        self.phase += dt * Self::rate(wind_strength);
        WindSample { amplitude: wind_strength, phase: self.phase }
    }
}
