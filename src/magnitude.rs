//! Vector magnitude and ENMO
//!
//! Euclidean norm across the three axes, optionally minus one g and floored at
//! zero. Squares are accumulated in f64 so readings near sensor full scale
//! cannot overflow.

use crate::types::{SampleStream, Triaxial};

/// Post-processing applied to each norm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MagnitudeOptions {
    /// Subtract 1 g (Euclidean Norm Minus One)
    pub minus_one: bool,
    /// Floor negative results at zero
    pub clip_negative: bool,
}

impl MagnitudeOptions {
    /// Options for ENMO: minus one, floored at zero
    pub const ENMO: MagnitudeOptions = MagnitudeOptions {
        minus_one: true,
        clip_negative: true,
    };
}

/// Euclidean norm of one row of axis values
pub fn norm(axes: [f64; 3]) -> f64 {
    axes.iter().map(|a| a * a).sum::<f64>().sqrt()
}

fn finish(value: f64, options: MagnitudeOptions) -> f64 {
    let value = if options.minus_one { value - 1.0 } else { value };
    if options.clip_negative {
        value.max(0.0)
    } else {
        value
    }
}

/// Vector magnitude of every row
pub fn vector_magnitude(rows: &[[f64; 3]], options: MagnitudeOptions) -> Vec<f64> {
    rows.iter().map(|row| finish(norm(*row), options)).collect()
}

/// Vector magnitude of every sample in g
pub fn sample_magnitude(samples: &[Triaxial], options: MagnitudeOptions) -> Vec<f64> {
    samples
        .iter()
        .map(|s| {
            let axes = [s.v as f64, s.ml as f64, s.ap as f64];
            finish(norm(axes), options)
        })
        .collect()
}

/// Per-sample ENMO in mg: `max(|a| - 1, 0) * 1000`
pub fn enmo_mg(stream: &SampleStream) -> Vec<f64> {
    sample_magnitude(&stream.samples, MagnitudeOptions::ENMO)
        .into_iter()
        .map(|g| g * 1000.0)
        .collect()
}
