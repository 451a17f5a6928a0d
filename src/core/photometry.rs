//! Circular aperture photometry.
//!
//! Pixel centers sit at integer coordinates: `(0, 0)` is the center of the
//! first pixel, so the pixel at `[y, x]` covers `[x - 0.5, x + 0.5]` by
//! `[y - 0.5, y + 0.5]`. Parts of an aperture that fall outside the image
//! contribute nothing to the sum.

use crate::domain::model::PhotometryRow;
use crate::utils::error::{Result, StarMatchError};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Largest sub-pixel grid per axis; larger requests are clamped to it.
pub const MAX_SUBPIXELS: u32 = 64;

/// How pixels on the aperture boundary are weighted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ApertureMethod {
    /// A pixel counts fully when its center lies within the radius.
    #[default]
    Center,
    /// Each pixel is split into `n x n` sub-pixels and weighted by the share inside.
    Subpixel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularAperture {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl CircularAperture {
    pub fn new(x: f64, y: f64, radius: f64) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(StarMatchError::InvalidConfigValueError {
                field: "photometry.radius".to_string(),
                value: radius.to_string(),
                reason: "Aperture radius must be a finite number greater than 0".to_string(),
            });
        }
        if !(x.is_finite() && y.is_finite()) {
            return Err(StarMatchError::InvalidConfigValueError {
                field: "photometry.positions".to_string(),
                value: format!("({}, {})", x, y),
                reason: "Aperture center must be finite".to_string(),
            });
        }
        Ok(Self { x, y, radius })
    }

    /// Inclusive pixel index range touched by the aperture, clipped to `len`.
    /// `None` when the aperture misses the axis entirely.
    fn index_range(center: f64, reach: f64, len: usize) -> Option<(usize, usize)> {
        let lo = (center - reach).floor().max(0.0);
        let hi = (center + reach).ceil().min(len as f64 - 1.0);
        if len == 0 || hi < lo {
            return None;
        }
        Some((lo as usize, hi as usize))
    }

    /// Sums pixel values inside the aperture. Non-finite pixels are skipped.
    pub fn sum(&self, image: &ArrayView2<f64>, method: ApertureMethod, subpixels: u32) -> f64 {
        let (height, width) = image.dim();
        // sub-pixel sampling can reach half a pixel beyond the radius
        let reach = match method {
            ApertureMethod::Center => self.radius,
            ApertureMethod::Subpixel => self.radius + 0.5,
        };
        let (Some((x_min, x_max)), Some((y_min, y_max))) = (
            Self::index_range(self.x, reach, width),
            Self::index_range(self.y, reach, height),
        ) else {
            return 0.0;
        };

        let r2 = self.radius * self.radius;
        let mut total = 0.0;
        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let value = image[[y, x]];
                if !value.is_finite() {
                    continue;
                }
                let weight = match method {
                    ApertureMethod::Center => {
                        let dx = x as f64 - self.x;
                        let dy = y as f64 - self.y;
                        if dx * dx + dy * dy <= r2 {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    ApertureMethod::Subpixel => {
                        self.subpixel_weight(x, y, subpixels.clamp(1, MAX_SUBPIXELS), r2)
                    }
                };
                total += weight * value;
            }
        }
        total
    }

    fn subpixel_weight(&self, x: usize, y: usize, n: u32, r2: f64) -> f64 {
        let step = 1.0 / n as f64;
        let mut inside = 0u64;
        for j in 0..n {
            let sy = y as f64 - 0.5 + (j as f64 + 0.5) * step - self.y;
            for i in 0..n {
                let sx = x as f64 - 0.5 + (i as f64 + 0.5) * step - self.x;
                if sx * sx + sy * sy <= r2 {
                    inside += 1;
                }
            }
        }
        inside as f64 / (u64::from(n) * u64::from(n)) as f64
    }
}

/// Settings shared by every aperture in one photometry run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureSpec {
    pub radius: f64,
    pub method: ApertureMethod,
    pub subpixels: u32,
}

impl Default for ApertureSpec {
    fn default() -> Self {
        Self {
            radius: 4.0,
            method: ApertureMethod::Center,
            subpixels: 5,
        }
    }
}

/// Measures one aperture per position; rows keep the order of `positions`.
pub fn perform_photometry(
    image: &ArrayView2<f64>,
    positions: &[(f64, f64)],
    spec: &ApertureSpec,
) -> Result<Vec<PhotometryRow>> {
    positions
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| {
            let aperture = CircularAperture::new(x, y, spec.radius)?;
            let aperture_sum = aperture.sum(image, spec.method, spec.subpixels);
            tracing::debug!(
                "Aperture {} at ({}, {}) r={}: sum={}",
                i + 1,
                x,
                y,
                spec.radius,
                aperture_sum
            );
            Ok(PhotometryRow {
                id: i + 1,
                xcenter: x,
                ycenter: y,
                aperture_sum,
            })
        })
        .collect()
}
