//! Pixel to sky conversion and angular distances.
//!
//! Aperture centers live in pixel space and catalog rows in RA/Dec degrees.
//! Every photometry center passes through a [`PixelToSky`] before it is
//! compared with a catalog position.

use crate::core::image::Image;
use crate::domain::model::SkyCoord;
use crate::utils::error::{Result, StarMatchError};
use serde::{Deserialize, Serialize};

const DETERMINANT_THRESHOLD: f64 = 1e-15;

/// How pixel coordinates become sky coordinates, as written in the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TransformSettings {
    /// Pixel coordinates are compared as if they were degrees.
    #[default]
    Identity,
    /// Explicit linear WCS; `crpix` uses 0-based pixel coordinates.
    Linear {
        crpix: [f64; 2],
        crval: [f64; 2],
        cd: [[f64; 2]; 2],
    },
    /// Linear WCS taken from the FITS header of the image.
    Header,
}

impl TransformSettings {
    pub fn validate(&self) -> Result<()> {
        if let TransformSettings::Linear { crpix, crval, cd } = self {
            LinearWcs::new(*crpix, *crval, *cd)?;
        }
        Ok(())
    }
}

/// Small-field linear world coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearWcs {
    crpix: [f64; 2],
    crval: [f64; 2],
    cd: [[f64; 2]; 2],
}

impl LinearWcs {
    pub fn new(crpix: [f64; 2], crval: [f64; 2], cd: [[f64; 2]; 2]) -> Result<Self> {
        let mut values = crpix.iter().chain(crval.iter()).chain(cd.iter().flatten());
        if values.any(|v| !v.is_finite()) {
            return Err(StarMatchError::InvalidConfigValueError {
                field: "matching.transform".to_string(),
                value: format!("crpix={:?} crval={:?} cd={:?}", crpix, crval, cd),
                reason: "WCS values must be finite".to_string(),
            });
        }
        let determinant = cd[0][0] * cd[1][1] - cd[0][1] * cd[1][0];
        if determinant.abs() < DETERMINANT_THRESHOLD {
            return Err(StarMatchError::InvalidConfigValueError {
                field: "matching.transform.cd".to_string(),
                value: format!("{:?}", cd),
                reason: format!("CD matrix is not invertible (det = {:e})", determinant),
            });
        }
        Ok(Self { crpix, crval, cd })
    }

    /// Builds the CD matrix from `CDELTi` and an optional `PCi_j` matrix.
    pub fn from_pc_cdelt(
        crpix: [f64; 2],
        crval: [f64; 2],
        pc: [[f64; 2]; 2],
        cdelt: [f64; 2],
    ) -> Result<Self> {
        let cd = [
            [cdelt[0] * pc[0][0], cdelt[0] * pc[0][1]],
            [cdelt[1] * pc[1][0], cdelt[1] * pc[1][1]],
        ];
        Self::new(crpix, crval, cd)
    }

    pub fn pixel_to_sky(&self, x: f64, y: f64) -> SkyCoord {
        let dx = x - self.crpix[0];
        let dy = y - self.crpix[1];
        let xi = self.cd[0][0] * dx + self.cd[0][1] * dy;
        let eta = self.cd[1][0] * dx + self.cd[1][1] * dy;

        let dec = self.crval[1] + eta;
        let cos_dec0 = self.crval[1].to_radians().cos();
        // RA offsets widen towards the poles
        let ra = if cos_dec0.abs() > f64::EPSILON {
            self.crval[0] + xi / cos_dec0
        } else {
            self.crval[0]
        };
        SkyCoord::new(ra.rem_euclid(360.0), dec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelToSky {
    Identity,
    Linear(LinearWcs),
}

impl PixelToSky {
    /// Picks the transform for `image` according to the configured mode.
    pub fn resolve(settings: &TransformSettings, image: &Image) -> Result<Self> {
        match settings {
            TransformSettings::Identity => Ok(Self::Identity),
            TransformSettings::Linear { crpix, crval, cd } => {
                Ok(Self::Linear(LinearWcs::new(*crpix, *crval, *cd)?))
            }
            TransformSettings::Header => match image.wcs() {
                Some(wcs) => Ok(Self::Linear(*wcs)),
                None => {
                    tracing::warn!(
                        "⚠️ Image carries no WCS keywords, comparing pixel coordinates directly"
                    );
                    Ok(Self::Identity)
                }
            },
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> SkyCoord {
        match self {
            PixelToSky::Identity => SkyCoord::new(x, y),
            PixelToSky::Linear(wcs) => wcs.pixel_to_sky(x, y),
        }
    }
}

/// Angular distance between two sky positions in degrees (Vincenty formula).
pub fn angular_separation_deg(a: SkyCoord, b: SkyCoord) -> f64 {
    let (s1, c1) = a.dec.to_radians().sin_cos();
    let (s2, c2) = b.dec.to_radians().sin_cos();
    let (sin_dl, cos_dl) = (b.ra - a.ra).to_radians().sin_cos();

    let num1 = c2 * sin_dl;
    let num2 = c1 * s2 - s1 * c2 * cos_dl;
    let numerator = (num1 * num1 + num2 * num2).sqrt();
    let denominator = s1 * s2 + c1 * c2 * cos_dl;

    numerator.atan2(denominator).to_degrees()
}
