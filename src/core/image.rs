//! Image loading.
//!
//! Every loader returns a 2-D `f64` pixel array indexed `[row, column]`, i.e.
//! `[y, x]`. Anything that is not a single plane is rejected here, before any
//! photometry runs.

use crate::core::transform::LinearWcs;
use crate::utils::error::{Result, StarMatchError};
use ndarray::{Array2, ArrayView2};
use std::collections::HashMap;
use std::path::Path;

const FITS_BLOCK: usize = 2880;
const FITS_CARD: usize = 80;

#[derive(Debug, Clone)]
pub struct Image {
    pixels: Array2<f64>,
    wcs: Option<LinearWcs>,
}

impl Image {
    pub fn new(pixels: Array2<f64>) -> Result<Self> {
        let (height, width) = pixels.dim();
        if height == 0 || width == 0 {
            return Err(StarMatchError::not_two_dimensional(format!(
                "image has shape {}x{}",
                height, width
            )));
        }
        Ok(Self { pixels, wcs: None })
    }

    pub fn with_wcs(mut self, wcs: Option<LinearWcs>) -> Self {
        self.wcs = wcs;
        self
    }

    pub fn pixels(&self) -> ArrayView2<'_, f64> {
        self.pixels.view()
    }

    /// `(height, width)`
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    pub fn wcs(&self) -> Option<&LinearWcs> {
        self.wcs.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Fits,
    TextGrid,
    Raster,
}

fn kind_for(path: &Path) -> ImageKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("fits" | "fit" | "fts") => ImageKind::Fits,
        Some("txt" | "dat" | "csv") => ImageKind::TextGrid,
        _ => ImageKind::Raster,
    }
}

/// Loads `path` as a single-plane image, dispatching on the file extension.
pub fn load_image(path: &Path) -> Result<Image> {
    tracing::debug!("Loading image {}", path.display());
    let image = match kind_for(path) {
        ImageKind::Fits => parse_fits(&std::fs::read(path)?)?,
        ImageKind::TextGrid => Image::new(parse_text_grid(&std::fs::read_to_string(path)?)?)?,
        ImageKind::Raster => Image::new(load_raster(path)?)?,
    };
    let (height, width) = image.dim();
    tracing::info!(
        "🖼️ Loaded {} ({}x{} pixels{})",
        path.display(),
        width,
        height,
        if image.wcs().is_some() { ", WCS present" } else { "" }
    );
    Ok(image)
}

fn load_raster(path: &Path) -> Result<Array2<f64>> {
    let luma = ::image::open(path)?.to_luma32f();
    let (width, height) = luma.dimensions();
    let data: Vec<f64> = luma.into_raw().into_iter().map(f64::from).collect();
    Array2::from_shape_vec((height as usize, width as usize), data)
        .map_err(|e| StarMatchError::image_format(format!("raster buffer: {}", e)))
}

/// One image row per line, values separated by commas and/or whitespace.
/// Blank lines and lines starting with `#` are ignored.
pub fn parse_text_grid(text: &str) -> Result<Array2<f64>> {
    let mut width: Option<usize> = None;
    let mut data = Vec::new();
    let mut height = 0;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut row_len = 0;
        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let value = token.parse::<f64>().map_err(|_| {
                StarMatchError::image_format(format!(
                    "line {}: '{}' is not a number",
                    line_no + 1,
                    token
                ))
            })?;
            data.push(value);
            row_len += 1;
        }

        match width {
            None => width = Some(row_len),
            Some(w) if w != row_len => {
                return Err(StarMatchError::not_two_dimensional(format!(
                    "line {} has {} values, expected {}",
                    line_no + 1,
                    row_len,
                    w
                )));
            }
            Some(_) => {}
        }
        height += 1;
    }

    let width = width
        .ok_or_else(|| StarMatchError::not_two_dimensional("no pixel rows found"))?;
    Array2::from_shape_vec((height, width), data)
        .map_err(|e| StarMatchError::not_two_dimensional(e.to_string()))
}

/// Parsed primary header: keyword -> raw value text (quotes and comments stripped).
#[derive(Debug, Default)]
struct FitsHeader {
    values: HashMap<String, String>,
}

impl FitsHeader {
    fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn float(&self, key: &str) -> Result<Option<f64>> {
        match self.raw(key) {
            None => Ok(None),
            // Fortran-style exponents (1.0D-3) are legal in FITS
            Some(raw) => raw
                .replace(['D', 'd'], "E")
                .parse::<f64>()
                .map(Some)
                .map_err(|_| {
                    StarMatchError::image_format(format!("FITS keyword {} = '{}'", key, raw))
                }),
        }
    }

    fn int(&self, key: &str) -> Result<i64> {
        let raw = self.raw(key).ok_or_else(|| {
            StarMatchError::image_format(format!("FITS header has no {} keyword", key))
        })?;
        raw.parse::<i64>()
            .map_err(|_| StarMatchError::image_format(format!("FITS keyword {} = '{}'", key, raw)))
    }

    /// Linear WCS from CRPIX/CRVAL plus either CDi_j or CDELTi (+ PCi_j).
    /// FITS CRPIX is 1-based; the result uses 0-based pixel coordinates.
    fn linear_wcs(&self) -> Result<Option<LinearWcs>> {
        let (Some(crpix1), Some(crpix2), Some(crval1), Some(crval2)) = (
            self.float("CRPIX1")?,
            self.float("CRPIX2")?,
            self.float("CRVAL1")?,
            self.float("CRVAL2")?,
        ) else {
            return Ok(None);
        };
        let crpix = [crpix1 - 1.0, crpix2 - 1.0];
        let crval = [crval1, crval2];

        let cd = [
            self.float("CD1_1")?,
            self.float("CD1_2")?,
            self.float("CD2_1")?,
            self.float("CD2_2")?,
        ];
        if cd.iter().any(Option::is_some) {
            let [a, b, c, d] = cd.map(|v| v.unwrap_or(0.0));
            return LinearWcs::new(crpix, crval, [[a, b], [c, d]]).map(Some);
        }

        let (Some(cdelt1), Some(cdelt2)) = (self.float("CDELT1")?, self.float("CDELT2")?) else {
            return Ok(None);
        };
        let pc = [
            [
                self.float("PC1_1")?.unwrap_or(1.0),
                self.float("PC1_2")?.unwrap_or(0.0),
            ],
            [
                self.float("PC2_1")?.unwrap_or(0.0),
                self.float("PC2_2")?.unwrap_or(1.0),
            ],
        ];
        LinearWcs::from_pc_cdelt(crpix, crval, pc, [cdelt1, cdelt2]).map(Some)
    }
}

/// Strips a trailing ` / comment` and FITS string quotes from a value field.
fn card_value(field: &str) -> String {
    let field = field.trim();
    if let Some(rest) = field.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    value.push('\'');
                    chars.next();
                    continue;
                }
                break;
            }
            value.push(c);
        }
        value.trim_end().to_string()
    } else {
        match field.find('/') {
            Some(pos) => field[..pos].trim_end().to_string(),
            None => field.to_string(),
        }
    }
}

/// Reads the header cards and returns them with the byte offset of the data unit.
fn parse_fits_header(bytes: &[u8]) -> Result<(FitsHeader, usize)> {
    let mut header = FitsHeader::default();

    for (index, card) in bytes.chunks(FITS_CARD).enumerate() {
        if card.len() < FITS_CARD {
            break;
        }
        let card = String::from_utf8_lossy(card);
        let key = card.get(..8).unwrap_or_default().trim();

        if index == 0 && key != "SIMPLE" {
            return Err(StarMatchError::image_format(
                "not a FITS file (first keyword is not SIMPLE)",
            ));
        }
        if key == "END" {
            let header_len = (index + 1) * FITS_CARD;
            let data_offset = header_len.div_ceil(FITS_BLOCK) * FITS_BLOCK;
            return Ok((header, data_offset));
        }
        if card.get(8..10) == Some("= ") {
            let field = card.get(10..).unwrap_or_default();
            header.values.insert(key.to_string(), card_value(field));
        }
    }

    Err(StarMatchError::image_format("FITS header has no END card"))
}

/// Decodes the primary HDU of a FITS file.
pub fn parse_fits(bytes: &[u8]) -> Result<Image> {
    let (header, data_offset) = parse_fits_header(bytes)?;

    let naxis = header.int("NAXIS")?;
    if naxis != 2 {
        return Err(StarMatchError::not_two_dimensional(format!(
            "FITS primary HDU has NAXIS = {}",
            naxis
        )));
    }
    let width = header.int("NAXIS1")?;
    let height = header.int("NAXIS2")?;
    if width <= 0 || height <= 0 {
        return Err(StarMatchError::not_two_dimensional(format!(
            "FITS image has NAXIS1 = {}, NAXIS2 = {}",
            width, height
        )));
    }
    let (width, height) = match (usize::try_from(width), usize::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(StarMatchError::image_format("FITS dimensions overflow")),
    };

    let bitpix = header.int("BITPIX")?;
    let bytes_per_pixel = match bitpix {
        8 => 1,
        16 => 2,
        32 | -32 => 4,
        64 | -64 => 8,
        other => {
            return Err(StarMatchError::image_format(format!(
                "unsupported BITPIX {}",
                other
            )))
        }
    };
    let bzero = header.float("BZERO")?.unwrap_or(0.0);
    let bscale = header.float("BSCALE")?.unwrap_or(1.0);

    let data_len = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(bytes_per_pixel))
        .ok_or_else(|| StarMatchError::image_format("FITS dimensions overflow"))?;
    let data_end = data_offset
        .checked_add(data_len)
        .ok_or_else(|| StarMatchError::image_format("FITS dimensions overflow"))?;
    let data = bytes
        .get(data_offset..data_end)
        .ok_or_else(|| {
            StarMatchError::image_format(format!(
                "FITS data unit truncated: need {} bytes after offset {}, file has {}",
                data_len,
                data_offset,
                bytes.len()
            ))
        })?;

    // FITS data is big-endian
    let pixels: Vec<f64> = data
        .chunks_exact(bytes_per_pixel)
        .map(|chunk| {
            let raw = match bitpix {
                8 => chunk[0] as f64,
                16 => i16::from_be_bytes([chunk[0], chunk[1]]) as f64,
                32 => i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
                -32 => f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
                64 => {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    i64::from_be_bytes(b) as f64
                }
                _ => {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    f64::from_be_bytes(b)
                }
            };
            bzero + bscale * raw
        })
        .collect();

    // NAXIS1 varies fastest, so rows are NAXIS2 long
    let array = Array2::from_shape_vec((height, width), pixels)
        .map_err(|e| StarMatchError::image_format(e.to_string()))?;

    let wcs = header.linear_wcs()?;
    Ok(Image::new(array)?.with_wcs(wcs))
}
