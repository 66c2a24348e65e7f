//! Station-centred neighbourhood sampling of a north-up raster.
//!
//! A station's (lat, lon) is inverted through the geotransform into fractional
//! pixel offsets, anchored to a reference pixel, and the square or circular
//! neighbourhood around it is averaged with no-data pixels excluded.
//!
//! Reference pixel convention:
//! - odd widths anchor on the nearest grid point, which is also the
//!   geometric centre of the neighbourhood;
//! - even widths anchor on the lower-left grid point of the true centre, and
//!   the extra row and column lie above and to the right of it.

use crate::error::{AodError, Result};
use crate::geotransform::Geotransform;
use log::debug;
use ndarray::ArrayView2;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Square,
    Circle,
}

impl FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "square" => Ok(Shape::Square),
            "circle" => Ok(Shape::Circle),
            other => Err(format!("unknown shape '{}' (expected square or circle)", other)),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Square => write!(f, "SQUARE"),
            Shape::Circle => write!(f, "CIRCLE"),
        }
    }
}

/// Shape and full width (in pixels, not a radius) of a sampling window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighborhood {
    shape: Shape,
    width: usize,
}

impl Neighborhood {
    pub fn new(shape: Shape, width: usize) -> Result<Self> {
        if width == 0 {
            return Err(AodError::InvalidWidth(width));
        }
        Ok(Self { shape, width })
    }

    pub fn square(width: usize) -> Result<Self> {
        Self::new(Shape::Square, width)
    }

    pub fn circle(width: usize) -> Result<Self> {
        Self::new(Shape::Circle, width)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn is_even(&self) -> bool {
        self.width % 2 == 0
    }

    fn is_degenerate(&self) -> bool {
        self.shape == Shape::Circle && self.width == 2
    }

    /// Anchor fractional (row, col) offsets to the reference pixel.
    ///
    /// Offsets beyond the `i64` range saturate, which always lands outside
    /// the raster.
    pub fn reference_pixel(&self, row_offset: f64, col_offset: f64) -> (i64, i64) {
        if self.is_even() {
            (row_offset.ceil() as i64, col_offset.floor() as i64)
        } else {
            ((row_offset + 0.5).floor() as i64, (col_offset + 0.5).floor() as i64)
        }
    }

    /// Inclusive step range, on both axes, holding every member
    fn step_bounds(&self) -> (i64, i64) {
        // width / 2 always fits in an i64
        let half = (self.width / 2) as i64;
        match (self.shape, self.is_even()) {
            (_, false) => (-half, half),
            (Shape::Square, true) => (-(half - 1), half),
            // The true centre sits half a pixel up and right of the
            // reference, and the outermost steps on either side never fall
            // within the radius
            (Shape::Circle, true) => (-(half - 2), half - 1),
        }
    }

    /// Whether the pixel `x` rows up and `y` columns right of the reference
    /// is a member
    fn contains_step(&self, x: i64, y: i64) -> bool {
        match self.shape {
            Shape::Square => true,
            Shape::Circle => {
                let radius = (self.width as f64 - 1.0) / 2.0;
                // Measured from the true centre, not the reference pixel
                let shift = if self.is_even() { 0.5 } else { 0.0 };
                let dx = x as f64 - shift;
                let dy = y as f64 - shift;
                (dx * dx + dy * dy).sqrt() <= radius
            }
        }
    }

    /// Members of the neighbourhood around `reference` that lie inside a
    /// `rows` x `cols` raster.
    ///
    /// Returns `Ok(None)` for the degenerate circle of width 2, and
    /// `OutOfExtent` when the reference pixel itself is outside the raster.
    /// Only the in-raster part of the window is visited, so the cost is
    /// bounded by the raster size whatever the width.
    pub fn pixels(&self, reference: (i64, i64), rows: usize, cols: usize) -> Result<Option<Members>> {
        if self.is_degenerate() {
            return Ok(None);
        }

        let (ref_row, ref_col) = reference;
        let (n_rows, n_cols) = (rows as i64, cols as i64);
        if ref_row < 0 || ref_col < 0 || ref_row >= n_rows || ref_col >= n_cols {
            return Err(AodError::OutOfExtent {
                row: ref_row,
                col: ref_col,
                rows,
                cols,
            });
        }

        // Row index is ref_row - x, column index is ref_col + y
        let (low, high) = self.step_bounds();
        let (x_low, x_high) = (low.max(ref_row - (n_rows - 1)), high.min(ref_row));
        let (y_low, y_high) = (low.max(-ref_col), high.min(n_cols - 1 - ref_col));
        let clipped = x_low > low || x_high < high || y_low > low || y_high < high;

        let mut pixels = Vec::new();
        for x in x_low..=x_high {
            for y in y_low..=y_high {
                if self.contains_step(x, y) {
                    pixels.push(((ref_row - x) as usize, (ref_col + y) as usize));
                }
            }
        }
        Ok(Some(Members { pixels, clipped }))
    }
}

/// In-raster members of a neighbourhood
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Members {
    pub pixels: Vec<(usize, usize)>,
    /// Part of the neighbourhood ran past the raster edge and was dropped
    pub clipped: bool,
}

impl fmt::Display for Neighborhood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} width {}", self.shape, self.width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataReason {
    /// Circle of width 2 has no well-defined pixel set
    DegenerateCircle,
    /// Every pixel in the neighbourhood was no-data
    AllMasked,
    /// The neighbourhood ran off the raster edge and no pixel inside it was valid
    OutsideRaster,
}

impl fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoDataReason::DegenerateCircle => write!(f, "degenerate circle of width 2"),
            NoDataReason::AllMasked => write!(f, "all pixels are no-data"),
            NoDataReason::OutsideRaster => write!(f, "no valid pixels inside the raster"),
        }
    }
}

/// Result of sampling a neighbourhood
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Value(f64),
    NoData(NoDataReason),
}

impl Sample {
    pub fn value(&self) -> Option<f64> {
        match self {
            Sample::Value(v) => Some(*v),
            Sample::NoData(_) => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Sample::NoData(_))
    }

    /// Apply a product scale factor to a valid value
    pub fn scaled(self, factor: f64) -> Sample {
        match self {
            Sample::Value(v) => Sample::Value(v * factor),
            no_data => no_data,
        }
    }
}

fn is_valid(value: f64, nodata: f64) -> bool {
    !value.is_nan() && value != nodata
}

/// Average the neighbourhood of a station, excluding `nodata` pixels.
///
/// Members outside the raster are skipped like no-data pixels. "No data"
/// outcomes are returned as [`Sample::NoData`]. Errors are reserved for a
/// non-finite coordinate, an empty raster and a station whose reference pixel
/// is outside the raster.
pub fn sample(
    raster: &ArrayView2<f64>,
    geotransform: &Geotransform,
    lat: f64,
    lon: f64,
    neighborhood: Neighborhood,
    nodata: f64,
) -> Result<Sample> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(AodError::InvalidCoordinate(lat, lon));
    }

    let (rows, cols) = raster.dim();
    if rows == 0 || cols == 0 {
        return Err(AodError::InvalidDimensions(cols, rows));
    }

    let (row_offset, col_offset) = geotransform.offsets(lat, lon);
    let reference = neighborhood.reference_pixel(row_offset, col_offset);

    let members = match neighborhood.pixels(reference, rows, cols)? {
        Some(members) => members,
        None => return Ok(Sample::NoData(NoDataReason::DegenerateCircle)),
    };

    let mut sum = 0.0;
    let mut count = 0usize;
    for &(row, col) in &members.pixels {
        let value = raster[[row, col]];
        if is_valid(value, nodata) {
            sum += value;
            count += 1;
        }
    }

    debug!(
        "Sampled {} at ({:.4}, {:.4}) around pixel {:?}: {} of {} in-raster pixels valid{}",
        neighborhood,
        lat,
        lon,
        reference,
        count,
        members.pixels.len(),
        if members.clipped { ", window clipped at edge" } else { "" }
    );

    if count > 0 {
        Ok(Sample::Value(sum / count as f64))
    } else if members.clipped {
        Ok(Sample::NoData(NoDataReason::OutsideRaster))
    } else {
        Ok(Sample::NoData(NoDataReason::AllMasked))
    }
}
