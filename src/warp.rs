use crate::error::{AodError, Result};
use log::{debug, info};
use std::path::Path;
use std::process::Command;

const RESAMPLING_METHODS: [&str; 5] = ["near", "bilinear", "cubic", "average", "mode"];

/// Output window and grid for clipping a band to a region of interest
#[derive(Debug, Clone, PartialEq)]
pub struct ClipOptions {
    /// (min_x, min_y, max_x, max_y) in degrees
    pub bounds: [f64; 4],
    pub resolution: f64,
    pub resampling: String,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            bounds: [100.1, 6.1, 111.8, 25.6],
            resolution: 0.05,
            resampling: "near".to_string(),
        }
    }
}

impl ClipOptions {
    pub fn validate(&self) -> Result<()> {
        let [min_x, min_y, max_x, max_y] = self.bounds;
        if !(min_x < max_x && min_y < max_y) {
            return Err(AodError::InvalidBounds(min_x, min_y, max_x, max_y));
        }
        if !(self.resolution > 0.0) || !self.resolution.is_finite() {
            return Err(AodError::InvalidResolution(self.resolution));
        }
        if !RESAMPLING_METHODS.contains(&self.resampling.as_str()) {
            return Err(AodError::InvalidResampling(self.resampling.clone()));
        }
        Ok(())
    }

    /// gdalwarp arguments, excluding source and destination
    pub fn warp_args(&self) -> Vec<String> {
        let [min_x, min_y, max_x, max_y] = self.bounds;
        vec![
            "-overwrite".to_string(),
            "-te".to_string(),
            min_x.to_string(),
            min_y.to_string(),
            max_x.to_string(),
            max_y.to_string(),
            "-tr".to_string(),
            self.resolution.to_string(),
            self.resolution.to_string(),
            "-r".to_string(),
            self.resampling.clone(),
        ]
    }
}

/// Clip and resample a raster to the configured window using gdalwarp
pub fn clip_to_bounds(input: &Path, output: &Path, options: &ClipOptions) -> Result<()> {
    options.validate()?;
    info!(
        "Clipping {} to {:?} at {} degrees",
        input.display(),
        options.bounds,
        options.resolution
    );

    let args = options.warp_args();
    debug!("gdalwarp {}", args.join(" "));

    let result = Command::new("gdalwarp")
        .args(&args)
        .arg(input)
        .arg(output)
        .output()
        .map_err(|e| AodError::WarpFailed(format!("could not run gdalwarp: {}", e)))?;

    if result.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&result.stderr);
        Err(AodError::WarpFailed(stderr.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_valid() {
        assert!(ClipOptions::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_bounds() {
        let opts = ClipOptions {
            bounds: [111.8, 6.1, 100.1, 25.6],
            ..ClipOptions::default()
        };
        assert!(matches!(opts.validate(), Err(AodError::InvalidBounds(..))));
    }

    #[test]
    fn test_invalid_resolution() {
        for resolution in [0.0, -0.05, f64::NAN] {
            let opts = ClipOptions {
                resolution,
                ..ClipOptions::default()
            };
            assert!(matches!(opts.validate(), Err(AodError::InvalidResolution(_))));
        }
    }

    #[test]
    fn test_invalid_resampling() {
        let opts = ClipOptions {
            resampling: "lanczos-ish".to_string(),
            ..ClipOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_warp_args() {
        let args = ClipOptions::default().warp_args();
        assert_eq!(
            args,
            vec!["-overwrite", "-te", "100.1", "6.1", "111.8", "25.6", "-tr", "0.05", "0.05", "-r", "near"]
        );
    }
}
