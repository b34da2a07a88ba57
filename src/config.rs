//! Analysis configuration loaded from JSON

use crate::core::change_detection::{ChangeDetectionParams, ChangeDirection};
use crate::types::{Crs, FloodError, FloodResult, PixelUnits};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Change detection and product settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Change threshold in input units (dB for backscatter)
    pub threshold: f32,
    /// Sign convention of the change grid
    pub direction: ChangeDirection,
    /// Latitude used for degree-to-meter conversion
    pub reference_latitude: f64,
    /// Units of the input transform; taken from the raster CRS when unset
    pub pixel_units: Option<PixelUnits>,
    /// Overlay color for positive cells
    pub overlay_color: [u8; 3],
    /// Weight of the base image in the overlay blend
    pub overlay_alpha: f32,
    /// Douglas-Peucker tolerance (CRS units) for exported polygons
    pub simplify_tolerance: Option<f64>,
    /// GeoJSON file with the area of interest polygons
    pub aoi_path: Option<PathBuf>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            direction: ChangeDirection::Decrease,
            reference_latitude: 37.55,
            pixel_units: None,
            overlay_color: [255, 0, 0],
            overlay_alpha: 0.4,
            simplify_tolerance: None,
            aoi_path: None,
        }
    }
}

impl DetectionConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FloodResult<Self> {
        log::debug!("Loading detection config from {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FloodResult<()> {
        if !self.threshold.is_finite() {
            return Err(FloodError::InvalidParameter(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if self.pixel_units != Some(PixelUnits::Meters)
            && !(self.reference_latitude.is_finite() && self.reference_latitude.abs() <= 90.0)
        {
            return Err(FloodError::InvalidParameter(format!(
                "reference_latitude must be within [-90, 90], got {}",
                self.reference_latitude
            )));
        }
        if !(0.0..=1.0).contains(&self.overlay_alpha) {
            return Err(FloodError::InvalidParameter(format!(
                "overlay_alpha must be within [0, 1], got {}",
                self.overlay_alpha
            )));
        }
        if let Some(tolerance) = self.simplify_tolerance {
            if !(tolerance.is_finite() && tolerance >= 0.0) {
                return Err(FloodError::InvalidParameter(format!(
                    "simplify_tolerance must be a non-negative number, got {}",
                    tolerance
                )));
            }
        }
        Ok(())
    }

    /// Units used for area computation on a raster in `crs`
    ///
    /// An explicit `pixel_units` wins over the CRS; a disagreement is logged.
    pub fn resolve_units(&self, crs: &Crs) -> PixelUnits {
        match self.pixel_units {
            Some(units) => {
                if units != crs.units {
                    log::warn!(
                        "Configured pixel units {:?} override {:?} of {}",
                        units,
                        crs.units,
                        crs
                    );
                }
                units
            }
            None => crs.units,
        }
    }

    pub fn change_params(&self) -> ChangeDetectionParams {
        ChangeDetectionParams {
            threshold: self.threshold,
            direction: self.direction,
        }
    }
}

/// Acquisition date window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// A named event pairing a reference ("dry") window with an event window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    pub name: String,
    pub dry: DateWindow,
    pub flood: DateWindow,
    #[serde(default)]
    pub detection: DetectionConfig,
}

impl EventConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FloodResult<Self> {
        log::debug!("Loading event config from {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> FloodResult<Self> {
        let event: Self = serde_json::from_str(content)?;
        event.validate()?;
        log::info!(
            "Event '{}': dry {} .. {}, flood {} .. {}",
            event.name,
            event.dry.start,
            event.dry.end,
            event.flood.start,
            event.flood.end
        );
        Ok(event)
    }

    /// Event config stored as `event_<name>.json` in `config_dir`
    pub fn load_named<P: AsRef<Path>>(config_dir: P, name: &str) -> FloodResult<Self> {
        Self::from_json_file(config_dir.as_ref().join(format!("event_{}.json", name)))
    }

    pub fn validate(&self) -> FloodResult<()> {
        if self.name.trim().is_empty() {
            return Err(FloodError::InvalidParameter("event name is empty".to_string()));
        }
        for (label, window) in [("dry", &self.dry), ("flood", &self.flood)] {
            if window.start > window.end {
                return Err(FloodError::InvalidParameter(format!(
                    "{} window starts after it ends ({} > {})",
                    label, window.start, window.end
                )));
            }
        }
        self.detection.validate()
    }
}
