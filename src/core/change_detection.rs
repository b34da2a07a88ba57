use crate::types::{ensure_same_shape, BinaryMask, FloodError, FloodResult, NEGATIVE, POSITIVE};
use ndarray::{Array2, Zip};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Sign convention of the change grid
///
/// The two use cases look for opposite signals, so the direction is fixed per
/// use case instead of being inferred from the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    /// `before - after`: backscatter dropped (open water appearing)
    #[default]
    Decrease,
    /// `after - before`: signal rose (burn scars in post-fire imagery)
    Increase,
}

/// Change detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeDetectionParams {
    /// Minimum change, in input units, for a cell to be classified positive
    pub threshold: f32,
    /// Sign convention of the change grid
    pub direction: ChangeDirection,
}

/// Threshold-based change detector for co-registered raster pairs
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    params: ChangeDetectionParams,
}

impl ChangeDetector {
    pub fn new(params: ChangeDetectionParams) -> Self {
        Self { params }
    }

    /// Detector for flood mapping (`before - after`)
    pub fn flood(threshold: f32) -> Self {
        Self::new(ChangeDetectionParams {
            threshold,
            direction: ChangeDirection::Decrease,
        })
    }

    /// Detector for burned-area mapping (`after - before`)
    pub fn burn(threshold: f32) -> Self {
        Self::new(ChangeDetectionParams {
            threshold,
            direction: ChangeDirection::Increase,
        })
    }

    pub fn params(&self) -> &ChangeDetectionParams {
        &self.params
    }

    /// Classify changed cells between two acquisitions
    ///
    /// Returns the binary mask together with the signed change grid used for
    /// thresholding.
    pub fn detect(
        &self,
        before: &Array2<f32>,
        after: &Array2<f32>,
    ) -> FloodResult<(BinaryMask, Array2<f32>)> {
        log::info!(
            "Running change detection ({:?}, threshold {})",
            self.params.direction,
            self.params.threshold
        );

        let (mask, change) = match self.params.direction {
            ChangeDirection::Decrease => detect_change(before, after, self.params.threshold)?,
            ChangeDirection::Increase => detect_change(after, before, self.params.threshold)?,
        };

        let positives = mask.iter().filter(|&&v| v == POSITIVE).count();
        log::info!(
            "Change detection complete: {} of {} cells changed",
            positives,
            mask.len()
        );
        Ok((mask, change))
    }
}

/// Difference `minuend - subtrahend` followed by a strict threshold
///
/// NaN in either input yields NaN change and a 0 mask cell; NaN is not a
/// separate class at this layer. Cells exactly at the threshold stay 0.
pub fn detect_change<T: Float>(
    minuend: &Array2<T>,
    subtrahend: &Array2<T>,
    threshold: T,
) -> FloodResult<(BinaryMask, Array2<T>)> {
    ensure_same_shape("before/after grids", minuend.dim(), subtrahend.dim())?;

    let (rows, cols) = minuend.dim();
    if rows == 0 || cols == 0 {
        return Err(FloodError::EmptyInput(format!(
            "Cannot run change detection on a {}x{} grid",
            rows, cols
        )));
    }
    if threshold.is_nan() {
        return Err(FloodError::InvalidParameter(
            "Change threshold must not be NaN".to_string(),
        ));
    }

    let change = Zip::from(minuend)
        .and(subtrahend)
        .map_collect(|&a, &b| a - b);
    let mask = threshold_change(&change, threshold);

    if log::log_enabled!(log::Level::Debug) {
        let (min, max) = finite_range(&change);
        log::debug!("Change range: {:?} .. {:?}", min.to_f64(), max.to_f64());
    }
    if change.iter().all(|v| v.is_nan()) {
        log::warn!("Change grid contains only NaN; mask will be empty");
    }

    Ok((mask, change))
}

/// Flood-mapping entry point: `change = before - after`
pub fn detect(
    before: &Array2<f32>,
    after: &Array2<f32>,
    threshold: f32,
) -> FloodResult<(BinaryMask, Array2<f32>)> {
    detect_change(before, after, threshold)
}

/// Binary classification of an existing change grid (`change > threshold`)
pub fn threshold_change<T: Float>(change: &Array2<T>, threshold: T) -> BinaryMask {
    change.mapv(|v| if v > threshold { POSITIVE } else { NEGATIVE })
}

/// Min/max over finite cells, NaN when no cell is finite
pub fn finite_range<T: Float>(grid: &Array2<T>) -> (T, T) {
    let mut min = T::infinity();
    let mut max = T::neg_infinity();
    for &v in grid.iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min > max {
        (T::nan(), T::nan())
    } else {
        (min, max)
    }
}
