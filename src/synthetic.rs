//! Seeded synthetic before/after backscatter scenes
//!
//! Scenes mimic Sentinel-1 VV backscatter over a city crossed by a river:
//! urban/vegetation background around -8 dB, open water around -18 dB,
//! newly flooded shallow water around -15 dB and scattered urban flood
//! patches around -14 dB, all modulated by multiplicative speckle.

use crate::core::rasterize::rasterize_polygons;
use crate::types::{
    BinaryMask, Crs, FloodError, FloodResult, GeoTransform, Grid, RasterLayer, NEGATIVE, POSITIVE,
};
use geo::Polygon;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp1, StandardNormal};

/// Scene generation parameters
#[derive(Debug, Clone)]
pub struct SyntheticSceneParams {
    pub width: usize,
    pub height: usize,
    /// (min_x, min_y, max_x, max_y) in CRS units
    pub bounds: (f64, f64, f64, f64),
    pub crs: Crs,
    /// Relative growth of the water body in the flood scene (0.0 to 1.0)
    pub flood_expansion: f64,
}

impl Default for SyntheticSceneParams {
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
            bounds: (126.76, 37.43, 127.19, 37.61),
            crs: Crs::wgs84(),
            flood_expansion: 0.8,
        }
    }
}

/// A generated dry/flood pair with the water body used to build it
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub dry: RasterLayer,
    pub flood: RasterLayer,
    pub water_mask: BinaryMask,
}

/// Backscatter scene generator driven by an explicitly owned RNG
pub struct SyntheticSceneGenerator {
    rng: StdRng,
}

impl SyntheticSceneGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_rng(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Generate a scene whose water body is a meandering river band
    pub fn generate(&mut self, params: &SyntheticSceneParams) -> FloodResult<SyntheticScene> {
        let water_mask = river_mask(params.width, params.height);
        self.generate_with_water(params, water_mask)
    }

    /// Generate a scene whose water body is given as polygons in `params.crs`
    pub fn generate_from_polygons(
        &mut self,
        params: &SyntheticSceneParams,
        water: &[Polygon<f64>],
    ) -> FloodResult<SyntheticScene> {
        let transform = scene_transform(params)?;
        let water_mask = rasterize_polygons(water, &transform, (params.height, params.width));
        self.generate_with_water(params, water_mask)
    }

    /// Generate a scene for an explicit `height x width` water mask
    pub fn generate_with_water(
        &mut self,
        params: &SyntheticSceneParams,
        water_mask: BinaryMask,
    ) -> FloodResult<SyntheticScene> {
        let transform = scene_transform(params)?;
        if water_mask.dim() != (params.height, params.width) {
            return Err(FloodError::ShapeMismatch {
                context: "synthetic water mask".to_string(),
                expected: (params.height, params.width),
                found: water_mask.dim(),
            });
        }

        log::info!(
            "Generating {}x{} synthetic scene ({} water cells, expansion {})",
            params.width,
            params.height,
            water_mask.iter().filter(|&&v| v == POSITIVE).count(),
            params.flood_expansion
        );

        let base = self.base_image(params.height, params.width);
        let dry = self.backscatter_image(&base, &water_mask, 0.0);
        let flood = self.backscatter_image(&base, &water_mask, params.flood_expansion);

        Ok(SyntheticScene {
            dry: RasterLayer::new(dry, transform, params.crs.clone()),
            flood: RasterLayer::new(flood, transform, params.crs.clone()),
            water_mask,
        })
    }

    /// Urban/vegetation background, N(-8, 3) dB
    pub fn base_image(&mut self, height: usize, width: usize) -> Grid {
        Array2::from_shape_simple_fn((height, width), || self.normal(-8.0, 3.0))
    }

    /// Backscatter image with water, optional flood growth and speckle
    pub fn backscatter_image(
        &mut self,
        base: &Grid,
        water_mask: &BinaryMask,
        flood_expansion: f64,
    ) -> Grid {
        let (height, width) = base.dim();
        let mut result = base.clone();

        for ((i, j), &water) in water_mask.indexed_iter() {
            if water == POSITIVE {
                result[[i, j]] = self.normal(-18.0, 1.5);
            }
        }

        if flood_expansion > 0.0 {
            let expansion_pixels = (height.max(width) as f64 * flood_expansion * 0.05) as usize;
            if expansion_pixels > 0 {
                let expanded = dilate(water_mask, expansion_pixels);
                for ((i, j), &cell) in expanded.indexed_iter() {
                    if cell == POSITIVE && water_mask[[i, j]] != POSITIVE {
                        result[[i, j]] = self.normal(-15.0, 2.0);
                    }
                }

                let n_patches = (15.0 * flood_expansion) as usize;
                if width > 20 && height > 15 {
                    for _ in 0..n_patches {
                        self.add_flood_patch(&mut result);
                    }
                } else {
                    log::debug!("Scene too small for urban flood patches");
                }
            }
        }

        for value in result.iter_mut() {
            let speckle = self.exponential().clamp(0.3, 3.0);
            *value = (*value * speckle).clamp(-25.0, 0.0);
        }

        result
    }

    fn add_flood_patch(&mut self, image: &mut Grid) {
        let (height, width) = image.dim();
        let px = self.rng.gen_range(0..width - 20);
        let py = self.rng.gen_range(0..height - 15);
        let pw = self.rng.gen_range(5..20);
        let ph = self.rng.gen_range(3..15);

        for i in py..(py + ph).min(height) {
            for j in px..(px + pw).min(width) {
                image[[i, j]] = self.normal(-14.0, 2.0);
            }
        }
    }

    /// Normal sample with the given mean and standard deviation
    fn normal(&mut self, mean: f32, std_dev: f32) -> f32 {
        let z: f32 = self.rng.sample(StandardNormal);
        mean + std_dev * z
    }

    /// Exponential sample with unit scale
    fn exponential(&mut self) -> f32 {
        self.rng.sample(Exp1)
    }
}

fn scene_transform(params: &SyntheticSceneParams) -> FloodResult<GeoTransform> {
    let (min_x, min_y, max_x, max_y) = params.bounds;
    GeoTransform::from_bounds(min_x, min_y, max_x, max_y, params.width, params.height)
}

/// Meandering horizontal river band
pub fn river_mask(width: usize, height: usize) -> BinaryMask {
    let center = height as f64 / 2.0;
    let amplitude = height as f64 * 0.15;
    let half_width = (height as f64 * 0.04).max(1.0);
    let wavelength = (width as f64 / 1.5).max(1.0);

    Array2::from_shape_fn((height, width), |(i, j)| {
        let river_row = center + amplitude * (2.0 * std::f64::consts::PI * j as f64 / wavelength).sin();
        if (i as f64 + 0.5 - river_row).abs() <= half_width {
            POSITIVE
        } else {
            NEGATIVE
        }
    })
}

/// Binary dilation with a 3x3 (8-connected) structuring element
pub fn dilate(mask: &BinaryMask, iterations: usize) -> BinaryMask {
    let mut result = mask.mapv(|v| if v == POSITIVE { POSITIVE } else { NEGATIVE });
    let (height, width) = result.dim();

    for _ in 0..iterations {
        let mut grown = result.clone();
        for i in 0..height {
            for j in 0..width {
                if result[[i, j]] == POSITIVE {
                    continue;
                }
                let i0 = i.saturating_sub(1);
                let j0 = j.saturating_sub(1);
                let i1 = (i + 1).min(height - 1);
                let j1 = (j + 1).min(width - 1);
                let touches = (i0..=i1).any(|ni| (j0..=j1).any(|nj| result[[ni, nj]] == POSITIVE));
                if touches {
                    grown[[i, j]] = POSITIVE;
                }
            }
        }
        result = grown;
    }

    result
}
