//! Collision grid settings
//!
//! Loaded from JSON; any field left out falls back to its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{BUCKET_PIXEL_SIZE, DEFAULT_SEED, MAX_RESOLUTION_PASSES, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Well-formed but unusable values
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Grid dimensions and resolution tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Buckets along x and y
    pub grid_size: [usize; 2],
    /// Bucket side length in pixels
    pub bucket_pixel_size: f32,
    /// Resolution sub-passes per tick
    pub max_resolution_passes: usize,
    /// Seed for resolution ordering
    pub seed: u64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self::for_screen(SCREEN_WIDTH, SCREEN_HEIGHT, BUCKET_PIXEL_SIZE)
    }
}

impl GridSettings {
    /// Enough buckets to cover a `width` x `height` screen
    pub fn for_screen(width: f32, height: f32, bucket_pixel_size: f32) -> Self {
        let buckets = |extent: f32| ((extent / bucket_pixel_size).ceil() as usize).max(1);
        Self {
            grid_size: [buckets(width), buckets(height)],
            bucket_pixel_size,
            max_resolution_passes: MAX_RESOLUTION_PASSES,
            seed: DEFAULT_SEED,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and validate a JSON settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded grid settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size.contains(&0) {
            return Err(ConfigError::Invalid(format!(
                "grid_size must be at least 1x1, got {}x{}",
                self.grid_size[0], self.grid_size[1]
            )));
        }
        if !(self.bucket_pixel_size.is_finite() && self.bucket_pixel_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "bucket_pixel_size must be positive, got {}",
                self.bucket_pixel_size
            )));
        }
        if !(1..=MAX_RESOLUTION_PASSES).contains(&self.max_resolution_passes) {
            return Err(ConfigError::Invalid(format!(
                "max_resolution_passes must be between 1 and {}, got {}",
                MAX_RESOLUTION_PASSES, self.max_resolution_passes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_covers_screen() {
        let settings = GridSettings::default();
        assert_eq!(settings.grid_size, [20, 12]);
        assert_eq!(settings.bucket_pixel_size, 64.0);
        assert_eq!(settings.max_resolution_passes, 15);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_for_screen_rounds_up() {
        let settings = GridSettings::for_screen(100.0, 10.0, 64.0);
        assert_eq!(settings.grid_size, [2, 1]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = GridSettings::from_json(r#"{ "seed": 7, "max_resolution_passes": 3 }"#).unwrap();
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.max_resolution_passes, 3);
        assert_eq!(settings.grid_size, GridSettings::default().grid_size);
    }

    #[test]
    fn test_json_round_trip() {
        let settings = GridSettings::for_screen(640.0, 480.0, 32.0);
        let json = settings.to_json().unwrap();
        assert_eq!(GridSettings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            GridSettings::from_json(r#"{ "grid_size": [0, 4] }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GridSettings::from_json(r#"{ "bucket_pixel_size": -1.0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(GridSettings::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_rejects_pass_cap_outside_range() {
        for passes in [0, 16, 1000] {
            let json = format!(r#"{{ "max_resolution_passes": {passes} }}"#);
            assert!(matches!(GridSettings::from_json(&json), Err(ConfigError::Invalid(_))), "{passes}");
        }
        assert!(GridSettings::from_json(r#"{ "max_resolution_passes": 1 }"#).is_ok());
        assert!(GridSettings::from_json(r#"{ "max_resolution_passes": 15 }"#).is_ok());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = GridSettings::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
        assert!(err.to_string().starts_with("IO error"));
    }

    #[test]
    fn test_grid_from_settings() {
        let settings = GridSettings {
            grid_size: [4, 3],
            max_resolution_passes: 2,
            ..GridSettings::default()
        };
        let grid = crate::CollisionGrid::with_settings(&settings).unwrap();
        assert_eq!(grid.grid_size(), (4, 3));
        assert_eq!(grid.max_resolution_passes(), 2);

        let bad = GridSettings {
            bucket_pixel_size: 0.0,
            ..GridSettings::default()
        };
        assert!(crate::CollisionGrid::with_settings(&bad).is_err());
    }
}
