//! Engine configuration.
//!
//! Configuration is plain serde data. Every field has a default, so a JSON
//! file only needs the keys it wants to change:
//!
//! ```
//! use nova_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{
//!     "window": { "width": 800 },
//!     "graphics": { "ambient_occlusion": { "samples": 16 } }
//! }"#).unwrap();
//!
//! assert_eq!(config.window.width, 800);
//! assert_eq!(config.window.height, 720);
//! assert_eq!(config.graphics.ambient_occlusion.samples, 16);
//! assert_eq!(config.graphics.shadows.split_fractions, vec![0.1, 0.3, 0.6, 1.0]);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Upper bound on hemisphere kernel samples (size of the GPU sample array).
pub const MAX_AO_SAMPLES: u32 = 64;

/// Upper bound on shadow cascades (layers of the shadow map array).
pub const MAX_CASCADES: usize = 4;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub graphics: GraphicsSettings,
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        tracing::info!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn to_json_string(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(EngineError::Argument(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        self.graphics.validate()
    }
}

// ---------------------------------------------------------------------------
// WindowConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "nova".to_owned(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

// ---------------------------------------------------------------------------
// GraphicsSettings
// ---------------------------------------------------------------------------

/// Tunables for the render pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsSettings {
    pub ambient_occlusion: AmbientOcclusionSettings,
    pub shadows: ShadowSettings,
    pub fog: FogSettings,
    /// Multiplier applied before tone mapping.
    pub exposure: f32,
    /// Linear color written where no geometry was drawn.
    pub clear_color: [f32; 3],
    /// Constant light added to every lit surface, scaled by AO.
    pub ambient_light: f32,
}

impl Default for GraphicsSettings {
    fn default() -> Self {
        Self {
            ambient_occlusion: AmbientOcclusionSettings::default(),
            shadows: ShadowSettings::default(),
            fog: FogSettings::default(),
            exposure: 1.0,
            clear_color: [0.3, 0.5, 0.6],
            ambient_light: 0.15,
        }
    }
}

impl GraphicsSettings {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.ambient_occlusion.validate()?;
        self.shadows.validate()?;
        if !(self.exposure > 0.0) {
            return Err(EngineError::Argument(format!(
                "exposure must be positive, got {}",
                self.exposure
            )));
        }
        Ok(())
    }
}

/// Screen-space ambient occlusion parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientOcclusionSettings {
    /// Hemisphere radius in world units.
    pub radius: f32,
    /// Exponent applied to the final visibility term.
    pub power: f32,
    /// Kernel size, at most [`MAX_AO_SAMPLES`].
    pub samples: u32,
    /// Depth offset that suppresses self-occlusion.
    pub bias: f32,
    /// Side length of the square rotation-noise tile.
    pub noise_size: u32,
    /// Run the separable blur over the raw occlusion term.
    pub blur: bool,
    /// Seed for kernel and noise generation.
    pub seed: u64,
}

impl Default for AmbientOcclusionSettings {
    fn default() -> Self {
        Self {
            radius: 0.3,
            power: 1.0,
            samples: 64,
            bias: 0.02,
            noise_size: 4,
            blur: true,
            seed: 0x5eed,
        }
    }
}

impl AmbientOcclusionSettings {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.samples == 0 || self.samples > MAX_AO_SAMPLES {
            return Err(EngineError::Argument(format!(
                "ambient occlusion samples must be in 1..={MAX_AO_SAMPLES}, got {}",
                self.samples
            )));
        }
        if self.noise_size == 0 {
            return Err(EngineError::Argument(
                "ambient occlusion noise size must be non-zero".to_owned(),
            ));
        }
        if !(self.radius > 0.0) {
            return Err(EngineError::Argument(format!(
                "ambient occlusion radius must be positive, got {}",
                self.radius
            )));
        }
        Ok(())
    }
}

/// Cascaded shadow map parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Number of cascades, at most [`MAX_CASCADES`].
    pub cascade_count: usize,
    /// Far bound of each cascade as a fraction of the camera far plane.
    pub split_fractions: Vec<f32>,
    /// Width and height of each shadow map layer in texels.
    pub resolution: u32,
    /// Distance from the cascade center to the light camera.
    pub light_distance: f32,
    /// Far plane of the light camera.
    pub ortho_far: f32,
    /// Constant depth bias for the shadow pass.
    pub depth_bias: i32,
    /// Slope-scaled depth bias for the shadow pass.
    pub slope_bias: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            cascade_count: 4,
            split_fractions: vec![0.1, 0.3, 0.6, 1.0],
            resolution: 2048,
            light_distance: 100.0,
            ortho_far: 200.0,
            depth_bias: 2,
            slope_bias: 2.0,
        }
    }
}

impl ShadowSettings {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.cascade_count == 0 || self.cascade_count > MAX_CASCADES {
            return Err(EngineError::Argument(format!(
                "cascade count must be in 1..={MAX_CASCADES}, got {}",
                self.cascade_count
            )));
        }
        if self.split_fractions.len() != self.cascade_count {
            return Err(EngineError::Argument(format!(
                "expected {} split fractions, got {}",
                self.cascade_count,
                self.split_fractions.len()
            )));
        }
        let increasing = self
            .split_fractions
            .windows(2)
            .all(|pair| pair[0] < pair[1]);
        let in_range = self
            .split_fractions
            .iter()
            .all(|&f| f > 0.0 && f <= 1.0);
        if !increasing || !in_range {
            return Err(EngineError::Argument(format!(
                "split fractions must increase within (0, 1], got {:?}",
                self.split_fractions
            )));
        }
        if self.resolution == 0 {
            return Err(EngineError::Argument(
                "shadow map resolution must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Distance fog applied during tone mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogSettings {
    pub enabled: bool,
    pub color: [f32; 3],
    /// Distance at which fog is fully opaque.
    pub depth: f32,
    /// Falloff exponent.
    pub power: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            color: [0.3, 0.5, 0.6],
            depth: 100.0,
            power: 3.0,
        }
    }
}

impl FogSettings {
    /// Fog blend factor at `distance` from the camera.
    pub fn factor(&self, distance: f32) -> f32 {
        if !self.enabled || self.depth <= 0.0 {
            return 0.0;
        }
        (distance / self.depth).max(0.0).powf(self.power).min(1.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_document_is_default() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let mut config = EngineConfig::default();
        config.graphics.ambient_occlusion.radius = 0.75;
        config.graphics.fog.enabled = false;
        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn split_fraction_count_must_match_cascades() {
        let err = EngineConfig::from_json_str(
            r#"{ "graphics": { "shadows": { "cascade_count": 3 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Argument(_)));
    }

    #[test]
    fn split_fractions_must_increase() {
        let mut shadows = ShadowSettings::default();
        shadows.split_fractions = vec![0.1, 0.6, 0.3, 1.0];
        assert!(shadows.validate().is_err());
    }

    #[test]
    fn too_many_ao_samples_rejected() {
        let mut ao = AmbientOcclusionSettings::default();
        ao.samples = MAX_AO_SAMPLES + 1;
        assert!(ao.validate().is_err());
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn fog_factor_saturates() {
        let fog = FogSettings::default();
        assert_eq!(fog.factor(0.0), 0.0);
        assert!((fog.factor(50.0) - 0.125).abs() < 1e-6);
        assert_eq!(fog.factor(500.0), 1.0);
        let off = FogSettings {
            enabled: false,
            ..FogSettings::default()
        };
        assert_eq!(off.factor(500.0), 0.0);
    }
}
