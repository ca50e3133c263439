use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::HalaRendererError;
use crate::gfx::{
  HalaBlendDepthState,
  HalaShaderId,
};

fn default_max_texture_slots() -> u32 {
  8
}

fn default_max_lights() -> u32 {
  32
}

fn default_as_true() -> bool {
  true
}

/// The shaders used by the default draw paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalaDefaultShaders {
  pub direct: HalaShaderId,
  pub alpha_test_emulation: HalaShaderId,
}

impl Default for HalaDefaultShaders {
  fn default() -> Self {
    Self {
      direct: HalaShaderId(0),
      alpha_test_emulation: HalaShaderId(1),
    }
  }
}

/// The configuration of the retained renderer layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalaRetainedConfig {
  #[serde(default = "default_max_texture_slots")]
  pub max_texture_slots: u32,
  #[serde(default = "default_max_lights")]
  pub max_lights: u32,
  /// Lay out a color stream even for meshes without vertex colors.
  #[serde(default)]
  pub force_prelight: bool,
  #[serde(default = "default_as_true")]
  pub build_acceleration_structures: bool,
  #[serde(default)]
  pub default_shaders: HalaDefaultShaders,
  #[serde(default)]
  pub direct_state: HalaBlendDepthState,
  #[serde(default = "default_alpha_test_emulation_state")]
  pub alpha_test_emulation_state: HalaBlendDepthState,
}

fn default_alpha_test_emulation_state() -> HalaBlendDepthState {
  HalaBlendDepthState {
    alpha_test_emulation: true,
    ..Default::default()
  }
}

impl Default for HalaRetainedConfig {
  fn default() -> Self {
    Self {
      max_texture_slots: default_max_texture_slots(),
      max_lights: default_max_lights(),
      force_prelight: false,
      build_acceleration_structures: true,
      default_shaders: HalaDefaultShaders::default(),
      direct_state: HalaBlendDepthState::default(),
      alpha_test_emulation_state: default_alpha_test_emulation_state(),
    }
  }
}

/// The implementation of the configuration.
impl HalaRetainedConfig {

  /// Load the configuration from a JSON file.
  /// param path: The path of the file.
  /// return: The configuration.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HalaRendererError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
      .map_err(|err| HalaRendererError::new(&format!("Read configuration file \"{:?}\" failed.", path), Some(Box::new(err))))?;
    let config = Self::from_json_str(&content)?;

    log::debug!("Load configuration from file: {:?}", path);
    Ok(config)
  }

  /// Parse the configuration from a JSON string.
  /// param content: The JSON string.
  /// return: The configuration.
  pub fn from_json_str(content: &str) -> Result<Self, HalaRendererError> {
    let config: Self = serde_json::from_str(content)?;
    if config.max_texture_slots == 0 {
      return Err(HalaRendererError::new("The max texture slots must be at least 1.", None));
    }
    if config.default_shaders.direct == config.default_shaders.alpha_test_emulation {
      return Err(HalaRendererError::new(
        &format!("The direct and alpha test emulation paths share the shader {}.", config.default_shaders.direct.0),
        None,
      ));
    }

    Ok(config)
  }
}
