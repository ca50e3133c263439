/// The surface lighting coefficients of a material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaSurfaceProperties {
  pub ambient: f32,
  pub specular: f32,
  pub diffuse: f32,
}

/// The default implementation of the surface properties.
impl Default for HalaSurfaceProperties {
  fn default() -> Self {
    Self {
      ambient: 1.0,
      specular: 1.0,
      diffuse: 1.0,
    }
  }
}

/// A material for sub-meshes.
#[derive(Debug, Clone, PartialEq)]
pub struct HalaMaterial {
  pub name: String,
  /// RGBA8 tint color.
  pub color: [u8; 4],
  pub surface_props: HalaSurfaceProperties,
  pub texture_id: Option<u32>,
}

/// The default implementation of the material.
impl Default for HalaMaterial {
  fn default() -> Self {
    Self {
      name: String::new(),
      color: [255, 255, 255, 255],
      surface_props: HalaSurfaceProperties::default(),
      texture_id: None,
    }
  }
}

/// The implementation of the material.
impl HalaMaterial {

  /// Create a new material.
  /// param name: The name of the material.
  /// param color: The tint color.
  /// param texture_id: The texture id.
  /// return: The material.
  pub fn new(name: &str, color: [u8; 4], texture_id: Option<u32>) -> Self {
    Self {
      name: name.to_string(),
      color,
      texture_id,
      ..Default::default()
    }
  }

  /// Check whether the tint color is translucent.
  /// return: True if the alpha is below 255.
  pub fn is_translucent(&self) -> bool {
    self.color[3] != 255
  }
}
