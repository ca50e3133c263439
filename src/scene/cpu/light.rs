use glam::Vec3;

/// The type of the light.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalaLightType(u8);
impl HalaLightType {
  pub const AMBIENT: Self = Self(0);
  pub const DIRECTIONAL: Self = Self(1);
  pub const POINT: Self = Self(2);
  pub const SPOT: Self = Self(3);
  pub const SOFT_SPOT: Self = Self(4);

  pub fn to_u8(&self) -> u8 {
    self.0
  }
}

/// A light source affecting an object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalaLight {
  pub light_type: HalaLightType,
  pub color: Vec3,
  // Unused for ambient and directional lights.
  pub position: Vec3,
  // Unused for ambient and point lights.
  pub direction: Vec3,
  pub radius: f32,
  // Cosine of the cone angle, spot lights only.
  pub cone_cos: f32,
}

/// The implementation of the light.
impl HalaLight {

  pub fn ambient(color: Vec3) -> Self {
    Self {
      light_type: HalaLightType::AMBIENT,
      color,
      position: Vec3::ZERO,
      direction: Vec3::ZERO,
      radius: 0.0,
      cone_cos: 0.0,
    }
  }

  pub fn directional(color: Vec3, direction: Vec3) -> Self {
    Self {
      light_type: HalaLightType::DIRECTIONAL,
      direction,
      ..Self::ambient(color)
    }
  }

  pub fn point(color: Vec3, position: Vec3, radius: f32) -> Self {
    Self {
      light_type: HalaLightType::POINT,
      position,
      radius,
      ..Self::ambient(color)
    }
  }

  pub fn spot(color: Vec3, position: Vec3, direction: Vec3, radius: f32, cone_cos: f32) -> Self {
    Self {
      light_type: HalaLightType::SPOT,
      position,
      direction,
      radius,
      cone_cos,
      ..Self::ambient(color)
    }
  }
}
