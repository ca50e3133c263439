use std::rc::Rc;
use std::fmt;

use serde::{Serialize, Deserialize, Serializer, Deserializer};
use serde::de::{self, Unexpected, Visitor};
use thiserror::Error;

use crate::error::HalaRendererError;
use crate::scene::cpu::HalaMaterial;
use crate::render_state::{
  HalaAlphaTest,
  HalaFlushedUniforms,
  HalaFogParams,
  HalaLightSet,
  HalaMaterialState,
};

/// The error returned by the GPU collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HalaGfxError {
  #[error("Out of GPU memory while allocating {0} bytes.")]
  OutOfMemory(u64),
  #[error("Invalid GPU handle {0}.")]
  InvalidHandle(u64),
  #[error("GPU backend error: {0}")]
  Backend(String),
}

impl HalaGfxError {
  pub fn is_out_of_memory(&self) -> bool {
    matches!(self, Self::OutOfMemory(_))
  }
}

/// Handle to a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalaBufferHandle(pub u64);

/// Handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalaTextureHandle(pub u64);

/// Handle to a descriptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalaDescriptorSetHandle(pub u64);

/// Handle to a graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalaPipelineHandle(pub u64);

/// Handle to a bottom level acceleration structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalaAccelerationStructureHandle(pub u64);

/// Identity of a compiled shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HalaShaderId(pub u32);

/// The buffer usage flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HalaBufferUsageFlags(u32);
impl HalaBufferUsageFlags {
  pub const VERTEX_BUFFER: Self = Self(0x1);
  pub const INDEX_BUFFER: Self = Self(0x2);
  pub const TRANSFER_DST: Self = Self(0x4);
  pub const ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY: Self = Self(0x8);

  pub fn contains(&self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  pub fn bits(&self) -> u32 {
    self.0
  }
}

impl std::ops::BitOr for HalaBufferUsageFlags {
  type Output = Self;
  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

impl std::ops::BitOrAssign for HalaBufferUsageFlags {
  fn bitor_assign(&mut self, rhs: Self) {
    self.0 |= rhs.0;
  }
}

/// The primitive topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HalaPrimitiveTopology(u8);
impl HalaPrimitiveTopology {
  pub const POINT_LIST: Self = Self(0);
  pub const LINE_LIST: Self = Self(1);
  pub const LINE_STRIP: Self = Self(2);
  pub const TRIANGLE_LIST: Self = Self(3);
  pub const TRIANGLE_STRIP: Self = Self(4);
  pub const TRIANGLE_FAN: Self = Self(5);

  pub fn to_u8(&self) -> u8 {
    self.0
  }
}

impl Serialize for HalaPrimitiveTopology {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let s = match *self {
      Self::POINT_LIST => "point_list",
      Self::LINE_LIST => "line_list",
      Self::LINE_STRIP => "line_strip",
      Self::TRIANGLE_LIST => "triangle_list",
      Self::TRIANGLE_STRIP => "triangle_strip",
      Self::TRIANGLE_FAN => "triangle_fan",
      _ => "default",
    };

    serializer.serialize_str(s)
  }
}

impl<'de> Deserialize<'de> for HalaPrimitiveTopology {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    struct HalaPrimitiveTopologyVisitor;

    impl<'de> Visitor<'de> for HalaPrimitiveTopologyVisitor {
      type Value = HalaPrimitiveTopology;

      fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string of primitive topology")
      }

      fn visit_str<E>(self, value: &str) -> Result<HalaPrimitiveTopology, E>
      where
        E: de::Error,
      {
        match value {
          "POINT_LIST" | "point_list" => Ok(HalaPrimitiveTopology::POINT_LIST),
          "LINE_LIST" | "line_list" => Ok(HalaPrimitiveTopology::LINE_LIST),
          "LINE_STRIP" | "line_strip" => Ok(HalaPrimitiveTopology::LINE_STRIP),
          "TRIANGLE_LIST" | "triangle_list" => Ok(HalaPrimitiveTopology::TRIANGLE_LIST),
          "TRIANGLE_STRIP" | "triangle_strip" => Ok(HalaPrimitiveTopology::TRIANGLE_STRIP),
          "TRIANGLE_FAN" | "triangle_fan" => Ok(HalaPrimitiveTopology::TRIANGLE_FAN),
          "default" => Ok(HalaPrimitiveTopology::default()),
          _ => Err(de::Error::invalid_value(Unexpected::Str(value), &"a primitive topology")),
        }
      }
    }

    deserializer.deserialize_str(HalaPrimitiveTopologyVisitor)
  }
}

/// The fixed-function blend and depth state baked into a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HalaBlendDepthState {
  #[serde(default = "default_as_true")]
  pub depth_test: bool,
  #[serde(default = "default_as_true")]
  pub depth_write: bool,
  #[serde(default)]
  pub blend: bool,
  /// Fragments failing the alpha test keep their color but skip the depth write.
  #[serde(default)]
  pub alpha_test_emulation: bool,
}

fn default_as_true() -> bool {
  true
}

impl Default for HalaBlendDepthState {
  fn default() -> Self {
    Self {
      depth_test: true,
      depth_write: true,
      blend: false,
      alpha_test_emulation: false,
    }
  }
}

/// The pipeline description.
/// The vertex input layout is part of the shader program.
#[derive(Debug, Clone, PartialEq)]
pub struct HalaPipelineDesc {
  pub primitive_topology: HalaPrimitiveTopology,
  pub shader: HalaShaderId,
  pub blend_depth: HalaBlendDepthState,
  pub debug_name: String,
}

/// One indexed draw.
#[derive(Debug, Clone, PartialEq)]
pub struct HalaIndexedDraw {
  pub pipeline: HalaPipelineHandle,
  pub vertex_buffer: HalaBufferHandle,
  pub index_buffer: HalaBufferHandle,
  pub index_count: u32,
  pub first_index: u32,
  pub descriptor_sets: Vec<HalaDescriptorSetHandle>,
}

/// One sub-mesh range handed to the acceleration structure builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalaSubMeshRange {
  pub index_count: u32,
  pub first_index: u32,
  pub vertex_count: u32,
}

/// The request to build a bottom level acceleration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct HalaAccelerationStructureBuildDesc {
  pub vertex_buffer: HalaBufferHandle,
  pub index_buffer: HalaBufferHandle,
  pub vertex_stride: u32,
  pub sub_meshes: Vec<HalaSubMeshRange>,
  pub debug_name: String,
}

/// The GPU device seen by the instancing and state caching layer.
/// Every call on it is a real GPU call.
pub trait HalaGfxDevice {
  fn create_buffer(&self, usage: HalaBufferUsageFlags, data: &[u8], debug_name: &str) -> Result<HalaBufferHandle, HalaGfxError>;
  fn update_buffer(&self, buffer: HalaBufferHandle, offset: u64, data: &[u8]) -> Result<(), HalaGfxError>;
  fn destroy_buffer(&self, buffer: HalaBufferHandle);

  fn create_pipeline(&self, desc: &HalaPipelineDesc) -> Result<HalaPipelineHandle, HalaGfxError>;
  fn bind_pipeline(&self, pipeline: HalaPipelineHandle);
  fn end_pipeline(&self, pipeline: HalaPipelineHandle);

  fn bind_texture(&self, slot: u32, texture: Option<HalaTextureHandle>);
  fn set_material(&self, material: &HalaMaterialState);
  fn set_alpha_blend(&self, enable: bool);
  fn set_alpha_test(&self, alpha_test: &HalaAlphaTest);
  fn set_lights(&self, lights: &HalaLightSet);
  fn set_fog(&self, fog: &HalaFogParams);
  fn set_world_matrix(&self, matrix: &glam::Mat4);
  fn set_view_matrix(&self, matrix: &glam::Mat4);
  fn set_projection_matrix(&self, matrix: &glam::Mat4);

  fn flush_uniforms(&self, shader: HalaShaderId, uniforms: &HalaFlushedUniforms);
  fn draw_indexed(&self, draw: &HalaIndexedDraw);
}

/// The texture and descriptor set lookup.
pub trait HalaTextureProvider {
  fn get_texture(&self, texture_id: u32) -> Option<HalaTextureHandle>;
  fn get_texture_descriptor_set(&self, texture_id: u32) -> Option<HalaDescriptorSetHandle>;
  fn get_default_descriptor_set(&self) -> HalaDescriptorSetHandle;

  /// Get the descriptor set of the material texture, or the default one.
  /// param material: The material.
  /// return: The descriptor set.
  fn get_material_descriptor_set(&self, material: &HalaMaterial) -> HalaDescriptorSetHandle {
    material.texture_id
      .and_then(|id| self.get_texture_descriptor_set(id))
      .unwrap_or_else(|| self.get_default_descriptor_set())
  }
}

/// The acceleration structure builder.
/// Builds are queued by the builder and never waited on. The builder must keep the
/// referenced buffers alive until its queued build completes.
pub trait HalaAccelerationStructureBuilder {
  fn build(&self, desc: &HalaAccelerationStructureBuildDesc) -> Result<HalaAccelerationStructureHandle, HalaGfxError>;
}

/// A GPU buffer, destroyed on drop.
pub struct HalaBuffer {
  device: Rc<dyn HalaGfxDevice>,
  pub handle: HalaBufferHandle,
  pub size: u64,
  pub usage: HalaBufferUsageFlags,
  debug_name: String,
}

/// The Drop implementation of the buffer.
impl Drop for HalaBuffer {
  fn drop(&mut self) {
    self.device.destroy_buffer(self.handle);
    log::debug!("A HalaBuffer \"{}\" is dropped.", self.debug_name);
  }
}

/// The implementation of the buffer.
impl HalaBuffer {

  /// Create a new buffer with initial data.
  /// param device: The GPU device.
  /// param usage: The buffer usage.
  /// param data: The initial content.
  /// param debug_name: The debug name.
  /// return: The buffer.
  pub fn new(
    device: Rc<dyn HalaGfxDevice>,
    usage: HalaBufferUsageFlags,
    data: &[u8],
    debug_name: &str,
  ) -> Result<Self, HalaRendererError> {
    let handle = device.create_buffer(usage, data, debug_name)?;

    log::debug!("A HalaBuffer \"{}\"[{} bytes] is created.", debug_name, data.len());
    Ok(Self {
      device,
      handle,
      size: data.len() as u64,
      usage,
      debug_name: debug_name.to_string(),
    })
  }

  /// Write a sub-range of the buffer.
  /// param offset: The byte offset.
  /// param data: The data.
  /// return: The result.
  pub fn update(&self, offset: u64, data: &[u8]) -> Result<(), HalaRendererError> {
    if offset + data.len() as u64 > self.size {
      return Err(HalaRendererError::new(
        &format!(
          "Update [{}, {}) is out of the buffer \"{}\" of {} bytes.",
          offset, offset + data.len() as u64, self.debug_name, self.size),
        None,
      ));
    }
    self.device.update_buffer(self.handle, offset, data)?;

    Ok(())
  }

  pub fn debug_name(&self) -> &str {
    &self.debug_name
  }
}
