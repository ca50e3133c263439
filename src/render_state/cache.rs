use std::rc::Rc;

use glam::{
  Mat4,
  Vec4,
};

use crate::error::HalaRendererError;
use crate::gfx::{
  HalaGfxDevice,
  HalaPipelineHandle,
  HalaShaderId,
  HalaTextureHandle,
};
use crate::scene::cpu::{
  HalaLight,
  HalaLightType,
  HalaMeshFlags,
  HalaSurfaceProperties,
};

/// A cached GPU state value. Unknown never compares equal to anything.
#[derive(Debug, Clone, PartialEq)]
enum HalaCached<T> {
  Unknown,
  Known(T),
}

impl<T: PartialEq> HalaCached<T> {
  /// Store the value.
  /// return: True if it differs from the cached one.
  fn update(&mut self, value: T) -> bool {
    if matches!(self, Self::Known(cached) if *cached == value) {
      return false;
    }
    *self = Self::Known(value);
    true
  }

  fn get(&self) -> Option<&T> {
    match self {
      Self::Known(value) => Some(value),
      Self::Unknown => None,
    }
  }
}

/// The material state of the current draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaMaterialState {
  pub color: [u8; 4],
  pub surface_props: HalaSurfaceProperties,
  pub texture_id: Option<u32>,
  pub instance_id: i32,
  pub index_offset: u32,
  pub object_id: i32,
  pub extra_surface_prop: f32,
}

impl HalaMaterialState {
  pub fn color_f32(&self) -> Vec4 {
    Vec4::new(
      self.color[0] as f32 / 255.0,
      self.color[1] as f32 / 255.0,
      self.color[2] as f32 / 255.0,
      self.color[3] as f32 / 255.0,
    )
  }
}

/// The alpha test function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HalaAlphaTestFunc(u8);
impl HalaAlphaTestFunc {
  pub const ALWAYS: Self = Self(0);
  pub const GREATER_EQUAL: Self = Self(1);
  pub const LESS: Self = Self(2);

  pub fn to_u8(&self) -> u8 {
    self.0
  }
}

/// The alpha test state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HalaAlphaTest {
  pub func: HalaAlphaTestFunc,
  pub reference: f32,
}

impl HalaAlphaTest {
  pub fn is_enabled(&self) -> bool {
    self.func != HalaAlphaTestFunc::ALWAYS
  }

  /// The accepted alpha range [low, high].
  pub fn reference_range(&self) -> (f32, f32) {
    match self.func {
      HalaAlphaTestFunc::GREATER_EQUAL => (self.reference, 1.0),
      HalaAlphaTestFunc::LESS => (0.0, self.reference),
      _ => (0.0, 1.0),
    }
  }
}

/// The fog state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HalaFogParams {
  pub enabled: bool,
  pub start: f32,
  pub end: f32,
  pub color: Vec4,
}

/// The lights affecting the current object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HalaLightSet {
  pub lights: Vec<HalaLight>,
}

/// The kinds of lights in the active light set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HalaLightingFlags(u32);
impl HalaLightingFlags {
  pub const NONE: Self = Self(0);
  pub const DIRECT: Self = Self(1);
  pub const POINT: Self = Self(2);
  pub const SPOT: Self = Self(4);
  pub const MASK: Self = Self(7);
  pub const AMBIENT: Self = Self(8);

  pub fn contains(&self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  pub fn bits(&self) -> u32 {
    self.0
  }

  /// Collect the flags of a light set.
  /// param lights: The light set.
  /// return: The flags.
  pub fn from_lights(lights: &HalaLightSet) -> Self {
    let bits = lights.lights.iter().fold(0, |bits, light| bits | match light.light_type {
      HalaLightType::AMBIENT => Self::AMBIENT.0,
      HalaLightType::DIRECTIONAL => Self::DIRECT.0,
      HalaLightType::POINT => Self::POINT.0,
      _ => Self::SPOT.0,
    });
    Self(bits)
  }
}

/// The uniform block bound to a shader by a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct HalaFlushedUniforms {
  pub alpha_ref_low: f32,
  pub alpha_ref_high: f32,
  pub object_id: u32,
  pub mesh_id: u32,

  pub fog_start: f32,
  pub fog_end: f32,
  pub fog_range: f32,
  pub fog_disable: f32,
  pub fog_color: Vec4,

  pub material: Option<HalaMaterialState>,
  pub textures: Vec<Option<HalaTextureHandle>>,
}

/// The counters of the state cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HalaRenderStatistics {
  pub issued_state_calls: u64,
  pub skipped_state_calls: u64,
  pub pipeline_binds: u64,
  pub flushes: u64,
  pub draws: u64,
}

/// The render state cache.
/// It mirrors what is bound on the GPU and only forwards changes.
pub struct HalaRenderStateCache {
  device: Rc<dyn HalaGfxDevice>,
  max_lights: usize,

  textures: Vec<HalaCached<Option<HalaTextureHandle>>>,
  material: HalaCached<HalaMaterialState>,
  alpha_blend: HalaCached<bool>,
  alpha_test: HalaCached<HalaAlphaTest>,
  lights: HalaCached<HalaLightSet>,
  lighting_flags: HalaLightingFlags,
  fog: HalaCached<HalaFogParams>,
  world_matrix: HalaCached<Mat4>,
  view_matrix: HalaCached<Mat4>,
  projection_matrix: HalaCached<Mat4>,
  pipeline: HalaCached<Option<HalaPipelineHandle>>,

  statistics: HalaRenderStatistics,
}

/// The implementation of the render state cache.
impl HalaRenderStateCache {

  /// Create a new render state cache with every field unknown.
  /// param device: The GPU device.
  /// param max_texture_slots: The number of texture slots.
  /// param max_lights: The maximum number of lights per object.
  /// return: The render state cache.
  pub fn new(device: Rc<dyn HalaGfxDevice>, max_texture_slots: u32, max_lights: u32) -> Self {
    Self {
      device,
      max_lights: max_lights as usize,
      textures: vec![HalaCached::Unknown; max_texture_slots as usize],
      material: HalaCached::Unknown,
      alpha_blend: HalaCached::Unknown,
      alpha_test: HalaCached::Unknown,
      lights: HalaCached::Unknown,
      lighting_flags: HalaLightingFlags::NONE,
      fog: HalaCached::Unknown,
      world_matrix: HalaCached::Unknown,
      view_matrix: HalaCached::Unknown,
      projection_matrix: HalaCached::Unknown,
      pipeline: HalaCached::Unknown,
      statistics: HalaRenderStatistics::default(),
    }
  }

  /// Forget everything believed bound, so the next call of every setter reaches the GPU.
  pub fn reset_cache(&mut self) {
    for texture in self.textures.iter_mut() {
      *texture = HalaCached::Unknown;
    }
    self.material = HalaCached::Unknown;
    self.alpha_blend = HalaCached::Unknown;
    self.alpha_test = HalaCached::Unknown;
    self.lights = HalaCached::Unknown;
    self.lighting_flags = HalaLightingFlags::NONE;
    self.fog = HalaCached::Unknown;
    self.world_matrix = HalaCached::Unknown;
    self.view_matrix = HalaCached::Unknown;
    self.projection_matrix = HalaCached::Unknown;
    self.pipeline = HalaCached::Unknown;
  }

  fn count(&mut self, changed: bool) -> bool {
    if changed {
      self.statistics.issued_state_calls += 1;
    } else {
      self.statistics.skipped_state_calls += 1;
    }
    changed
  }

  /// Bind a texture to a slot.
  /// param slot: The texture slot.
  /// param texture: The texture or None to unbind.
  /// return: The result.
  pub fn set_texture(&mut self, slot: u32, texture: Option<HalaTextureHandle>) -> Result<(), HalaRendererError> {
    let cached = self.textures.get_mut(slot as usize)
      .ok_or(HalaRendererError::new(&format!("The texture slot {} is out of range.", slot), None))?;
    let changed = cached.update(texture);
    if self.count(changed) {
      self.device.bind_texture(slot, texture);
    }

    Ok(())
  }

  /// Set the material of the following draws.
  /// param color: The tint color.
  /// param surface_props: The surface properties.
  /// param texture_id: The texture id.
  /// param instance_id: The instance id.
  /// param index_offset: The offset of the first index.
  /// param object_id: The object id.
  /// param extra_surface_prop: The extra surface scalar.
  #[allow(clippy::too_many_arguments)]
  pub fn set_material(
    &mut self,
    color: [u8; 4],
    surface_props: HalaSurfaceProperties,
    texture_id: Option<u32>,
    instance_id: i32,
    index_offset: u32,
    object_id: i32,
    extra_surface_prop: f32,
  ) {
    let material = HalaMaterialState {
      color,
      surface_props,
      texture_id,
      instance_id,
      index_offset,
      object_id,
      extra_surface_prop,
    };
    let changed = self.material.update(material);
    if self.count(changed) {
      self.device.set_material(&material);
    }
  }

  /// Set the material, tinting only if the mesh asks for color modulation.
  /// param flags: The mesh flags.
  /// param color: The tint color, replaced by opaque white without MODULATE.
  /// param surface_props: The surface properties.
  /// param texture_id: The texture id.
  /// param instance_id: The instance id.
  /// param index_offset: The offset of the first index.
  /// param object_id: The object id.
  /// param extra_surface_prop: The extra surface scalar.
  #[allow(clippy::too_many_arguments)]
  pub fn set_material_with_flags(
    &mut self,
    flags: HalaMeshFlags,
    color: [u8; 4],
    surface_props: HalaSurfaceProperties,
    texture_id: Option<u32>,
    instance_id: i32,
    index_offset: u32,
    object_id: i32,
    extra_surface_prop: f32,
  ) {
    let color = if flags.contains(HalaMeshFlags::MODULATE) {
      color
    } else {
      [255, 255, 255, 255]
    };
    self.set_material(color, surface_props, texture_id, instance_id, index_offset, object_id, extra_surface_prop);
  }

  pub fn set_alpha_blend(&mut self, enable: bool) {
    let changed = self.alpha_blend.update(enable);
    if self.count(changed) {
      self.device.set_alpha_blend(enable);
    }
  }

  pub fn set_alpha_test(&mut self, alpha_test: HalaAlphaTest) {
    let changed = self.alpha_test.update(alpha_test);
    if self.count(changed) {
      self.device.set_alpha_test(&alpha_test);
    }
  }

  /// Set the alpha test function, keeping the cached reference value.
  pub fn set_alpha_test_func(&mut self, func: HalaAlphaTestFunc) {
    let reference = self.alpha_test.get().map(|alpha_test| alpha_test.reference).unwrap_or(0.0);
    self.set_alpha_test(HalaAlphaTest { func, reference });
  }

  /// Set the alpha test reference, keeping the cached function.
  pub fn set_alpha_ref(&mut self, reference: f32) {
    let func = self.alpha_test.get().map(|alpha_test| alpha_test.func).unwrap_or_default();
    self.set_alpha_test(HalaAlphaTest { func, reference });
  }

  /// Set the lights of the current object.
  /// param lights: The lights, clipped to the maximum light count.
  /// return: The kinds of lights now active.
  pub fn set_lights(&mut self, lights: &HalaLightSet) -> HalaLightingFlags {
    let lights = if lights.lights.len() > self.max_lights {
      log::warn!(
        "The light count {} exceeds the maximum light count {}. Only the first {} lights will be used.",
        lights.lights.len(), self.max_lights, self.max_lights
      );
      HalaLightSet { lights: lights.lights[..self.max_lights].to_vec() }
    } else {
      lights.clone()
    };

    let flags = HalaLightingFlags::from_lights(&lights);
    let changed = self.lights.update(lights);
    if self.count(changed) {
      if let Some(lights) = self.lights.get() {
        self.device.set_lights(lights);
      }
    }
    self.lighting_flags = flags;

    flags
  }

  pub fn set_fog(&mut self, fog: HalaFogParams) {
    let changed = self.fog.update(fog);
    if self.count(changed) {
      self.device.set_fog(&fog);
    }
  }

  pub fn set_world_matrix(&mut self, matrix: &Mat4) {
    let changed = self.world_matrix.update(*matrix);
    if self.count(changed) {
      self.device.set_world_matrix(matrix);
    }
  }

  pub fn set_view_matrix(&mut self, matrix: &Mat4) {
    let changed = self.view_matrix.update(*matrix);
    if self.count(changed) {
      self.device.set_view_matrix(matrix);
    }
  }

  pub fn set_projection_matrix(&mut self, matrix: &Mat4) {
    let changed = self.projection_matrix.update(*matrix);
    if self.count(changed) {
      self.device.set_projection_matrix(matrix);
    }
  }

  /// Bind a pipeline unless it is already the bound one.
  /// param pipeline: The pipeline.
  pub fn compare_and_bind(&mut self, pipeline: HalaPipelineHandle) {
    let changed = self.pipeline.update(Some(pipeline));
    if self.count(changed) {
      self.device.bind_pipeline(pipeline);
      self.statistics.pipeline_binds += 1;
    }
  }

  /// Bind a pipeline, ending the previously bound one first.
  /// param pipeline: The pipeline.
  pub fn set_pipeline(&mut self, pipeline: HalaPipelineHandle) {
    if self.current_pipeline() != Some(pipeline) {
      self.end_last_pipeline();
    }
    self.compare_and_bind(pipeline);
  }

  /// Finish the bound pipeline at the end of a render pass.
  pub fn end_last_pipeline(&mut self) {
    if let Some(Some(pipeline)) = self.pipeline.get() {
      self.device.end_pipeline(*pipeline);
    }
    self.pipeline = HalaCached::Known(None);
  }

  /// Compute the alpha reference and fog block of the current state.
  /// param object_id: The object id.
  /// param mesh_id: The mesh id.
  /// return: The uniforms.
  pub fn flush_fog(&self, object_id: u32, mesh_id: u32) -> HalaFlushedUniforms {
    let (alpha_ref_low, alpha_ref_high) = self.alpha_test.get()
      .map(|alpha_test| alpha_test.reference_range())
      .unwrap_or((0.0, 1.0));
    let fog = self.fog.get().copied().unwrap_or_default();
    let fog_range = if fog.start != fog.end {
      1.0 / (fog.start - fog.end)
    } else {
      0.0
    };

    HalaFlushedUniforms {
      alpha_ref_low,
      alpha_ref_high,
      object_id,
      mesh_id,
      fog_start: fog.start,
      fog_end: fog.end,
      fog_range,
      fog_disable: if fog.enabled { 0.0 } else { 1.0 },
      fog_color: fog.color,
      material: self.material.get().copied(),
      textures: self.textures.iter().map(|texture| texture.get().copied().flatten()).collect(),
    }
  }

  /// Bind the cached state to the shader uniforms of the next draw.
  /// Must run once per sub-mesh, after the state setters and before the draw.
  /// param shader: The shader.
  /// param object_index: The object index.
  /// param mesh_id: The mesh id.
  pub fn flush_cache(&mut self, shader: HalaShaderId, object_index: u32, mesh_id: u32) {
    let uniforms = self.flush_fog(object_index, mesh_id);
    self.device.flush_uniforms(shader, &uniforms);
    self.statistics.flushes += 1;
  }

  pub(crate) fn record_draw(&mut self) {
    self.statistics.draws += 1;
  }

  pub fn texture(&self, slot: u32) -> Option<HalaTextureHandle> {
    self.textures.get(slot as usize).and_then(|texture| texture.get().copied().flatten())
  }

  pub fn material(&self) -> Option<&HalaMaterialState> {
    self.material.get()
  }

  pub fn alpha_blend(&self) -> bool {
    self.alpha_blend.get().copied().unwrap_or(false)
  }

  /// Whether fragments are currently alpha tested.
  pub fn alpha_test_enabled(&self) -> bool {
    self.alpha_test.get().map(|alpha_test| alpha_test.is_enabled()).unwrap_or(false)
  }

  pub fn lighting_flags(&self) -> HalaLightingFlags {
    self.lighting_flags
  }

  pub fn current_pipeline(&self) -> Option<HalaPipelineHandle> {
    self.pipeline.get().copied().flatten()
  }

  pub fn statistics(&self) -> &HalaRenderStatistics {
    &self.statistics
  }

  pub fn reset_statistics(&mut self) {
    self.statistics = HalaRenderStatistics::default();
  }
}
