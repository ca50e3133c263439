use glam::Mat4;

use crate::context::HalaRenderContext;
use crate::draw::HalaDrawDispatcher;
use crate::error::HalaRendererError;
use crate::gfx::HalaDescriptorSetHandle;
use crate::instancing::{
  HalaGeometryInstancer,
  HalaReinstanceAction,
  HalaReinstanceStateMachine,
};
use crate::render_state::HalaLightSet;
use crate::scene::cpu::{
  HalaMesh,
  HalaMeshFlags,
};
use crate::scene::gpu::HalaGpuInstance;

/// The per object data of one render call.
#[derive(Debug, Clone, Default)]
pub struct HalaDrawObject {
  pub world_matrix: Mat4,
  pub lights: HalaLightSet,
  pub object_id: u32,
  pub instance_id: i32,
  pub extra_surface_prop: f32,
  pub descriptor_sets: Vec<HalaDescriptorSetHandle>,
}

/// The hooks of an object pipeline.
/// Every hook has a default, so a custom pipeline overrides only what it changes.
pub trait HalaObjPipelineHooks {

  /// Bring the GPU instance of the mesh up to date.
  fn instance(&self, ctx: &mut HalaRenderContext, mesh: &mut HalaMesh) -> Result<HalaReinstanceAction, HalaRendererError> {
    HalaReinstanceStateMachine::update(ctx, mesh)
  }

  /// Draw an instanced mesh.
  fn render(
    &self,
    ctx: &mut HalaRenderContext,
    mesh: &HalaMesh,
    instance: &HalaGpuInstance,
    object: &HalaDrawObject,
  ) -> Result<(), HalaRendererError> {
    default_render(ctx, mesh, instance, object)
  }

  /// Called after the mesh is instanced, before a frame updates it.
  fn begin_update(&self, _ctx: &mut HalaRenderContext, _mesh: &mut HalaMesh) -> Result<(), HalaRendererError> {
    Ok(())
  }

  fn uninstance(&self, mesh: &HalaMesh) {
    HalaGeometryInstancer::uninstance(mesh)
  }
}

struct HalaDefaultObjPipelineHooks;
impl HalaObjPipelineHooks for HalaDefaultObjPipelineHooks {}

/// The variants of object pipelines.
pub enum HalaObjPipelineKind {
  Default,
  Custom(Box<dyn HalaObjPipelineHooks>),
}

/// The object pipeline instances and renders meshes through its hooks.
pub struct HalaObjPipeline {
  kind: HalaObjPipelineKind,
}

/// The implementation of the object pipeline.
impl HalaObjPipeline {

  pub fn new(kind: HalaObjPipelineKind) -> Self {
    Self { kind }
  }

  pub fn with_hooks<H: HalaObjPipelineHooks + 'static>(hooks: H) -> Self {
    Self::new(HalaObjPipelineKind::Custom(Box::new(hooks)))
  }

  pub fn kind(&self) -> &HalaObjPipelineKind {
    &self.kind
  }

  fn hooks(&self) -> &dyn HalaObjPipelineHooks {
    match &self.kind {
      HalaObjPipelineKind::Default => &HalaDefaultObjPipelineHooks,
      HalaObjPipelineKind::Custom(hooks) => &**hooks,
    }
  }

  /// Instance the mesh unless it carries native data.
  /// param ctx: The render context.
  /// param mesh: The mesh.
  /// return: The action taken, or None for a native mesh.
  pub fn instance(&self, ctx: &mut HalaRenderContext, mesh: &mut HalaMesh) -> Result<Option<HalaReinstanceAction>, HalaRendererError> {
    if mesh.flags.contains(HalaMeshFlags::NATIVE) {
      log::debug!("The native mesh \"{}\" is not instanced.", mesh.name);
      return Ok(None);
    }

    let action = self.hooks().instance(ctx, mesh)?;
    Ok(Some(action))
  }

  /// Bring the mesh up to date, then let the hooks update it.
  pub fn begin_update(&self, ctx: &mut HalaRenderContext, mesh: &mut HalaMesh) -> Result<(), HalaRendererError> {
    self.instance(ctx, mesh)?;
    self.hooks().begin_update(ctx, mesh)
  }

  /// Instance and draw the mesh.
  /// A mesh whose instancing ran out of GPU memory is skipped for this frame.
  /// param ctx: The render context.
  /// param mesh: The mesh.
  /// param object: The per object data.
  /// return: True if the mesh was drawn.
  pub fn render(&self, ctx: &mut HalaRenderContext, mesh: &mut HalaMesh, object: &HalaDrawObject) -> Result<bool, HalaRendererError> {
    match self.instance(ctx, mesh) {
      Ok(Some(_)) => {},
      Ok(None) => return Ok(false),
      Err(err) if err.is_out_of_memory() => {
        log::warn!("The mesh \"{}\" is skipped for this frame: {}", mesh.name, err);
        return Ok(false);
      },
      Err(err) => return Err(err),
    }

    let mesh: &HalaMesh = mesh;
    match mesh.instance().get() {
      Some(instance) => {
        self.hooks().render(ctx, mesh, instance, object)?;
        Ok(true)
      },
      None => Ok(false),
    }
  }

  /// Unsupported, panics.
  pub fn uninstance(&self, mesh: &HalaMesh) {
    self.hooks().uninstance(mesh)
  }
}

impl Default for HalaObjPipeline {
  fn default() -> Self {
    Self::new(HalaObjPipelineKind::Default)
  }
}

/// The default render hook.
/// World matrix and lights are set once per object, then every sub-mesh sets its
/// material, texture and blend state and is drawn.
/// param ctx: The render context.
/// param mesh: The mesh.
/// param instance: The GPU instance of the mesh.
/// param object: The per object data.
/// return: The result.
pub fn default_render(
  ctx: &mut HalaRenderContext,
  mesh: &HalaMesh,
  instance: &HalaGpuInstance,
  object: &HalaDrawObject,
) -> Result<(), HalaRendererError> {
  ctx.state.set_world_matrix(&object.world_matrix);
  ctx.state.set_lights(&object.lights);

  for sub_mesh in instance.sub_meshes.iter() {
    let material = sub_mesh.material.as_ref();
    ctx.state.set_material_with_flags(
      mesh.flags,
      material.color,
      material.surface_props,
      material.texture_id,
      object.instance_id,
      sub_mesh.first_index,
      object.object_id as i32,
      object.extra_surface_prop,
    );
    let texture = material.texture_id.and_then(|id| ctx.textures.get_texture(id));
    ctx.state.set_texture(0, texture)?;
    ctx.state.set_alpha_blend(sub_mesh.vertex_alpha || material.is_translucent());

    HalaDrawDispatcher::draw_inst(ctx, instance, sub_mesh, &object.descriptor_sets, object.object_id)?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;
  use std::rc::Rc;

  use glam::Vec3;

  use super::*;
  use crate::testing::{
    new_test_context,
    quad_mesh,
    HalaGfxCall,
    HalaRecordingDevice,
  };

  #[test]
  fn default_pipeline_draws_every_sub_mesh() {
    let device = Rc::new(HalaRecordingDevice::new());
    let mut ctx = new_test_context(&device);
    let pipeline = HalaObjPipeline::default();
    let mut mesh = quad_mesh("object", &[6, 6]);
    let object = HalaDrawObject { object_id: 4, ..Default::default() };

    assert!(pipeline.render(&mut ctx, &mut mesh, &object).unwrap());
    assert_eq!(device.draws().len(), 2);
    assert_eq!(device.count(|call| matches!(call, HalaGfxCall::SetWorldMatrix(_))), 1);
    assert_eq!(device.count(|call| matches!(call, HalaGfxCall::SetMaterial(_))), 2);
    assert_eq!(device.count(|call| matches!(call, HalaGfxCall::BindTexture(0, None))), 1);
    assert_eq!(device.count(|call| matches!(call, HalaGfxCall::SetAlphaBlend(false))), 1);

    // A second frame reuses the instance and the cached state.
    device.clear_calls();
    assert!(pipeline.render(&mut ctx, &mut mesh, &object).unwrap());
    assert_eq!(device.created_buffer_count(), 0);
    assert_eq!(device.count(|call| matches!(call, HalaGfxCall::SetWorldMatrix(_))), 0);
    assert_eq!(device.count(|call| matches!(call, HalaGfxCall::BindPipeline(_))), 0);
    assert_eq!(device.draws().len(), 2);
  }

  #[test]
  fn translucent_vertices_enable_blending() {
    let device = Rc::new(HalaRecordingDevice::new());
    let mut ctx = new_test_context(&device);
    let pipeline = HalaObjPipeline::default();
    let mut mesh = quad_mesh("glass", &[6]).with_colors(vec![[255, 255, 255, 64]; 4]);

    pipeline.render(&mut ctx, &mut mesh, &HalaDrawObject::default()).unwrap();
    assert!(ctx.state.alpha_blend());
  }

  #[test]
  fn native_meshes_are_skipped() {
    let device = Rc::new(HalaRecordingDevice::new());
    let mut ctx = new_test_context(&device);
    let pipeline = HalaObjPipeline::default();
    let mut mesh = quad_mesh("native", &[6]).with_flags(HalaMeshFlags::NATIVE);

    assert_eq!(pipeline.instance(&mut ctx, &mut mesh).unwrap(), None);
    assert!(!pipeline.render(&mut ctx, &mut mesh, &HalaDrawObject::default()).unwrap());
    assert!(device.calls().is_empty());
  }

  #[test]
  fn out_of_memory_skips_the_frame_and_keeps_the_instance() {
    let device = Rc::new(HalaRecordingDevice::new());
    let mut ctx = new_test_context(&device);
    let pipeline = HalaObjPipeline::default();
    let mut mesh = quad_mesh("oom", &[6]);
    pipeline.render(&mut ctx, &mut mesh, &HalaDrawObject::default()).unwrap();
    let mesh_id = mesh.instance().get().unwrap().mesh_id;

    mesh.bump_serial_number();
    device.fail_next_allocation();
    device.clear_calls();
    assert!(!pipeline.render(&mut ctx, &mut mesh, &HalaDrawObject::default()).unwrap());
    assert!(device.draws().is_empty());
    assert_eq!(mesh.instance().get().unwrap().mesh_id, mesh_id);

    // Invalid geometry is not skipped silently.
    mesh.lock_positions().pop();
    assert!(pipeline.render(&mut ctx, &mut mesh, &HalaDrawObject::default()).is_err());
  }

  #[derive(Default)]
  struct CountingHooks {
    renders: Rc<Cell<u32>>,
    updates: Rc<Cell<u32>>,
  }

  impl HalaObjPipelineHooks for CountingHooks {
    fn render(&self, _ctx: &mut HalaRenderContext, _mesh: &HalaMesh, _instance: &HalaGpuInstance, _object: &HalaDrawObject) -> Result<(), HalaRendererError> {
      self.renders.set(self.renders.get() + 1);
      Ok(())
    }

    fn begin_update(&self, _ctx: &mut HalaRenderContext, mesh: &mut HalaMesh) -> Result<(), HalaRendererError> {
      assert!(mesh.instance().is_instanced());
      self.updates.set(self.updates.get() + 1);
      Ok(())
    }
  }

  #[test]
  fn custom_hooks_replace_the_defaults() {
    let device = Rc::new(HalaRecordingDevice::new());
    let mut ctx = new_test_context(&device);
    let hooks = CountingHooks::default();
    let (renders, updates) = (hooks.renders.clone(), hooks.updates.clone());
    let pipeline = HalaObjPipeline::with_hooks(hooks);
    let mut mesh = quad_mesh("custom", &[6]);

    pipeline.begin_update(&mut ctx, &mut mesh).unwrap();
    assert!(pipeline.render(&mut ctx, &mut mesh, &HalaDrawObject::default()).unwrap());
    assert_eq!((renders.get(), updates.get()), (1, 1));
    assert!(device.draws().is_empty());
    assert!(matches!(pipeline.kind(), HalaObjPipelineKind::Custom(_)));

    mesh.lock_positions()[0] = Vec3::NEG_ONE;
    pipeline.begin_update(&mut ctx, &mut mesh).unwrap();
    assert!(mesh.locked_since_instance().is_empty());
  }

  #[test]
  #[should_panic]
  fn uninstance_panics() {
    let mesh = quad_mesh("back", &[6]);
    HalaObjPipeline::default().uninstance(&mesh);
  }
}
