use crate::context::HalaRenderContext;
use crate::error::HalaRendererError;
use crate::gfx::{
  HalaBlendDepthState,
  HalaDescriptorSetHandle,
  HalaIndexedDraw,
  HalaShaderId,
};
use crate::scene::gpu::{
  HalaGpuInstance,
  HalaSubMeshInstance,
};

/// The draw path taken for a sub-mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalaDrawPath {
  Direct,
  /// Failed fragments still write color but skip the depth write.
  AlphaTestEmulation,
}

/// Issues the draws of sub-mesh instances.
pub struct HalaDrawDispatcher;

/// The implementation of the draw dispatcher.
impl HalaDrawDispatcher {

  /// Draw one sub-mesh with the cached render state.
  /// The path follows the current alpha test state.
  /// param ctx: The render context.
  /// param instance: The GPU instance.
  /// param sub_mesh: The sub-mesh of the instance.
  /// param descriptor_sets: Extra descriptor sets bound after the material set.
  /// param object_index: The object index.
  /// return: The path taken.
  pub fn draw_inst(
    ctx: &mut HalaRenderContext,
    instance: &HalaGpuInstance,
    sub_mesh: &HalaSubMeshInstance,
    descriptor_sets: &[HalaDescriptorSetHandle],
    object_index: u32,
  ) -> Result<HalaDrawPath, HalaRendererError> {
    if ctx.state.alpha_test_enabled() {
      Self::draw_inst_alpha_test_emulation(ctx, instance, sub_mesh, descriptor_sets, object_index)?;
      Ok(HalaDrawPath::AlphaTestEmulation)
    } else {
      Self::draw_inst_direct(ctx, instance, sub_mesh, descriptor_sets, object_index)?;
      Ok(HalaDrawPath::Direct)
    }
  }

  /// Draw one sub-mesh writing color and depth unconditionally.
  pub fn draw_inst_direct(
    ctx: &mut HalaRenderContext,
    instance: &HalaGpuInstance,
    sub_mesh: &HalaSubMeshInstance,
    descriptor_sets: &[HalaDescriptorSetHandle],
    object_index: u32,
  ) -> Result<(), HalaRendererError> {
    let shader = ctx.config.default_shaders.direct;
    let state = ctx.config.direct_state;
    Self::draw_with(ctx, instance, sub_mesh, descriptor_sets, object_index, shader, &state)
  }

  /// Draw one sub-mesh with the alpha test done in the fragment stage.
  pub fn draw_inst_alpha_test_emulation(
    ctx: &mut HalaRenderContext,
    instance: &HalaGpuInstance,
    sub_mesh: &HalaSubMeshInstance,
    descriptor_sets: &[HalaDescriptorSetHandle],
    object_index: u32,
  ) -> Result<(), HalaRendererError> {
    let shader = ctx.config.default_shaders.alpha_test_emulation;
    let state = ctx.config.alpha_test_emulation_state;
    Self::draw_with(ctx, instance, sub_mesh, descriptor_sets, object_index, shader, &state)
  }

  fn draw_with(
    ctx: &mut HalaRenderContext,
    instance: &HalaGpuInstance,
    sub_mesh: &HalaSubMeshInstance,
    descriptor_sets: &[HalaDescriptorSetHandle],
    object_index: u32,
    shader: HalaShaderId,
    state: &HalaBlendDepthState,
  ) -> Result<(), HalaRendererError> {
    let pipeline = ctx.pipelines.get_pipeline(instance.primitive_topology, shader, state)?;
    ctx.state.compare_and_bind(pipeline);
    ctx.state.flush_cache(shader, object_index, instance.mesh_id);

    let mut sets = Vec::with_capacity(descriptor_sets.len() + 1);
    sets.push(ctx.textures.get_material_descriptor_set(&sub_mesh.material));
    sets.extend_from_slice(descriptor_sets);

    ctx.device.draw_indexed(&HalaIndexedDraw {
      pipeline,
      vertex_buffer: instance.vertex_buffer.handle,
      index_buffer: instance.index_buffer.handle,
      index_count: sub_mesh.index_count,
      first_index: sub_mesh.first_index,
      descriptor_sets: sets,
    });
    ctx.state.record_draw();

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use super::*;
  use crate::config::HalaRetainedConfig;
  use crate::instancing::HalaGeometryInstancer;
  use crate::render_state::{HalaAlphaTest, HalaAlphaTestFunc};
  use crate::scene::cpu::{HalaMaterial, HalaSubMesh};
  use crate::testing::{
    new_test_context,
    quad_mesh,
    HalaGfxCall,
    HalaMockTextureProvider,
    HalaRecordingDevice,
  };

  #[test]
  fn alpha_test_state_selects_the_path() {
    let device = Rc::new(HalaRecordingDevice::new());
    let mut ctx = new_test_context(&device);
    let mesh = quad_mesh("paths", &[6, 6]);
    let instance = HalaGeometryInstancer::instance(&mut ctx, &mesh).unwrap();

    let path = HalaDrawDispatcher::draw_inst(&mut ctx, &instance, &instance.sub_meshes[0], &[], 0).unwrap();
    assert_eq!(path, HalaDrawPath::Direct);
    let direct = ctx.state.current_pipeline().unwrap();
    assert_eq!(device.last_flush().map(|(shader, _)| shader), Some(ctx.config.default_shaders.direct));

    ctx.state.set_alpha_test(HalaAlphaTest { func: HalaAlphaTestFunc::GREATER_EQUAL, reference: 0.5 });
    let path = HalaDrawDispatcher::draw_inst(&mut ctx, &instance, &instance.sub_meshes[1], &[], 0).unwrap();
    assert_eq!(path, HalaDrawPath::AlphaTestEmulation);
    let emulation = ctx.state.current_pipeline().unwrap();
    assert_ne!(direct, emulation);
    assert_eq!(device.last_flush().map(|(shader, _)| shader), Some(ctx.config.default_shaders.alpha_test_emulation));
    assert!(device.pipeline_desc(emulation).unwrap().blend_depth.alpha_test_emulation);
    assert!(!device.pipeline_desc(direct).unwrap().blend_depth.alpha_test_emulation);

    let draws = device.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!((draws[1].first_index, draws[1].index_count), (6, 6));
    assert_eq!(draws[0].pipeline, direct);
    assert_eq!(draws[1].pipeline, emulation);
  }

  #[test]
  fn shared_shader_still_gets_an_emulation_pipeline() {
    let device = Rc::new(HalaRecordingDevice::new());
    let mut config = HalaRetainedConfig::default();
    config.default_shaders.alpha_test_emulation = config.default_shaders.direct;
    let mut ctx = HalaRenderContext::new(config, device.clone(), Rc::new(HalaMockTextureProvider::new()));
    let mesh = quad_mesh("shared", &[6]);
    let instance = HalaGeometryInstancer::instance(&mut ctx, &mesh).unwrap();

    HalaDrawDispatcher::draw_inst(&mut ctx, &instance, &instance.sub_meshes[0], &[], 0).unwrap();
    let direct = ctx.state.current_pipeline().unwrap();
    ctx.state.set_alpha_test(HalaAlphaTest { func: HalaAlphaTestFunc::GREATER_EQUAL, reference: 0.5 });
    HalaDrawDispatcher::draw_inst(&mut ctx, &instance, &instance.sub_meshes[0], &[], 0).unwrap();
    let emulation = ctx.state.current_pipeline().unwrap();

    assert_ne!(direct, emulation);
    assert!(device.pipeline_desc(emulation).unwrap().blend_depth.alpha_test_emulation);
    assert_eq!(ctx.pipelines.len(), 2);
  }

  #[test]
  fn each_draw_flushes_once_and_binds_on_change() {
    let device = Rc::new(HalaRecordingDevice::new());
    let mut ctx = new_test_context(&device);
    let mesh = quad_mesh("flush", &[6, 6, 6]);
    let instance = HalaGeometryInstancer::instance(&mut ctx, &mesh).unwrap();

    for sub_mesh in instance.sub_meshes.iter() {
      HalaDrawDispatcher::draw_inst(&mut ctx, &instance, sub_mesh, &[], 7).unwrap();
    }
    assert_eq!(device.count(|call| matches!(call, HalaGfxCall::FlushUniforms(..))), 3);
    assert_eq!(device.count(|call| matches!(call, HalaGfxCall::DrawIndexed(_))), 3);
    assert_eq!(device.count(|call| matches!(call, HalaGfxCall::BindPipeline(_))), 1);
    assert_eq!(ctx.state.statistics().draws, 3);

    let (_, uniforms) = device.last_flush().unwrap();
    assert_eq!((uniforms.object_id, uniforms.mesh_id), (7, instance.mesh_id));
  }

  #[test]
  fn material_descriptor_set_comes_first() {
    let device = Rc::new(HalaRecordingDevice::new());
    let textures = Rc::new(HalaMockTextureProvider::new().with_texture(3));
    let mut ctx = HalaRenderContext::new(HalaRetainedConfig::default(), device.clone(), textures.clone());
    let material = Rc::new(HalaMaterial::new("textured", [255, 255, 255, 255], Some(3)));
    let mesh = crate::scene::cpu::HalaMesh::new(
      "sets",
      vec![glam::Vec3::ZERO, glam::Vec3::X, glam::Vec3::Y],
      vec![HalaSubMesh::new(vec![0, 1, 2], material)],
    );
    let instance = HalaGeometryInstancer::instance(&mut ctx, &mesh).unwrap();

    let extra = HalaDescriptorSetHandle(9);
    HalaDrawDispatcher::draw_inst(&mut ctx, &instance, &instance.sub_meshes[0], &[extra], 0).unwrap();
    let draw = device.draws().pop().unwrap();
    assert_eq!(draw.descriptor_sets, vec![HalaDescriptorSetHandle(203), extra]);
    assert_eq!(draw.vertex_buffer, instance.vertex_buffer.handle);
    assert_eq!(draw.index_buffer, instance.index_buffer.handle);
  }
}
