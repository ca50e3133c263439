use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::config::HalaRetainedConfig;
use crate::context::HalaRenderContext;
use crate::scene::cpu::{HalaMaterial, HalaMesh, HalaSubMesh};

use crate::gfx::{
  HalaAccelerationStructureBuildDesc,
  HalaAccelerationStructureBuilder,
  HalaAccelerationStructureHandle,
  HalaBufferHandle,
  HalaBufferUsageFlags,
  HalaDescriptorSetHandle,
  HalaGfxDevice,
  HalaGfxError,
  HalaIndexedDraw,
  HalaPipelineDesc,
  HalaPipelineHandle,
  HalaShaderId,
  HalaTextureHandle,
  HalaTextureProvider,
};
use crate::render_state::{
  HalaAlphaTest,
  HalaFlushedUniforms,
  HalaFogParams,
  HalaLightSet,
  HalaMaterialState,
};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HalaGfxCall {
  CreateBuffer(HalaBufferHandle, HalaBufferUsageFlags, usize),
  UpdateBuffer(HalaBufferHandle, u64, usize),
  DestroyBuffer(HalaBufferHandle),
  CreatePipeline(HalaPipelineDesc),
  BindPipeline(HalaPipelineHandle),
  EndPipeline(HalaPipelineHandle),
  BindTexture(u32, Option<HalaTextureHandle>),
  SetMaterial(HalaMaterialState),
  SetAlphaBlend(bool),
  SetAlphaTest(HalaAlphaTest),
  SetLights(usize),
  SetFog(HalaFogParams),
  SetWorldMatrix(Mat4),
  SetViewMatrix(Mat4),
  SetProjectionMatrix(Mat4),
  FlushUniforms(HalaShaderId, HalaFlushedUniforms),
  DrawIndexed(HalaIndexedDraw),
}

impl HalaGfxCall {
  fn is_state_call(&self) -> bool {
    matches!(
      self,
      Self::BindPipeline(_)
        | Self::BindTexture(..)
        | Self::SetMaterial(_)
        | Self::SetAlphaBlend(_)
        | Self::SetAlphaTest(_)
        | Self::SetLights(_)
        | Self::SetFog(_)
        | Self::SetWorldMatrix(_)
        | Self::SetViewMatrix(_)
        | Self::SetProjectionMatrix(_)
    )
  }
}

/// A GPU device that records every call and keeps buffer contents in memory.
#[derive(Default)]
pub(crate) struct HalaRecordingDevice {
  calls: RefCell<Vec<HalaGfxCall>>,
  buffers: RefCell<HashMap<HalaBufferHandle, Vec<u8>>>,
  pipeline_handles: RefCell<Vec<HalaPipelineHandle>>,
  next_handle: Cell<u64>,
  destroyed_buffers: Cell<usize>,
  fail_allocation_after: Cell<Option<usize>>,
  fail_next_update: Cell<bool>,
  fail_next_pipeline: Cell<bool>,
}

impl HalaRecordingDevice {
  pub fn new() -> Self {
    Self::default()
  }

  fn next_handle(&self) -> u64 {
    let handle = self.next_handle.get() + 1;
    self.next_handle.set(handle);
    handle
  }

  fn record(&self, call: HalaGfxCall) {
    self.calls.borrow_mut().push(call);
  }

  pub fn calls(&self) -> Vec<HalaGfxCall> {
    self.calls.borrow().clone()
  }

  pub fn clear_calls(&self) {
    self.calls.borrow_mut().clear();
  }

  pub fn count<F: Fn(&HalaGfxCall) -> bool>(&self, predicate: F) -> usize {
    self.calls.borrow().iter().filter(|call| predicate(call)).count()
  }

  pub fn state_call_count(&self) -> usize {
    self.count(HalaGfxCall::is_state_call)
  }

  pub fn created_buffer_count(&self) -> usize {
    self.count(|call| matches!(call, HalaGfxCall::CreateBuffer(..)))
  }

  pub fn destroyed_buffer_count(&self) -> usize {
    self.destroyed_buffers.get()
  }

  pub fn live_buffer_count(&self) -> usize {
    self.buffers.borrow().len()
  }

  pub fn buffer_contents(&self, buffer: HalaBufferHandle) -> Option<Vec<u8>> {
    self.buffers.borrow().get(&buffer).cloned()
  }

  pub fn draws(&self) -> Vec<HalaIndexedDraw> {
    self.calls.borrow().iter().filter_map(|call| match call {
      HalaGfxCall::DrawIndexed(draw) => Some(draw.clone()),
      _ => None,
    }).collect()
  }

  pub fn last_flush(&self) -> Option<(HalaShaderId, HalaFlushedUniforms)> {
    self.calls.borrow().iter().rev().find_map(|call| match call {
      HalaGfxCall::FlushUniforms(shader, uniforms) => Some((*shader, uniforms.clone())),
      _ => None,
    })
  }

  pub fn pipeline_desc(&self, pipeline: HalaPipelineHandle) -> Option<HalaPipelineDesc> {
    let created: Vec<_> = self.calls.borrow().iter().filter_map(|call| match call {
      HalaGfxCall::CreatePipeline(desc) => Some(desc.clone()),
      _ => None,
    }).collect();
    self.pipeline_handles.borrow().iter().position(|&handle| handle == pipeline).and_then(|index| created.get(index).cloned())
  }

  pub fn fail_next_allocation(&self) {
    self.fail_allocation_after(0);
  }

  /// Let `count` allocations succeed, then fail one.
  pub fn fail_allocation_after(&self, count: usize) {
    self.fail_allocation_after.set(Some(count));
  }

  pub fn fail_next_update(&self) {
    self.fail_next_update.set(true);
  }

  pub fn fail_next_pipeline(&self) {
    self.fail_next_pipeline.set(true);
  }
}

impl HalaGfxDevice for HalaRecordingDevice {
  fn create_buffer(&self, usage: HalaBufferUsageFlags, data: &[u8], _debug_name: &str) -> Result<HalaBufferHandle, HalaGfxError> {
    match self.fail_allocation_after.get() {
      Some(0) => {
        self.fail_allocation_after.set(None);
        return Err(HalaGfxError::OutOfMemory(data.len() as u64));
      },
      Some(count) => self.fail_allocation_after.set(Some(count - 1)),
      None => {},
    }
    let handle = HalaBufferHandle(self.next_handle());
    self.buffers.borrow_mut().insert(handle, data.to_vec());
    self.record(HalaGfxCall::CreateBuffer(handle, usage, data.len()));
    Ok(handle)
  }

  fn update_buffer(&self, buffer: HalaBufferHandle, offset: u64, data: &[u8]) -> Result<(), HalaGfxError> {
    if self.fail_next_update.replace(false) {
      return Err(HalaGfxError::OutOfMemory(data.len() as u64));
    }
    let mut buffers = self.buffers.borrow_mut();
    let contents = buffers.get_mut(&buffer).ok_or(HalaGfxError::InvalidHandle(buffer.0))?;
    let offset = offset as usize;
    contents[offset..offset + data.len()].copy_from_slice(data);
    drop(buffers);
    self.record(HalaGfxCall::UpdateBuffer(buffer, offset as u64, data.len()));
    Ok(())
  }

  fn destroy_buffer(&self, buffer: HalaBufferHandle) {
    if self.buffers.borrow_mut().remove(&buffer).is_some() {
      self.destroyed_buffers.set(self.destroyed_buffers.get() + 1);
    }
    self.record(HalaGfxCall::DestroyBuffer(buffer));
  }

  fn create_pipeline(&self, desc: &HalaPipelineDesc) -> Result<HalaPipelineHandle, HalaGfxError> {
    if self.fail_next_pipeline.replace(false) {
      return Err(HalaGfxError::Backend("pipeline creation failed".to_string()));
    }
    let handle = HalaPipelineHandle(self.next_handle());
    self.pipeline_handles.borrow_mut().push(handle);
    self.record(HalaGfxCall::CreatePipeline(desc.clone()));
    Ok(handle)
  }

  fn bind_pipeline(&self, pipeline: HalaPipelineHandle) {
    self.record(HalaGfxCall::BindPipeline(pipeline));
  }

  fn end_pipeline(&self, pipeline: HalaPipelineHandle) {
    self.record(HalaGfxCall::EndPipeline(pipeline));
  }

  fn bind_texture(&self, slot: u32, texture: Option<HalaTextureHandle>) {
    self.record(HalaGfxCall::BindTexture(slot, texture));
  }

  fn set_material(&self, material: &HalaMaterialState) {
    self.record(HalaGfxCall::SetMaterial(*material));
  }

  fn set_alpha_blend(&self, enable: bool) {
    self.record(HalaGfxCall::SetAlphaBlend(enable));
  }

  fn set_alpha_test(&self, alpha_test: &HalaAlphaTest) {
    self.record(HalaGfxCall::SetAlphaTest(*alpha_test));
  }

  fn set_lights(&self, lights: &HalaLightSet) {
    self.record(HalaGfxCall::SetLights(lights.lights.len()));
  }

  fn set_fog(&self, fog: &HalaFogParams) {
    self.record(HalaGfxCall::SetFog(*fog));
  }

  fn set_world_matrix(&self, matrix: &Mat4) {
    self.record(HalaGfxCall::SetWorldMatrix(*matrix));
  }

  fn set_view_matrix(&self, matrix: &Mat4) {
    self.record(HalaGfxCall::SetViewMatrix(*matrix));
  }

  fn set_projection_matrix(&self, matrix: &Mat4) {
    self.record(HalaGfxCall::SetProjectionMatrix(*matrix));
  }

  fn flush_uniforms(&self, shader: HalaShaderId, uniforms: &HalaFlushedUniforms) {
    self.record(HalaGfxCall::FlushUniforms(shader, uniforms.clone()));
  }

  fn draw_indexed(&self, draw: &HalaIndexedDraw) {
    self.record(HalaGfxCall::DrawIndexed(draw.clone()));
  }
}

/// A texture provider backed by a map of texture id to (texture, descriptor set).
pub(crate) struct HalaMockTextureProvider {
  textures: HashMap<u32, (HalaTextureHandle, HalaDescriptorSetHandle)>,
}

impl HalaMockTextureProvider {
  pub const DEFAULT_DESCRIPTOR_SET: HalaDescriptorSetHandle = HalaDescriptorSetHandle(1000);

  pub fn new() -> Self {
    Self { textures: HashMap::new() }
  }

  pub fn with_texture(mut self, texture_id: u32) -> Self {
    let id = texture_id as u64;
    self.textures.insert(texture_id, (HalaTextureHandle(100 + id), HalaDescriptorSetHandle(200 + id)));
    self
  }
}

impl HalaTextureProvider for HalaMockTextureProvider {
  fn get_texture(&self, texture_id: u32) -> Option<HalaTextureHandle> {
    self.textures.get(&texture_id).map(|(texture, _)| *texture)
  }

  fn get_texture_descriptor_set(&self, texture_id: u32) -> Option<HalaDescriptorSetHandle> {
    self.textures.get(&texture_id).map(|(_, descriptor_set)| *descriptor_set)
  }

  fn get_default_descriptor_set(&self) -> HalaDescriptorSetHandle {
    Self::DEFAULT_DESCRIPTOR_SET
  }
}

/// An acceleration structure builder that records its requests.
#[derive(Default)]
pub(crate) struct HalaRecordingAccelerationStructureBuilder {
  requests: RefCell<Vec<HalaAccelerationStructureBuildDesc>>,
  fail: Cell<bool>,
}

impl HalaRecordingAccelerationStructureBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn requests(&self) -> Vec<HalaAccelerationStructureBuildDesc> {
    self.requests.borrow().clone()
  }

  pub fn fail_builds(&self) {
    self.fail.set(true);
  }
}

impl HalaAccelerationStructureBuilder for HalaRecordingAccelerationStructureBuilder {
  fn build(&self, desc: &HalaAccelerationStructureBuildDesc) -> Result<HalaAccelerationStructureHandle, HalaGfxError> {
    if self.fail.get() {
      return Err(HalaGfxError::Backend("acceleration structure build failed".to_string()));
    }
    self.requests.borrow_mut().push(desc.clone());
    Ok(HalaAccelerationStructureHandle(self.requests.borrow().len() as u64))
  }
}

/// A render context over a recording device and an empty texture provider.
pub(crate) fn new_test_context(device: &Rc<HalaRecordingDevice>) -> HalaRenderContext {
  HalaRenderContext::new(HalaRetainedConfig::default(), device.clone(), Rc::new(HalaMockTextureProvider::new()))
}

/// A unit quad whose sub-meshes repeat its two triangles until they hold the given index counts.
pub(crate) fn quad_mesh(name: &str, index_counts: &[usize]) -> HalaMesh {
  let quad = [0u32, 1, 2, 0, 2, 3];
  let material = Rc::new(HalaMaterial::default());
  let sub_meshes = index_counts.iter()
    .map(|&count| HalaSubMesh::new(quad.iter().copied().cycle().take(count).collect(), material.clone()))
    .collect();
  HalaMesh::new(
    name,
    vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
    sub_meshes,
  )
}
