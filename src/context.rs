use std::rc::Rc;

use crate::config::HalaRetainedConfig;
use crate::gfx::{
  HalaAccelerationStructureBuilder,
  HalaGfxDevice,
  HalaTextureProvider,
};
use crate::render_state::{
  HalaPipelineSelector,
  HalaRenderStateCache,
};

/// The render context.
/// It owns every piece of state shared by instancing and drawing during one rendering session.
pub struct HalaRenderContext {
  pub config: HalaRetainedConfig,
  pub(crate) device: Rc<dyn HalaGfxDevice>,
  pub(crate) textures: Rc<dyn HalaTextureProvider>,
  pub(crate) acceleration_structure_builder: Option<Rc<dyn HalaAccelerationStructureBuilder>>,

  pub state: HalaRenderStateCache,
  pub pipelines: HalaPipelineSelector,

  next_mesh_id: u32,
}

/// The Drop implementation of the render context.
impl Drop for HalaRenderContext {
  fn drop(&mut self) {
    log::debug!("A HalaRenderContext is dropped.");
  }
}

/// The implementation of the render context.
impl HalaRenderContext {

  /// Create a new render context.
  /// param config: The configuration.
  /// param device: The GPU device.
  /// param textures: The texture provider.
  /// return: The render context.
  pub fn new(
    config: HalaRetainedConfig,
    device: Rc<dyn HalaGfxDevice>,
    textures: Rc<dyn HalaTextureProvider>,
  ) -> Self {
    let state = HalaRenderStateCache::new(device.clone(), config.max_texture_slots, config.max_lights);
    let pipelines = HalaPipelineSelector::new(device.clone());

    log::debug!(
      "A HalaRenderContext[{} texture slots, {} lights] is created.",
      config.max_texture_slots, config.max_lights
    );
    Self {
      config,
      device,
      textures,
      acceleration_structure_builder: None,
      state,
      pipelines,
      next_mesh_id: 1,
    }
  }

  /// Attach an acceleration structure builder used by every full instance build.
  /// param builder: The builder.
  /// return: The render context.
  pub fn with_acceleration_structure_builder(mut self, builder: Rc<dyn HalaAccelerationStructureBuilder>) -> Self {
    self.acceleration_structure_builder = Some(builder);
    self
  }

  pub fn device(&self) -> &Rc<dyn HalaGfxDevice> {
    &self.device
  }

  pub fn textures(&self) -> &Rc<dyn HalaTextureProvider> {
    &self.textures
  }

  /// Take a fresh mesh id. Ids start at 1 and skip 0 when the counter wraps.
  pub(crate) fn allocate_mesh_id(&mut self) -> u32 {
    let id = self.next_mesh_id;
    self.next_mesh_id = self.next_mesh_id.wrapping_add(1).max(1);
    id
  }

  /// Start a frame: everything the cache believes bound becomes unknown.
  pub fn begin_frame(&mut self) {
    self.state.reset_cache();
  }

  /// End a render pass by finishing the bound pipeline.
  pub fn end_frame(&mut self) {
    self.state.end_last_pipeline();
  }

  /// Tear down the session state.
  pub fn shutdown(&mut self) {
    self.state.end_last_pipeline();
    self.pipelines.clear();

    let statistics = self.state.statistics();
    log::info!(
      "Render state: {} state calls issued, {} redundant calls skipped, {} pipeline binds, {} flushes, {} draws.",
      statistics.issued_state_calls,
      statistics.skipped_state_calls,
      statistics.pipeline_binds,
      statistics.flushes,
      statistics.draws,
    );
  }
}
