use std::rc::Rc;
use std::collections::HashMap;

use crate::error::HalaRendererError;
use crate::gfx::{
  HalaBlendDepthState,
  HalaGfxDevice,
  HalaPipelineDesc,
  HalaPipelineHandle,
  HalaPrimitiveTopology,
  HalaShaderId,
};

/// The pipeline cache.
/// One pipeline per (topology, shader, blend and depth state), created on first use.
pub struct HalaPipelineSelector {
  device: Rc<dyn HalaGfxDevice>,
  cache: HashMap<(HalaPrimitiveTopology, HalaShaderId, HalaBlendDepthState), HalaPipelineHandle>,
}

/// The implementation of the pipeline cache.
impl HalaPipelineSelector {

  /// Create a new empty pipeline cache.
  /// param device: The GPU device.
  /// return: The pipeline cache.
  pub fn new(device: Rc<dyn HalaGfxDevice>) -> Self {
    Self {
      device,
      cache: HashMap::new(),
    }
  }

  /// Get the pipeline of a topology, shader and blend state, creating it if needed.
  /// param topology: The primitive topology.
  /// param shader: The shader.
  /// param blend_depth: The blend and depth state.
  /// return: The pipeline.
  pub fn get_pipeline(
    &mut self,
    topology: HalaPrimitiveTopology,
    shader: HalaShaderId,
    blend_depth: &HalaBlendDepthState,
  ) -> Result<HalaPipelineHandle, HalaRendererError> {
    let key = (topology, shader, *blend_depth);
    if let Some(pipeline) = self.cache.get(&key) {
      return Ok(*pipeline);
    }

    let debug_name = format!("pipeline_{}_{}", topology.to_u8(), shader.0);
    let pipeline = self.device.create_pipeline(&HalaPipelineDesc {
      primitive_topology: topology,
      shader,
      blend_depth: *blend_depth,
      debug_name: debug_name.clone(),
    }).map_err(|err| HalaRendererError::new(&format!("Create the pipeline \"{}\" failed.", debug_name), Some(Box::new(err))))?;

    log::debug!("A pipeline \"{}\" is created and cached.", debug_name);
    self.cache.insert(key, pipeline);
    Ok(pipeline)
  }

  pub fn len(&self) -> usize {
    self.cache.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cache.is_empty()
  }

  /// Forget every cached pipeline.
  pub fn clear(&mut self) {
    self.cache.clear();
  }
}
