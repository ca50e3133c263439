use std::rc::Rc;

use crate::gfx::{
  HalaAccelerationStructureHandle,
  HalaBuffer,
  HalaPrimitiveTopology,
  HalaSubMeshRange,
};
use crate::instancing::layout::HalaVertexLayout;
use crate::scene::cpu::HalaMaterial;

/// The per sub-mesh draw record of a GPU instance.
#[derive(Debug, Clone)]
pub struct HalaSubMeshInstance {
  pub index_count: u32,
  pub min_vertex: u32,
  pub vertex_count: u32,
  pub material: Rc<HalaMaterial>,
  // Any vertex in [min_vertex, min_vertex + vertex_count) has alpha below 255.
  pub vertex_alpha: bool,
  // In indices, not bytes.
  pub first_index: u32,
}

/// The implementation of the sub-mesh instance.
impl HalaSubMeshInstance {

  /// The offset of the first index in the index buffer in bytes.
  pub fn byte_offset(&self) -> u64 {
    self.first_index as u64 * std::mem::size_of::<u32>() as u64
  }

  pub fn range(&self) -> HalaSubMeshRange {
    HalaSubMeshRange {
      index_count: self.index_count,
      first_index: self.first_index,
      vertex_count: self.vertex_count,
    }
  }
}

/// The GPU resident instance of a mesh.
pub struct HalaGpuInstance {
  pub serial_number: u32,
  pub mesh_id: u32,
  pub primitive_topology: HalaPrimitiveTopology,
  pub layout: HalaVertexLayout,
  pub num_vertices: u32,
  pub total_indices: u32,
  pub sub_meshes: Vec<HalaSubMeshInstance>,

  pub(crate) vertex_data: Vec<u8>,
  pub(crate) index_data: Vec<u32>,
  pub vertex_buffer: HalaBuffer,
  pub index_buffer: HalaBuffer,

  pub acceleration_structure: Option<HalaAccelerationStructureHandle>,
}

/// The Drop implementation of the GPU instance.
impl Drop for HalaGpuInstance {
  fn drop(&mut self) {
    log::debug!("A HalaGpuInstance of mesh {} is dropped.", self.mesh_id);
  }
}

/// The implementation of the GPU instance.
impl HalaGpuInstance {

  /// The interleaved staging copy of the vertex buffer.
  pub fn vertex_data(&self) -> &[u8] {
    &self.vertex_data
  }

  pub fn index_data(&self) -> &[u32] {
    &self.index_data
  }
}

/// The GPU instance slot owned by a mesh.
#[derive(Default)]
pub enum HalaInstanceSlot {
  #[default]
  NotInstanced,
  Instanced(HalaGpuInstance),
}

/// The implementation of the GPU instance slot.
impl HalaInstanceSlot {

  pub fn get(&self) -> Option<&HalaGpuInstance> {
    match self {
      Self::Instanced(instance) => Some(instance),
      Self::NotInstanced => None,
    }
  }

  pub fn is_instanced(&self) -> bool {
    matches!(self, Self::Instanced(_))
  }

  pub(crate) fn take(&mut self) -> Self {
    std::mem::take(self)
  }
}
