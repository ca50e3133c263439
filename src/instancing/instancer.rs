use std::ops::Range;

use glam::Vec2;

use crate::context::HalaRenderContext;
use crate::error::HalaRendererError;
use crate::gfx::{
  HalaAccelerationStructureBuildDesc,
  HalaBuffer,
  HalaBufferUsageFlags,
  HalaPrimitiveTopology,
};
use crate::scene::cpu::{
  HalaDirtyFlags,
  HalaMesh,
  HalaMeshFlags,
};
use crate::scene::gpu::{
  HalaGpuInstance,
  HalaSubMeshInstance,
};
use super::layout::{
  HalaVertexAttributeDesc,
  HalaVertexAttributeSemantic,
  HalaVertexLayout,
  HalaVertexLayoutFeatures,
};
use super::normals::synthesize_normals;

/// Builds and patches the GPU instances of meshes.
pub struct HalaGeometryInstancer;

/// The implementation of the geometry instancer.
impl HalaGeometryInstancer {

  /// Build a new GPU instance of the mesh.
  /// Nothing is published on failure: buffers created before the failure are destroyed.
  /// param ctx: The render context.
  /// param mesh: The mesh.
  /// return: The GPU instance.
  pub fn instance(ctx: &mut HalaRenderContext, mesh: &HalaMesh) -> Result<HalaGpuInstance, HalaRendererError> {
    Self::validate(mesh)?;

    let features = HalaVertexLayoutFeatures::from_mesh(mesh, ctx.config.force_prelight);
    let layout = HalaVertexLayout::build(features);
    let num_vertices = mesh.num_vertices();

    // Interleaved staging copy of the vertex buffer.
    let mut vertex_data = vec![0u8; num_vertices * layout.stride as usize];
    for attribute in layout.attributes.iter() {
      Self::write_attribute(&mut vertex_data, &layout, attribute, mesh)?;
    }

    // Concatenate the sub-mesh indices.
    let mut index_data = Vec::with_capacity(mesh.total_indices());
    let mut sub_meshes = Vec::with_capacity(mesh.sub_meshes().len());
    for sub_mesh in mesh.sub_meshes() {
      let (min_vertex, vertex_count) = sub_mesh.vertex_range()
        .ok_or(HalaRendererError::new(&format!("The mesh \"{}\" has an empty sub-mesh.", mesh.name), None))?;
      let first_index = index_data.len() as u32;
      index_data.extend_from_slice(&sub_mesh.indices);

      sub_meshes.push(HalaSubMeshInstance {
        index_count: sub_mesh.indices.len() as u32,
        min_vertex,
        vertex_count,
        material: sub_mesh.material.clone(),
        vertex_alpha: layout.features.has_prelight && Self::has_translucent_vertex(mesh, min_vertex, vertex_count),
        first_index,
      });
    }

    let index_buffer = HalaBuffer::new(
      ctx.device.clone(),
      HalaBufferUsageFlags::INDEX_BUFFER
        | HalaBufferUsageFlags::TRANSFER_DST
        | HalaBufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY,
      bytemuck::cast_slice(&index_data),
      &format!("{}.index_buffer", mesh.name),
    )?;
    let vertex_buffer = HalaBuffer::new(
      ctx.device.clone(),
      HalaBufferUsageFlags::VERTEX_BUFFER
        | HalaBufferUsageFlags::TRANSFER_DST
        | HalaBufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY,
      &vertex_data,
      &format!("{}.vertex_buffer", mesh.name),
    )?;

    let primitive_topology = if mesh.flags.contains(HalaMeshFlags::TRISTRIP) {
      HalaPrimitiveTopology::TRIANGLE_STRIP
    } else {
      HalaPrimitiveTopology::TRIANGLE_LIST
    };
    let mesh_id = ctx.allocate_mesh_id();

    let mut instance = HalaGpuInstance {
      serial_number: mesh.serial_number(),
      mesh_id,
      primitive_topology,
      layout,
      num_vertices: num_vertices as u32,
      total_indices: index_data.len() as u32,
      sub_meshes,
      vertex_data,
      index_data,
      vertex_buffer,
      index_buffer,
      acceleration_structure: None,
    };
    instance.acceleration_structure = Self::request_acceleration_structure(ctx, &instance, &mesh.name);

    log::debug!(
      "The mesh \"{}\" is instanced as mesh {}[{} vertices x {} bytes, {} indices, {} sub-meshes].",
      mesh.name, mesh_id, instance.num_vertices, instance.layout.stride, instance.total_indices, instance.sub_meshes.len()
    );
    Ok(instance)
  }

  /// Rewrite the dirty vertex streams of an existing instance and upload only their byte ranges.
  /// The buffers are never reallocated and the layout never changes.
  /// param mesh: The mesh, with the same topology and layout the instance was built from.
  /// param instance: The GPU instance.
  /// param dirty: The changed streams.
  /// return: The result.
  pub fn refresh(mesh: &HalaMesh, instance: &mut HalaGpuInstance, dirty: HalaDirtyFlags) -> Result<(), HalaRendererError> {
    Self::validate(mesh)?;
    if mesh.serial_number() != instance.serial_number || mesh.num_vertices() as u32 != instance.num_vertices {
      return Err(HalaRendererError::new(
        &format!("The GPU instance of the mesh \"{}\" is stale and can NOT be refreshed.", mesh.name),
        None,
      ));
    }

    let layout = instance.layout.clone();
    let mut semantics = Vec::new();
    if dirty.positions {
      semantics.push(HalaVertexAttributeSemantic::Position);
    }
    // Synthesized normals follow the positions.
    if dirty.normals || (dirty.positions && !mesh.has_normals()) {
      semantics.push(HalaVertexAttributeSemantic::Normal);
    }
    if dirty.colors {
      semantics.push(HalaVertexAttributeSemantic::Color);
    }
    for (set, &changed) in dirty.tex_coords.iter().enumerate() {
      if changed {
        semantics.push(HalaVertexAttributeSemantic::TexCoord(set as u8));
      }
    }
    let attributes: Vec<_> = semantics.into_iter().filter_map(|semantic| layout.find(semantic).copied()).collect();

    let mut vertex_data = instance.vertex_data.clone();
    for attribute in attributes.iter() {
      Self::write_attribute(&mut vertex_data, &layout, attribute, mesh)?;
    }
    for attribute in attributes.iter() {
      let range = Self::attribute_byte_range(attribute, instance.num_vertices);
      instance.vertex_buffer.update(range.start as u64, &vertex_data[range])?;
    }
    instance.vertex_data = vertex_data;

    if attributes.iter().any(|attribute| attribute.semantic == HalaVertexAttributeSemantic::Color) {
      for sub_mesh in instance.sub_meshes.iter_mut() {
        sub_mesh.vertex_alpha = Self::has_translucent_vertex(mesh, sub_mesh.min_vertex, sub_mesh.vertex_count);
      }
    }

    log::debug!("The mesh {} refreshed {} vertex streams.", instance.mesh_id, attributes.len());
    Ok(())
  }

  /// GPU instances are never converted back to CPU geometry.
  pub fn uninstance(mesh: &HalaMesh) -> ! {
    panic!("Uninstancing the mesh \"{}\" is not supported.", mesh.name);
  }

  /// The byte range an attribute covers in the vertex buffer, from vertex 0 to the last vertex.
  /// param attribute: The attribute.
  /// param num_vertices: The number of vertices.
  /// return: The byte range.
  pub fn attribute_byte_range(attribute: &HalaVertexAttributeDesc, num_vertices: u32) -> Range<usize> {
    let start = attribute.offset as usize;
    let end = num_vertices.saturating_sub(1) as usize * attribute.stride as usize + start + attribute.size() as usize;
    start..end
  }

  fn validate(mesh: &HalaMesh) -> Result<(), HalaRendererError> {
    let num_vertices = mesh.num_vertices();
    if mesh.sub_meshes().is_empty() {
      return Err(HalaRendererError::new(&format!("The mesh \"{}\" has no sub-mesh.", mesh.name), None));
    }
    if num_vertices == 0 {
      return Err(HalaRendererError::new(&format!("The mesh \"{}\" has no vertex.", mesh.name), None));
    }

    let stream_lengths = mesh.normals().map(|normals| ("normals", normals.len()))
      .into_iter()
      .chain(mesh.colors().map(|colors| ("colors", colors.len())))
      .chain(mesh.tex_coord_sets().iter().map(|tex_coords| ("texture coordinates", tex_coords.len())));
    for (stream, len) in stream_lengths {
      if len != num_vertices {
        return Err(HalaRendererError::new(
          &format!("The mesh \"{}\" has {} {} for {} vertices.", mesh.name, len, stream, num_vertices),
          None,
        ));
      }
    }

    for sub_mesh in mesh.sub_meshes() {
      if let Some(&index) = sub_mesh.indices.iter().find(|&&index| index as usize >= num_vertices) {
        return Err(HalaRendererError::new(
          &format!("The mesh \"{}\" references the vertex {} out of {} vertices.", mesh.name, index, num_vertices),
          None,
        ));
      }
    }

    Ok(())
  }

  /// Write one attribute stream of the mesh into its interleaved slot.
  fn write_attribute(
    vertex_data: &mut [u8],
    layout: &HalaVertexLayout,
    attribute: &HalaVertexAttributeDesc,
    mesh: &HalaMesh,
  ) -> Result<(), HalaRendererError> {
    let num_vertices = mesh.num_vertices();
    match attribute.semantic {
      HalaVertexAttributeSemantic::Position => {
        Self::write_stream(vertex_data, layout.stride, attribute, mesh.positions());
      },
      HalaVertexAttributeSemantic::Normal => match mesh.normals() {
        Some(normals) => Self::write_stream(vertex_data, layout.stride, attribute, normals),
        None => {
          let indices: Vec<u32> = mesh.sub_meshes().iter().flat_map(|sub_mesh| sub_mesh.indices.iter().copied()).collect();
          let normals = synthesize_normals(mesh.positions(), &indices)
            .map_err(|err| HalaRendererError::new(
              &format!("Synthesize normals of the mesh \"{}\" failed.", mesh.name),
              Some(Box::new(err)),
            ))?;
          Self::write_stream(vertex_data, layout.stride, attribute, &normals);
        },
      },
      HalaVertexAttributeSemantic::Color => {
        let colors: Vec<[f32; 4]> = match mesh.colors() {
          Some(colors) => colors.iter().map(|color| color.map(|c| c as f32 / 255.0)).collect(),
          None => vec![[1.0; 4]; num_vertices],
        };
        Self::write_stream(vertex_data, layout.stride, attribute, &colors);
      },
      HalaVertexAttributeSemantic::TexCoord(set) => match mesh.tex_coord_sets().get(set as usize) {
        Some(tex_coords) => Self::write_stream(vertex_data, layout.stride, attribute, tex_coords),
        None => Self::write_stream(vertex_data, layout.stride, attribute, &vec![Vec2::ZERO; num_vertices]),
      },
    }

    Ok(())
  }

  fn write_stream<T: bytemuck::Pod>(vertex_data: &mut [u8], stride: u32, attribute: &HalaVertexAttributeDesc, values: &[T]) {
    let size = attribute.size() as usize;
    for (i, value) in values.iter().enumerate() {
      let start = i * stride as usize + attribute.offset as usize;
      vertex_data[start..start + size].copy_from_slice(&bytemuck::bytes_of(value)[..size]);
    }
  }

  fn has_translucent_vertex(mesh: &HalaMesh, min_vertex: u32, vertex_count: u32) -> bool {
    let range = min_vertex as usize..(min_vertex + vertex_count) as usize;
    mesh.colors()
      .and_then(|colors| colors.get(range))
      .map(|colors| colors.iter().any(|color| color[3] < 255))
      .unwrap_or(false)
  }

  /// Queue the acceleration structure build of a fresh instance.
  /// A failed request leaves the instance usable for rasterization.
  fn request_acceleration_structure(
    ctx: &HalaRenderContext,
    instance: &HalaGpuInstance,
    name: &str,
  ) -> Option<crate::gfx::HalaAccelerationStructureHandle> {
    if !ctx.config.build_acceleration_structures {
      return None;
    }
    let builder = ctx.acceleration_structure_builder.as_ref()?;

    let desc = HalaAccelerationStructureBuildDesc {
      vertex_buffer: instance.vertex_buffer.handle,
      index_buffer: instance.index_buffer.handle,
      vertex_stride: instance.layout.stride,
      sub_meshes: instance.sub_meshes.iter().map(|sub_mesh| sub_mesh.range()).collect(),
      debug_name: format!("{}.blas", name),
    };
    match builder.build(&desc) {
      Ok(handle) => Some(handle),
      Err(err) => {
        log::warn!("Build the acceleration structure of the mesh \"{}\" failed: {}", name, err);
        None
      },
    }
  }
}
