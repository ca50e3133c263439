use crate::scene::cpu::HalaMesh;

/// The maximum number of texture coordinate sets a layout can carry.
pub const MAX_TEX_COORD_SETS: usize = 8;

/// The semantic of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalaVertexAttributeSemantic {
  Position,
  Normal,
  Color,
  TexCoord(u8),
}

/// The implementation of the vertex attribute semantic.
impl HalaVertexAttributeSemantic {

  /// The shader input location of the semantic.
  /// Locations 3 and 4 are kept for skinning weights and indices.
  pub fn location(&self) -> u32 {
    match self {
      Self::Position => 0,
      Self::Normal => 1,
      Self::Color => 2,
      Self::TexCoord(set) => 5 + *set as u32,
    }
  }

  /// The number of float components.
  pub fn component_count(&self) -> u32 {
    match self {
      Self::Position | Self::Normal => 3,
      Self::Color => 4,
      Self::TexCoord(_) => 2,
    }
  }
}

/// One attribute of an interleaved vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalaVertexAttributeDesc {
  pub semantic: HalaVertexAttributeSemantic,
  pub location: u32,
  pub component_count: u32,
  pub offset: u32,
  pub stride: u32,
}

/// The implementation of the vertex attribute description.
impl HalaVertexAttributeDesc {

  /// The size of the attribute in bytes.
  pub fn size(&self) -> u32 {
    self.component_count * std::mem::size_of::<f32>() as u32
  }
}

/// The feature set a layout is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalaVertexLayoutFeatures {
  pub has_prelight: bool,
  pub num_tex_coord_sets: u32,
}

/// The implementation of the vertex layout features.
impl HalaVertexLayoutFeatures {

  /// Derive the features of a mesh.
  /// param mesh: The mesh.
  /// param force_prelight: Always lay out a color stream.
  /// return: The features.
  pub fn from_mesh(mesh: &HalaMesh, force_prelight: bool) -> Self {
    let num_tex_coord_sets = mesh.tex_coord_sets().len();
    if num_tex_coord_sets > MAX_TEX_COORD_SETS {
      log::warn!(
        "The mesh \"{}\" has {} texture coordinate sets, only the first {} will be instanced.",
        mesh.name, num_tex_coord_sets, MAX_TEX_COORD_SETS
      );
    }
    Self {
      has_prelight: force_prelight || mesh.colors().is_some(),
      num_tex_coord_sets: num_tex_coord_sets.min(MAX_TEX_COORD_SETS) as u32,
    }
  }

  /// The features a layout is actually built with: one to eight texture coordinate sets.
  pub fn normalized(&self) -> Self {
    Self {
      num_tex_coord_sets: self.num_tex_coord_sets.clamp(1, MAX_TEX_COORD_SETS as u32),
      ..*self
    }
  }
}

/// The interleaved vertex layout of a GPU instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalaVertexLayout {
  pub features: HalaVertexLayoutFeatures,
  pub attributes: Vec<HalaVertexAttributeDesc>,
  pub stride: u32,
}

/// The implementation of the vertex layout.
impl HalaVertexLayout {

  /// Build the layout: position, normal, optional color, then one entry per texture
  /// coordinate set, with at least one set.
  /// param features: The features.
  /// return: The layout.
  pub fn build(features: HalaVertexLayoutFeatures) -> Self {
    let features = features.normalized();
    let num_tex_coord_sets = features.num_tex_coord_sets;

    let mut semantics = vec![
      HalaVertexAttributeSemantic::Position,
      HalaVertexAttributeSemantic::Normal,
    ];
    if features.has_prelight {
      semantics.push(HalaVertexAttributeSemantic::Color);
    }
    semantics.extend((0..num_tex_coord_sets).map(|set| HalaVertexAttributeSemantic::TexCoord(set as u8)));

    let mut stride = 0u32;
    let mut attributes = Vec::with_capacity(semantics.len());
    for semantic in semantics {
      let component_count = semantic.component_count();
      attributes.push(HalaVertexAttributeDesc {
        semantic,
        location: semantic.location(),
        component_count,
        offset: stride,
        stride: 0,
      });
      stride += component_count * std::mem::size_of::<f32>() as u32;
    }
    for attribute in attributes.iter_mut() {
      attribute.stride = stride;
    }

    Self {
      features,
      attributes,
      stride,
    }
  }

  /// Find the attribute of a semantic.
  /// param semantic: The semantic.
  /// return: The attribute or None if the layout does not carry it.
  pub fn find(&self, semantic: HalaVertexAttributeSemantic) -> Option<&HalaVertexAttributeDesc> {
    self.attributes.iter().find(|attribute| attribute.semantic == semantic)
  }
}
