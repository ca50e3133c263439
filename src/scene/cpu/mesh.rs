use std::rc::Rc;

use glam::{
  Vec2,
  Vec3,
};

use crate::instancing::layout::MAX_TEX_COORD_SETS;
use crate::scene::gpu::HalaInstanceSlot;
use super::material::HalaMaterial;

/// The mesh flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HalaMeshFlags(u32);
impl HalaMeshFlags {
  pub const NONE: Self = Self(0);
  /// The indices form a triangle strip.
  pub const TRISTRIP: Self = Self(0x1);
  /// Material colors tint the mesh. Without it the tint is opaque white.
  pub const MODULATE: Self = Self(0x40);
  /// The mesh carries platform native data and is never instanced here.
  pub const NATIVE: Self = Self(0x0100_0000);

  pub fn contains(&self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  pub fn bits(&self) -> u32 {
    self.0
  }
}

impl std::ops::BitOr for HalaMeshFlags {
  type Output = Self;
  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

/// Which vertex streams changed since the mesh was last instanced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HalaDirtyFlags {
  pub positions: bool,
  pub normals: bool,
  pub colors: bool,
  pub tex_coords: [bool; MAX_TEX_COORD_SETS],
}

/// The implementation of the dirty flags.
impl HalaDirtyFlags {

  pub fn none() -> Self {
    Self::default()
  }

  pub fn all() -> Self {
    Self {
      positions: true,
      normals: true,
      colors: true,
      tex_coords: [true; MAX_TEX_COORD_SETS],
    }
  }

  pub fn positions() -> Self {
    Self { positions: true, ..Self::default() }
  }

  pub fn normals() -> Self {
    Self { normals: true, ..Self::default() }
  }

  pub fn colors() -> Self {
    Self { colors: true, ..Self::default() }
  }

  /// Dirty flags for one texture coordinate set.
  /// param set: The texture coordinate set index.
  /// return: The dirty flags.
  pub fn tex_coords(set: usize) -> Self {
    let mut flags = Self::default();
    if set < MAX_TEX_COORD_SETS {
      flags.tex_coords[set] = true;
    }
    flags
  }

  pub fn is_empty(&self) -> bool {
    !self.positions && !self.normals && !self.colors && !self.tex_coords.iter().any(|&dirty| dirty)
  }

  pub fn union(&self, other: &Self) -> Self {
    let mut tex_coords = self.tex_coords;
    for (dirty, other) in tex_coords.iter_mut().zip(other.tex_coords.iter()) {
      *dirty |= *other;
    }
    Self {
      positions: self.positions || other.positions,
      normals: self.normals || other.normals,
      colors: self.colors || other.colors,
      tex_coords,
    }
  }
}

/// A sub-mesh is a range of indices sharing one material.
#[derive(Debug, Clone)]
pub struct HalaSubMesh {
  pub indices: Vec<u32>,
  pub material: Rc<HalaMaterial>,
}

/// The implementation of the sub-mesh.
impl HalaSubMesh {

  pub fn new(indices: Vec<u32>, material: Rc<HalaMaterial>) -> Self {
    Self { indices, material }
  }

  /// Find the minimum referenced vertex and the number of vertices up to the maximum one.
  /// return: (min vertex, vertex count) or None if there are no indices.
  pub fn vertex_range(&self) -> Option<(u32, u32)> {
    let min = *self.indices.iter().min()?;
    let max = *self.indices.iter().max()?;
    Some((min, max - min + 1))
  }
}

/// A mesh is the platform neutral geometry that gets instanced on the GPU.
pub struct HalaMesh {
  pub name: String,
  pub flags: HalaMeshFlags,
  positions: Vec<Vec3>,
  normals: Option<Vec<Vec3>>,
  colors: Option<Vec<[u8; 4]>>,
  tex_coord_sets: Vec<Vec<Vec2>>,
  sub_meshes: Vec<HalaSubMesh>,

  serial_number: u32,
  locked_since_instance: HalaDirtyFlags,
  pub(crate) instance: HalaInstanceSlot,
}

/// The Drop implementation of the mesh.
impl Drop for HalaMesh {
  fn drop(&mut self) {
    log::debug!("A HalaMesh \"{}\" is dropped.", self.name);
  }
}

/// The implementation of the mesh.
impl HalaMesh {

  /// Create a new mesh.
  /// param name: The name of the mesh.
  /// param positions: The vertex positions.
  /// param sub_meshes: The sub-meshes.
  /// return: The mesh.
  pub fn new(name: &str, positions: Vec<Vec3>, sub_meshes: Vec<HalaSubMesh>) -> Self {
    Self {
      name: name.to_string(),
      flags: HalaMeshFlags::NONE,
      positions,
      normals: None,
      colors: None,
      tex_coord_sets: Vec::new(),
      sub_meshes,
      serial_number: 0,
      locked_since_instance: HalaDirtyFlags::none(),
      instance: HalaInstanceSlot::NotInstanced,
    }
  }

  pub fn with_flags(mut self, flags: HalaMeshFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
    self.normals = Some(normals);
    self
  }

  pub fn with_colors(mut self, colors: Vec<[u8; 4]>) -> Self {
    self.colors = Some(colors);
    self
  }

  pub fn with_tex_coords(mut self, tex_coords: Vec<Vec2>) -> Self {
    self.tex_coord_sets.push(tex_coords);
    self
  }

  pub fn positions(&self) -> &[Vec3] {
    &self.positions
  }

  pub fn normals(&self) -> Option<&[Vec3]> {
    self.normals.as_deref()
  }

  pub fn colors(&self) -> Option<&[[u8; 4]]> {
    self.colors.as_deref()
  }

  pub fn tex_coord_sets(&self) -> &[Vec<Vec2>] {
    &self.tex_coord_sets
  }

  pub fn sub_meshes(&self) -> &[HalaSubMesh] {
    &self.sub_meshes
  }

  pub fn num_vertices(&self) -> usize {
    self.positions.len()
  }

  pub fn total_indices(&self) -> usize {
    self.sub_meshes.iter().map(|sub_mesh| sub_mesh.indices.len()).sum()
  }

  pub fn has_normals(&self) -> bool {
    self.normals.is_some()
  }

  /// The topology version. Any change to it forces a full rebuild of the GPU instance.
  pub fn serial_number(&self) -> u32 {
    self.serial_number
  }

  pub fn locked_since_instance(&self) -> HalaDirtyFlags {
    self.locked_since_instance
  }

  pub fn instance(&self) -> &HalaInstanceSlot {
    &self.instance
  }

  /// Mark streams as changed without touching them.
  /// param flags: The changed streams.
  pub fn lock(&mut self, flags: HalaDirtyFlags) {
    self.locked_since_instance = self.locked_since_instance.union(&flags);
  }

  pub fn lock_positions(&mut self) -> &mut Vec<Vec3> {
    self.lock(HalaDirtyFlags::positions());
    &mut self.positions
  }

  /// Lock the authored normals.
  /// Synthesized normals follow the positions, so a mesh without authored normals gives None.
  /// return: The normals or None if the mesh has no authored normals.
  pub fn lock_normals(&mut self) -> Option<&mut Vec<Vec3>> {
    if self.normals.is_none() {
      return None;
    }
    self.lock(HalaDirtyFlags::normals());
    self.normals.as_mut()
  }

  /// Lock the vertex colors. Adding colors to a mesh without them changes its layout.
  pub fn lock_colors(&mut self) -> &mut Vec<[u8; 4]> {
    self.lock(HalaDirtyFlags::colors());
    let num_vertices = self.positions.len();
    self.colors.get_or_insert_with(|| vec![[255, 255, 255, 255]; num_vertices])
  }

  /// Lock one texture coordinate set.
  /// param set: The set index.
  /// return: The coordinates or None if the set does not exist.
  pub fn lock_tex_coords(&mut self, set: usize) -> Option<&mut Vec<Vec2>> {
    if set >= self.tex_coord_sets.len() {
      return None;
    }
    self.lock(HalaDirtyFlags::tex_coords(set));
    self.tex_coord_sets.get_mut(set)
  }

  /// Replace the sub-meshes. This is a topology change.
  /// param sub_meshes: The new sub-meshes.
  pub fn set_sub_meshes(&mut self, sub_meshes: Vec<HalaSubMesh>) {
    self.sub_meshes = sub_meshes;
    self.bump_serial_number();
  }

  pub fn bump_serial_number(&mut self) {
    self.serial_number = self.serial_number.wrapping_add(1);
  }

  pub(crate) fn clear_locks(&mut self) {
    self.locked_since_instance = HalaDirtyFlags::none();
  }
}
