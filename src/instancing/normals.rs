use glam::Vec3;
use rayon::prelude::*;

use crate::error::HalaRendererError;

/// Synthesize smooth per-vertex normals from index triples.
/// Each triangle adds its unnormalized face normal to its three vertices, so larger faces
/// weigh more. Vertices outside every triangle end up with a zero normal.
/// param positions: The vertex positions.
/// param indices: The indices, taken three at a time.
/// return: The unit length normals.
pub fn synthesize_normals(positions: &[Vec3], indices: &[u32]) -> Result<Vec<Vec3>, HalaRendererError> {
  if indices.len() < 3 {
    return Err(HalaRendererError::new(
      &format!("Can NOT synthesize normals from {} indices, at least one triangle is required.", indices.len()),
      None,
    ));
  }
  if indices.len() % 3 != 0 {
    log::warn!("{} trailing indices do not form a triangle and are skipped for normals.", indices.len() % 3);
  }

  let mut normals = vec![Vec3::ZERO; positions.len()];
  for triangle in indices.chunks_exact(3) {
    let (a, b, c) = (triangle[0] as usize, triangle[1] as usize, triangle[2] as usize);
    let max = a.max(b).max(c);
    if max >= positions.len() {
      return Err(HalaRendererError::new(
        &format!("The index {} is out of the {} vertices.", max, positions.len()),
        None,
      ));
    }

    let normal = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
    normals[a] += normal;
    normals[b] += normal;
    normals[c] += normal;
  }

  normals.par_iter_mut().for_each(|normal| {
    *normal = normal.normalize_or_zero();
  });

  Ok(normals)
}
