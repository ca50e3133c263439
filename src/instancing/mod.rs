pub mod layout;
pub mod normals;
pub mod instancer;
pub mod reinstance;

pub use layout::{
  MAX_TEX_COORD_SETS,
  HalaVertexAttributeDesc,
  HalaVertexAttributeSemantic,
  HalaVertexLayout,
  HalaVertexLayoutFeatures,
};
pub use normals::synthesize_normals;
pub use instancer::HalaGeometryInstancer;
pub use reinstance::{
  HalaReinstanceAction,
  HalaReinstanceStateMachine,
};
