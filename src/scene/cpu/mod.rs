pub mod material;
pub mod mesh;
pub mod light;

pub use material::{HalaMaterial, HalaSurfaceProperties};
pub use mesh::{HalaMesh, HalaSubMesh, HalaMeshFlags, HalaDirtyFlags};
pub use light::{HalaLight, HalaLightType};
