pub mod mesh;

pub use mesh::{HalaGpuInstance, HalaSubMeshInstance, HalaInstanceSlot};
