pub mod cache;
pub mod pipeline_cache;

pub use cache::{
  HalaAlphaTest,
  HalaAlphaTestFunc,
  HalaFlushedUniforms,
  HalaFogParams,
  HalaLightSet,
  HalaLightingFlags,
  HalaMaterialState,
  HalaRenderStateCache,
  HalaRenderStatistics,
};
pub use pipeline_cache::HalaPipelineSelector;
