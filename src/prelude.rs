pub use crate::error::HalaRendererError;
pub use crate::config::{
  HalaDefaultShaders,
  HalaRetainedConfig,
};
pub use crate::gfx::{
  HalaAccelerationStructureBuildDesc,
  HalaAccelerationStructureBuilder,
  HalaAccelerationStructureHandle,
  HalaBlendDepthState,
  HalaBuffer,
  HalaBufferHandle,
  HalaBufferUsageFlags,
  HalaDescriptorSetHandle,
  HalaGfxDevice,
  HalaGfxError,
  HalaIndexedDraw,
  HalaPipelineDesc,
  HalaPipelineHandle,
  HalaPrimitiveTopology,
  HalaShaderId,
  HalaSubMeshRange,
  HalaTextureHandle,
  HalaTextureProvider,
};
pub use crate::scene::cpu::{
  HalaDirtyFlags,
  HalaLight,
  HalaLightType,
  HalaMaterial,
  HalaMesh,
  HalaMeshFlags,
  HalaSubMesh,
  HalaSurfaceProperties,
};
pub use crate::scene::gpu::{
  HalaGpuInstance,
  HalaInstanceSlot,
  HalaSubMeshInstance,
};
pub use crate::instancing::{
  HalaGeometryInstancer,
  HalaReinstanceAction,
  HalaReinstanceStateMachine,
  HalaVertexAttributeDesc,
  HalaVertexAttributeSemantic,
  HalaVertexLayout,
  HalaVertexLayoutFeatures,
};
pub use crate::render_state::{
  HalaAlphaTest,
  HalaAlphaTestFunc,
  HalaFlushedUniforms,
  HalaFogParams,
  HalaLightSet,
  HalaLightingFlags,
  HalaMaterialState,
  HalaPipelineSelector,
  HalaRenderStateCache,
  HalaRenderStatistics,
};
pub use crate::draw::{
  HalaDrawDispatcher,
  HalaDrawPath,
};
pub use crate::obj_pipeline::{
  HalaDrawObject,
  HalaObjPipeline,
  HalaObjPipelineHooks,
  HalaObjPipelineKind,
};
pub use crate::context::HalaRenderContext;
