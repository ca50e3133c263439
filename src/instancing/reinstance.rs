use crate::context::HalaRenderContext;
use crate::error::HalaRendererError;
use crate::scene::cpu::{
  HalaDirtyFlags,
  HalaMesh,
};
use crate::scene::gpu::HalaInstanceSlot;
use super::instancer::HalaGeometryInstancer;
use super::layout::HalaVertexLayoutFeatures;

/// What has to happen to the GPU instance of a mesh before it can be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalaReinstanceAction {
  /// The mesh has never been instanced.
  Build,
  /// The topology or the layout changed, the instance is replaced.
  Rebuild,
  /// Only the given streams changed.
  Refresh(HalaDirtyFlags),
  Keep,
}

/// The implementation of the reinstance action.
impl HalaReinstanceAction {

  /// Decide the action for a mesh from its instance and its locks.
  /// param mesh: The mesh.
  /// param force_prelight: Whether color streams are always laid out.
  /// return: The action.
  pub fn decide(mesh: &HalaMesh, force_prelight: bool) -> Self {
    let instance = match mesh.instance() {
      HalaInstanceSlot::NotInstanced => return Self::Build,
      HalaInstanceSlot::Instanced(instance) => instance,
    };

    if instance.serial_number != mesh.serial_number()
      || instance.num_vertices as usize != mesh.num_vertices()
      || HalaVertexLayoutFeatures::from_mesh(mesh, force_prelight).normalized() != instance.layout.features
    {
      return Self::Rebuild;
    }

    let dirty = mesh.locked_since_instance();
    if dirty.is_empty() {
      Self::Keep
    } else {
      Self::Refresh(dirty)
    }
  }
}

/// Drives the GPU instance of a mesh through build, rebuild and refresh.
pub struct HalaReinstanceStateMachine;

/// The implementation of the reinstance state machine.
impl HalaReinstanceStateMachine {

  /// Bring the GPU instance of the mesh up to date.
  /// On failure the mesh keeps its previous instance and its locks.
  /// param ctx: The render context.
  /// param mesh: The mesh.
  /// return: The action taken.
  pub fn update(ctx: &mut HalaRenderContext, mesh: &mut HalaMesh) -> Result<HalaReinstanceAction, HalaRendererError> {
    let action = HalaReinstanceAction::decide(mesh, ctx.config.force_prelight);
    match action {
      HalaReinstanceAction::Build | HalaReinstanceAction::Rebuild => {
        let instance = HalaGeometryInstancer::instance(ctx, mesh)?;
        // The previous instance and its buffers are dropped here.
        mesh.instance = HalaInstanceSlot::Instanced(instance);
      },
      HalaReinstanceAction::Refresh(dirty) => {
        let mut slot = mesh.instance.take();
        let result = match &mut slot {
          HalaInstanceSlot::Instanced(instance) => HalaGeometryInstancer::refresh(mesh, instance, dirty),
          HalaInstanceSlot::NotInstanced => Ok(()),
        };
        mesh.instance = slot;
        result?;
      },
      HalaReinstanceAction::Keep => {},
    }
    mesh.clear_locks();

    log::debug!("The mesh \"{}\" reinstance action: {:?}.", mesh.name, action);
    Ok(action)
  }
}
