pub mod prelude;
pub mod error;
pub mod config;
pub mod gfx;
pub mod scene;
pub mod instancing;
pub mod render_state;
pub mod draw;
pub mod obj_pipeline;
pub mod context;

#[cfg(test)]
pub(crate) mod testing;
