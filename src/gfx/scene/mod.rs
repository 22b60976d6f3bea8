//! # Scene Management Module
//!
//! An ordered registry of drawable objects. Registry order is draw order, so
//! transparent objects can be moved after opaque ones with
//! [`Scene::render_last`] and friends.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn demo(engine: &sketch_engine::engine::Engine, program: std::rc::Rc<sketch_engine::gfx::Program>) {
//! use sketch_engine::gfx::scene::{Scene, SceneConfig};
//!
//! let mut scene = Scene::new(engine, program, SceneConfig::default());
//! scene.load("/geometry/plane.json", Some("plane"), None).await.ok();
//! scene.render_last("plane");
//! # }
//! ```

pub mod drawable;
#[allow(clippy::module_inception)]
pub mod scene;

// Re-export main types
pub use drawable::{DrawableObject, GeometryDesc, GpuHandles, Material, ObjectAttributes, ObjectId};
pub use scene::{Scene, SceneConfig};
