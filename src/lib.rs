//! cab-viewer
//!
//! An interactive 3D product viewer for the CAB vehicle that runs natively and
//! in the browser. Model parts are declared in a registry, loaded from glTF,
//! and assembled into one scene; the door part opens and closes on pointer
//! interaction while its indicator lights follow the door's state.
//!
//! High-level modules
//! - `registry`: the declarative list of model parts and their material overrides
//! - `resources`: asset fetching, glTF parsing and the model loader
//! - `data_structures`: scene graph, transforms, materials, animation drivers, button panel
//! - `door`: the door state machine
//! - `pick`: pointer routing and CPU ray picking
//! - `indicator`: door indicator light colours
//! - `camera`: camera, projection, orbit controls and picking rays
//! - `viewer`: the application context tying the above together per frame
//!
//! With the `host` feature:
//! - `context`: central GPU and window context that owns device/queue/surface
//! - `render`: mirrors the scene graph into GPU buffers and draws it
//! - `pipelines`: render pipeline definitions
//! - `flow`: the winit event loop driving a [`viewer::Viewer`]

pub mod camera;
pub mod config;
pub mod data_structures;
pub mod door;
pub mod indicator;
pub mod pick;
pub mod registry;
pub mod resources;
pub mod viewer;

#[cfg(feature = "host")]
pub mod context;
#[cfg(feature = "host")]
pub mod flow;
#[cfg(feature = "host")]
pub mod pipelines;
#[cfg(feature = "host")]
pub mod render;

// Re-exports commonly used types for convenience in downstream code.
pub use config::ViewerConfig;
pub use door::{DoorState, Interaction};
pub use instant::Duration;
pub use registry::{ModelDescriptor, Variant};
pub use viewer::Viewer;
