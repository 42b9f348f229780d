//! CPU-side mesh data and procedural generators.

mod data;
pub mod generators;

pub use data::{CpuMesh, Vertex};
pub use generators::{generate_cube, generate_plane, generate_quad, generate_sphere};
