//! Porosim - Voxel Erosion Core
//!
//! Simulates progressive consumption of a solid 3D object represented as a
//! dense grid of unit cubes: cubes are removed one (or a pore-sized
//! neighborhood) at a time from the exposed surface, surface area is tracked
//! with O(1) bookkeeping per removal, disconnected fragments are detected
//! and optionally discarded, and randomly packed sub-particle aggregates can
//! serve as the initial fill. Rendering, plotting, and file output belong to
//! an external shell, which drives the kernel through bounded stepping
//! calls, a message callback, and read-only snapshots.
//!
//! # Example
//!
//! ```
//! use porosim::{CubeModel, SimParams};
//!
//! let params = SimParams {
//!     xdim: 10,
//!     ydim: 10,
//!     zdim: 10,
//!     seed: Some(1),
//!     ..Default::default()
//! };
//! let mut model = CubeModel::new(params).unwrap();
//!
//! // Erode to completion, pausing at each reporting increment.
//! let mut threshold = model.params().output_inc;
//! while model.consume(&mut threshold).more {
//!     threshold += model.params().output_inc;
//! }
//! assert_eq!(model.volume(), 0);
//! ```

pub mod aggregate;
pub mod config;
pub mod cube;
pub mod erode;
pub mod fragment;
pub mod grid;
pub mod index;
pub mod model;
pub mod profiler;
pub mod replace;
pub mod rng;
pub mod shape;
pub mod snapshot;

pub use aggregate::{Aggregate, Particle};
pub use config::{Connectivity, SimParams};
pub use cube::Cube;
pub use grid::Grid;
pub use index::{ActiveCubes, ExposedFaces, FaceKey};
pub use model::{CubeModel, MessageSink, Progress, SharedModel};
pub use profiler::Profiler;
pub use rng::XorShift64;
pub use snapshot::{PlotPoint, RenderSnapshot, SurfaceCube, SurfaceSample};

use thiserror::Error;

/// Errors from model construction.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// A grid dimension is zero.
    #[error("invalid grid dimensions {0}x{1}x{2}")]
    InvalidDimensions(u32, u32, u32),

    /// The grid would not fit in the address space.
    #[error("grid of {0} cells exceeds addressable space")]
    GridTooLarge(u128),

    /// Aggregate fill requested with a zero particle diameter.
    #[error("aggregate particle size must be nonzero")]
    InvalidParticleSize,

    /// Shape generation produced no cubes.
    #[error("generated shape is empty")]
    EmptyShape,

    /// An imported point list was empty.
    #[error("imported point list is empty")]
    EmptyImport,
}
