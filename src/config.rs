//! Simulation configuration.
//!
//! All knobs for one run are collected in [`SimParams`]; the shell fills it
//! in (from its option parser or config file) and hands it to
//! [`crate::CubeModel::new`]. Grid size is fixed for the lifetime of a run.

use serde::{Deserialize, Serialize};

/// Neighbor adjacency used by fragment detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// Face adjacency (6 neighbors).
    #[default]
    Faces,
    /// Face + edge adjacency (18 neighbors).
    Edges,
    /// Face + edge + vertex adjacency (26 neighbors).
    Vertices,
}

impl Connectivity {
    /// Number of neighbors per cell under this adjacency.
    pub fn degree(self) -> usize {
        match self {
            Connectivity::Faces => 6,
            Connectivity::Edges => 18,
            Connectivity::Vertices => 26,
        }
    }
}

/// Configuration parameters for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    /// Cuboid solid when true, ellipsoid otherwise.
    pub cuboid: bool,
    pub xdim: u32,
    pub ydim: u32,
    pub zdim: u32,

    // Porosity control
    /// Fraction of the initial volume carved out as pores before consuming.
    pub porosity: f64,
    /// Pore edge length (or upper bound when `pore_is_fixed` is false).
    pub pore_size: u32,
    /// Fixed pore size when true, uniformly random in [1, pore_size] otherwise.
    pub pore_is_fixed: bool,
    /// Axis-aligned cubic pores when true, spherical otherwise.
    pub pore_is_cuboid: bool,
    /// Replace overshot cubes after pore carving so the final volume exactly
    /// matches the requested porosity.
    pub with_replacement: bool,
    /// Consume by picking any active cube, ignoring surface exposure.
    /// Exploratory mode; surface area is then reported by recount.
    pub naive_removal: bool,

    // Aggregate control
    /// Fill the container with packed sub-particles instead of a solid.
    pub aggregate_enable: bool,
    /// Sub-particle diameter in cells.
    pub particle_size: u32,
    /// Restore cubes lost to particle overlap after aggregate stamping.
    pub replace_enable: bool,

    // Data output control
    /// Reporting increment for `consume`, as a fraction of initial volume.
    pub output_inc: f64,
    /// Fraction of the run after which the shell stops consuming.
    pub output_end: f64,
    /// Record every n-th removal in the surface-area series.
    pub output_subsample: u64,
    /// Record (cubes removed, exposed faces) samples during `consume`.
    pub record_samples: bool,
    /// Record normalized plot points during `consume`.
    pub record_plot: bool,

    // Fragment control
    /// Adjacency used when labeling fragments.
    pub connectivity: Connectivity,

    /// PRNG seed; `None` seeds from the system clock.
    pub seed: Option<u64>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            cuboid: true,
            xdim: 50,
            ydim: 50,
            zdim: 50,
            porosity: 0.0,
            pore_size: 3,
            pore_is_fixed: true,
            pore_is_cuboid: true,
            with_replacement: true,
            naive_removal: false,
            aggregate_enable: false,
            particle_size: 20,
            replace_enable: true,
            output_inc: 0.05,
            output_end: 1.0,
            output_subsample: 1,
            record_samples: false,
            record_plot: false,
            connectivity: Connectivity::Faces,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SimParams::default();
        assert!(params.cuboid);
        assert_eq!((params.xdim, params.ydim, params.zdim), (50, 50, 50));
        assert_eq!(params.porosity, 0.0);
        assert_eq!(params.connectivity.degree(), 6);
    }

    #[test]
    fn test_serde_roundtrip() {
        let params = SimParams {
            porosity: 0.3,
            connectivity: Connectivity::Vertices,
            seed: Some(42),
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: SimParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.porosity, 0.3);
        assert_eq!(back.connectivity, Connectivity::Vertices);
        assert_eq!(back.seed, Some(42));
    }
}
