//! Read-only snapshots of simulation state.
//!
//! [`RenderSnapshot`] is a serializable view of the exposed surface for a
//! display shell: one entry per cube that currently has at least one exposed
//! face, with its position, face count, and fragment tag. The face count is
//! recomputed here and cached on the cubes for render coloring. The
//! (cubes removed, exposed faces) time series and the normalized plot series
//! recorded during `consume` are drained through the same module.

use serde::{Deserialize, Serialize};

use crate::model::CubeModel;

/// One point of the surface-area time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSample {
    /// Cubes consumed so far.
    pub cubes_removed: u64,
    /// Exposed faces at that moment.
    pub exposed_faces: u64,
}

/// One normalized point of the live-plot series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    /// Removed cubes over initial volume, in [0, 1].
    pub removed_fraction: f64,
    /// Exposed faces over the initial surface area, in [0, 1].
    pub surface_fraction: f64,
}

/// One surface cube of a render snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceCube {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    /// Exposed faces of this cube.
    pub faces: u8,
    /// Fragment label from the last detection pass.
    pub fragment: u32,
    /// Size of that fragment, when known.
    pub fragment_size: u32,
}

/// Snapshot of the exposed surface plus run totals, for rendering and for
/// line-oriented dumps written by the shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub volume: u64,
    pub surface_area: u64,
    pub initial_volume: u64,
    pub removed: u64,
    pub cubes: Vec<SurfaceCube>,
}

impl RenderSnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl CubeModel {
    /// Build a render snapshot of the current surface.
    ///
    /// A cube appears once however many of its faces are exposed; the
    /// per-cube face count is rebuilt from the exposure index as a side
    /// effect (it is a display cache, not authoritative state).
    pub fn render_snapshot(&mut self) -> RenderSnapshot {
        let mut uniques: Vec<usize> = Vec::new();
        {
            let grid = &mut self.grid;
            let exposed = &self.exposed;
            for &key in exposed.as_slice() {
                grid.cube_mut(key.offset()).set_face_count(0);
            }
            for &key in exposed.as_slice() {
                let cube = grid.cube_mut(key.offset());
                let count = cube.face_count();
                cube.set_face_count(count + 1);
                if count == 0 {
                    uniques.push(key.offset());
                }
            }
        }

        let cubes = uniques
            .into_iter()
            .map(|offset| {
                let cube = self.grid.cube(offset);
                let (x, y, z) = self.grid.pos(offset);
                let fragment = cube.fragment();
                let fragment_size = self
                    .fragment_sizes
                    .get(fragment as usize)
                    .copied()
                    .unwrap_or(0);
                SurfaceCube {
                    x: x as u32,
                    y: y as u32,
                    z: z as u32,
                    faces: cube.face_count(),
                    fragment,
                    fragment_size,
                }
            })
            .collect();

        RenderSnapshot {
            volume: self.volume(),
            surface_area: self.surface_area(),
            initial_volume: self.initial_volume(),
            removed: self.removed_count(),
            cubes,
        }
    }

    /// Drain the recorded surface-area series. The shell formats each sample
    /// as one `cubes_removed,exposed_faces` line.
    pub fn take_samples(&mut self) -> Vec<SurfaceSample> {
        std::mem::take(&mut self.samples)
    }

    /// The normalized plot series recorded so far.
    pub fn plot_points(&self) -> &[PlotPoint] {
        &self.plot
    }

    /// Forget the recorded plot series.
    pub fn clear_plot_points(&mut self) {
        self.plot.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SimParams;
    use crate::model::CubeModel;

    fn model(dim: u32) -> CubeModel {
        CubeModel::new(SimParams {
            xdim: dim,
            ydim: dim,
            zdim: dim,
            seed: Some(71),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_snapshot_covers_every_surface_cube_once() {
        let mut m = model(4);
        let snapshot = m.render_snapshot();
        // 4x4x4 cuboid: everything but the 2x2x2 core is on the surface.
        assert_eq!(snapshot.cubes.len(), 64 - 8);
        assert_eq!(snapshot.volume, 64);
        assert_eq!(snapshot.surface_area, 96);

        let mut seen = std::collections::HashSet::new();
        for cube in &snapshot.cubes {
            assert!(seen.insert((cube.x, cube.y, cube.z)));
        }
    }

    #[test]
    fn test_face_counts_match_exposure() {
        let mut m = model(3);
        let snapshot = m.render_snapshot();
        let total: u64 = snapshot.cubes.iter().map(|c| c.faces as u64).sum();
        assert_eq!(total, snapshot.surface_area);

        for cube in &snapshot.cubes {
            let expected = m
                .grid
                .at(cube.x as usize, cube.y as usize, cube.z as usize)
                .exposed_count() as u8;
            assert_eq!(cube.faces, expected);
        }
        // Corner cubes expose three faces, face-center cubes one.
        let corner = snapshot
            .cubes
            .iter()
            .find(|c| (c.x, c.y, c.z) == (0, 0, 0))
            .unwrap();
        assert_eq!(corner.faces, 3);
        let center = snapshot
            .cubes
            .iter()
            .find(|c| (c.x, c.y, c.z) == (1, 1, 0))
            .unwrap();
        assert_eq!(center.faces, 1);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let mut m = model(2);
        let json = m.render_snapshot().to_json().unwrap();
        assert!(json.contains("\"volume\":8"));
        assert!(json.contains("\"cubes\""));
        let back: crate::RenderSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cubes.len(), 8);
    }

    #[test]
    fn test_snapshot_reflects_fragments() {
        let mut m = model(5);
        for y in 0..5 {
            for x in 0..5 {
                m.remove_at(x, y, 2);
            }
        }
        m.detect_fragments();
        let snapshot = m.render_snapshot();
        for cube in &snapshot.cubes {
            assert_ne!(cube.fragment, 0);
            assert_eq!(cube.fragment_size, 50);
        }
    }
}
