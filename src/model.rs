//! Model container and public API.
//!
//! [`CubeModel`] owns the grid, both removable indices, the PRNG, and all
//! run statistics, providing a clean interface for:
//! - constructing a ready-to-erode solid (cuboid, ellipsoid, aggregate fill,
//!   or an imported point list)
//! - stepping the erosion/pore phases with progress reporting
//! - extracting render snapshots and data series
//!
//! The kernel itself is single threaded. A renderer that wants to read while
//! the kernel mutates wraps the model in [`SharedModel`] and takes
//! non-blocking snapshots, skipping a frame whenever the kernel holds the
//! lock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::SimParams;
use crate::grid::Grid;
use crate::index::{ActiveCubes, ExposedFaces, FaceKey};
use crate::rng::XorShift64;
use crate::snapshot::{PlotPoint, RenderSnapshot, SurfaceSample};
use crate::ModelError;

/// Callback receiving plain-text status messages. Fire-and-forget: the
/// kernel never waits on it.
pub type MessageSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Result of one bounded step of `consume`/`produce_pores`: whether another
/// call is needed, and how far along the phase is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// True while the phase has more work; false once it completed.
    pub more: bool,
    /// Completion percentage of the phase at the point of return.
    pub percent: u32,
}

/// The erosion simulation: a packed cube grid plus its exposure and
/// active-cube indices.
pub struct CubeModel {
    pub(crate) params: SimParams,
    pub(crate) grid: Grid,
    pub(crate) rng: XorShift64,

    pub(crate) exposed: ExposedFaces,
    pub(crate) active: ActiveCubes,
    /// Exposure keys of the freshly generated shape; forbids replacement
    /// cubes from growing past the original silhouette. Cleared once a
    /// replacement pass finishes.
    pub(crate) surface: HashSet<FaceKey>,

    pub(crate) fragments: HashMap<u32, Vec<usize>>,
    pub(crate) fragment_sizes: Vec<u32>,
    pub(crate) labels_in: Vec<bool>,
    pub(crate) labels_out: Vec<u32>,

    pub(crate) samples: Vec<SurfaceSample>,
    pub(crate) plot: Vec<PlotPoint>,
    pub(crate) last_sampled: Option<u64>,

    pub(crate) initial_volume: u64,
    pub(crate) initial_removed: u64,
    pub(crate) max_surface_area: u64,
    pub(crate) cubes_removed: u64,
    pub(crate) insert_collisions: u64,
    pub(crate) particles_generated: u64,

    pub(crate) stop: Arc<AtomicBool>,
    pub(crate) sink: Option<MessageSink>,
}

impl CubeModel {
    /// Build a ready-to-erode solid from `params`.
    pub fn new(params: SimParams) -> Result<Self, ModelError> {
        Self::build(params, None, None)
    }

    /// Build a solid with a status-message callback already installed, so
    /// generation-time messages (container volume, initial volume, aggregate
    /// shortfalls) reach the shell too.
    pub fn with_sink(
        params: SimParams,
        sink: impl Fn(&str) + Send + Sync + 'static,
    ) -> Result<Self, ModelError> {
        Self::build(params, None, Some(Arc::new(sink)))
    }

    /// Build a solid from an externally supplied point list. The bounding
    /// box of the points is scaled to the grid dimensions and one cube is
    /// inserted per scaled point.
    pub fn from_points(params: SimParams, points: &[[f64; 3]]) -> Result<Self, ModelError> {
        if points.is_empty() {
            return Err(ModelError::EmptyImport);
        }
        Self::build(params, Some(points), None)
    }

    fn build(
        params: SimParams,
        points: Option<&[[f64; 3]]>,
        sink: Option<MessageSink>,
    ) -> Result<Self, ModelError> {
        if params.xdim == 0 || params.ydim == 0 || params.zdim == 0 {
            return Err(ModelError::InvalidDimensions(
                params.xdim,
                params.ydim,
                params.zdim,
            ));
        }
        let cells = params.xdim as u128 * params.ydim as u128 * params.zdim as u128;
        // Face keys carry the offset shifted up by 3 bits.
        if cells > (u64::MAX >> 3) as u128 || cells > usize::MAX as u128 {
            return Err(ModelError::GridTooLarge(cells));
        }
        if params.aggregate_enable && params.particle_size == 0 {
            return Err(ModelError::InvalidParticleSize);
        }

        let rng = match params.seed {
            Some(seed) => XorShift64::new(seed),
            None => XorShift64::from_entropy(),
        };
        let grid = Grid::new(params.xdim as usize, params.ydim as usize, params.zdim as usize);
        let grid_len = grid.len();

        let mut model = Self {
            params,
            grid,
            rng,
            exposed: ExposedFaces::new(),
            active: ActiveCubes::new(grid_len),
            surface: HashSet::new(),
            fragments: HashMap::new(),
            fragment_sizes: Vec::new(),
            labels_in: Vec::new(),
            labels_out: Vec::new(),
            samples: Vec::new(),
            plot: Vec::new(),
            last_sampled: None,
            initial_volume: 0,
            initial_removed: 0,
            max_surface_area: 0,
            cubes_removed: 0,
            insert_collisions: 0,
            particles_generated: 0,
            stop: Arc::new(AtomicBool::new(false)),
            sink,
        };

        if let Some(points) = points {
            model.import_points(points);
        } else if model.params.aggregate_enable {
            model.prefill_aggregate();
        } else if model.params.cuboid {
            model.generate_cuboid();
        } else {
            let x0 = (model.params.xdim as f64 / 2.0).round() as i64;
            let y0 = (model.params.ydim as f64 / 2.0).round() as i64;
            let z0 = (model.params.zdim as f64 / 2.0).round() as i64;
            let (w, h, d) = (model.params.xdim, model.params.ydim, model.params.zdim);
            model.generate_ellipsoid(x0, y0, z0, w, h, d, crate::shape::FillMode::Insert);
        }

        if model.initial_volume == 0 {
            return Err(ModelError::EmptyShape);
        }

        model.init_exposed_faces();
        model.setup_active();

        if model.params.aggregate_enable && model.params.replace_enable {
            model.send(&format!(
                "Initial Volume {} Total Cubes : Surface Area {}",
                model.initial_volume, model.max_surface_area
            ));
            let shortfall = model.insert_collisions;
            model.replace_cubes(shortfall, false);
            model.max_surface_area = model.exposed.len() as u64;
        }

        model.send(&format!(
            "Initial Volume {} Total Cubes : Surface Area {}",
            model.initial_volume, model.max_surface_area
        ));

        Ok(model)
    }

    /// Load the exposure index from the freshly generated grid and snapshot
    /// the original outer surface.
    fn init_exposed_faces(&mut self) {
        for offset in 0..self.grid.len() {
            if !self.grid.cube(offset).is_visible() {
                continue;
            }
            for face in 0..crate::cube::NUM_FACES {
                if self.grid.cube(offset).is_exposed(face) {
                    self.exposed.insert(FaceKey::new(offset, face));
                }
            }
        }
        self.surface = self.exposed.key_set();
        self.max_surface_area = self.surface.len() as u64;
    }

    /// Register every visible cube with the active index.
    fn setup_active(&mut self) {
        for offset in 0..self.grid.len() {
            if self.grid.cube(offset).is_visible() {
                self.active.insert(offset);
            }
        }
    }

    /// Set both a cube's face bit and its exposure index entry.
    #[inline]
    pub(crate) fn add_face(&mut self, offset: usize, face: usize) {
        self.grid.cube_mut(offset).set_face(face);
        self.exposed.insert(FaceKey::new(offset, face));
    }

    /// Dispatch a status message to the registered sink, if any.
    pub(crate) fn send(&self, text: &str) {
        if let Some(sink) = &self.sink {
            sink(text);
        }
    }

    /// Install the status-message callback.
    pub fn set_message_sink(&mut self, sink: impl Fn(&str) + Send + Sync + 'static) {
        self.sink = Some(Arc::new(sink));
    }

    /// Shared flag the shell sets to request a cooperative stop. The kernel
    /// polls it between discrete steps; batch operations finish their current
    /// step before returning with partial progress.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    #[inline]
    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    // Read accessors ------------------------------------------------------

    /// Configuration this model was built with.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Number of cubes currently present in the solid.
    pub fn volume(&self) -> u64 {
        self.active.len() as u64
    }

    /// Number of currently exposed faces.
    pub fn surface_area(&self) -> u64 {
        self.exposed.len() as u64
    }

    /// Cube count of the solid before erosion started.
    pub fn initial_volume(&self) -> u64 {
        self.initial_volume
    }

    /// Exposed-face count right after shape generation.
    pub fn max_surface_area(&self) -> u64 {
        self.max_surface_area
    }

    /// Cubes removed so far in the current phase.
    pub fn removed_count(&self) -> u64 {
        self.cubes_removed
    }

    /// Sub-particles placed by the aggregate generator.
    pub fn particle_count(&self) -> u64 {
        self.particles_generated
    }

    /// Total cell count of the grid (x·y·z).
    pub fn grid_size(&self) -> u64 {
        self.grid.len() as u64
    }

    // Test support --------------------------------------------------------

    /// Check the map/list lock-step of both indices and their agreement with
    /// grid state: every indexed face belongs to a visible cube with that
    /// face bit set, and every visible cube's set face bit is indexed.
    #[cfg(test)]
    pub(crate) fn indices_consistent(&self) -> bool {
        if !self.exposed.check_invariants() || !self.active.check_invariants() {
            return false;
        }
        for key in self.exposed.iter() {
            let cube = self.grid.cube(key.offset());
            if !cube.is_visible() || !cube.is_exposed(key.face()) {
                return false;
            }
        }
        for offset in 0..self.grid.len() {
            let cube = self.grid.cube(offset);
            if cube.is_visible() != self.active.contains(offset) {
                return false;
            }
            if cube.is_visible() {
                for face in 0..crate::cube::NUM_FACES {
                    if cube.is_exposed(face) != self.exposed.contains(FaceKey::new(offset, face)) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Check that every face bit of every visible cube matches the
    /// visibility of its neighbor (grid-boundary faces are always exposed).
    #[cfg(test)]
    pub(crate) fn exposure_matches_visibility(&self) -> bool {
        for offset in 0..self.grid.len() {
            let cube = self.grid.cube(offset);
            if !cube.is_visible() {
                continue;
            }
            for face in 0..crate::cube::NUM_FACES {
                let open = match self.grid.neighbor_checked(offset, face) {
                    Some(adj) => !self.grid.cube(adj).is_visible(),
                    None => true,
                };
                if cube.is_exposed(face) != open {
                    return false;
                }
            }
        }
        true
    }
}

/// Mutual-exclusion wrapper letting a renderer read snapshots while the
/// kernel mutates the model on another thread.
#[derive(Clone)]
pub struct SharedModel(Arc<RwLock<CubeModel>>);

impl SharedModel {
    pub fn new(model: CubeModel) -> Self {
        Self(Arc::new(RwLock::new(model)))
    }

    /// Run `f` with exclusive access to the model (the kernel path).
    pub fn with<R>(&self, f: impl FnOnce(&mut CubeModel) -> R) -> R {
        let mut guard = self.0.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Non-blocking snapshot for rendering. Returns `None` when the kernel
    /// currently holds the lock; the renderer should simply skip the frame
    /// rather than stall the simulation.
    pub fn try_render_snapshot(&self) -> Option<RenderSnapshot> {
        let mut guard = self.0.try_write().ok()?;
        Some(guard.render_snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_zero_dimension_rejected() {
        let params = SimParams {
            xdim: 0,
            ..Default::default()
        };
        assert!(matches!(
            CubeModel::new(params),
            Err(ModelError::InvalidDimensions(0, 50, 50))
        ));
    }

    #[test]
    fn test_empty_import_rejected() {
        assert!(matches!(
            CubeModel::from_points(SimParams::default(), &[]),
            Err(ModelError::EmptyImport)
        ));
    }

    #[test]
    fn test_cuboid_construction_counts() {
        let params = SimParams {
            xdim: 10,
            ydim: 10,
            zdim: 10,
            seed: Some(1),
            ..Default::default()
        };
        let model = CubeModel::new(params).unwrap();
        assert_eq!(model.initial_volume(), 1000);
        assert_eq!(model.volume(), 1000);
        // 6 faces of 10x10 each.
        assert_eq!(model.surface_area(), 600);
        assert_eq!(model.max_surface_area(), 600);
        assert_eq!(model.removed_count(), 0);
        assert_eq!(model.grid_size(), 1000);
    }

    #[test]
    fn test_exposure_matches_visibility_after_fill() {
        let params = SimParams {
            xdim: 6,
            ydim: 5,
            zdim: 4,
            seed: Some(2),
            ..Default::default()
        };
        let model = CubeModel::new(params).unwrap();
        for offset in 0..model.grid.len() {
            let cube = model.grid.cube(offset);
            assert!(cube.is_visible());
            for face in 0..crate::cube::NUM_FACES {
                let boundary = model.grid.neighbor_checked(offset, face).is_none();
                assert_eq!(cube.is_exposed(face), boundary);
            }
        }
    }

    #[test]
    fn test_point_import_scales_to_grid() {
        let params = SimParams {
            xdim: 5,
            ydim: 5,
            zdim: 5,
            seed: Some(3),
            ..Default::default()
        };
        // Two opposite corners of a unit cube land at opposite grid corners.
        let points = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let model = CubeModel::from_points(params, &points).unwrap();
        assert_eq!(model.initial_volume(), 2);
        assert!(model.grid.at(0, 0, 0).is_visible());
        assert!(model.grid.at(4, 4, 4).is_visible());
    }

    #[test]
    fn test_message_sink_receives_construction_messages() {
        let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let params = SimParams {
            xdim: 4,
            ydim: 4,
            zdim: 4,
            seed: Some(4),
            ..Default::default()
        };
        let mut model = CubeModel::new(params).unwrap();
        let log = Arc::clone(&messages);
        model.set_message_sink(move |msg| log.lock().unwrap().push(msg.to_string()));
        model.send("hello");
        assert_eq!(*messages.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_stop_handle_halts_consume() {
        let params = SimParams {
            xdim: 10,
            ydim: 10,
            zdim: 10,
            seed: Some(5),
            ..Default::default()
        };
        let mut model = CubeModel::new(params).unwrap();
        model.stop_handle().store(true, Ordering::Relaxed);
        let mut threshold = 1.0;
        let progress = model.consume(&mut threshold);
        assert!(!progress.more);
        assert_eq!(model.removed_count(), 0);
        assert_eq!(model.volume(), 1000);
    }

    #[test]
    fn test_fixed_seed_reproduces_run() {
        let run = || {
            let mut model = CubeModel::new(SimParams {
                xdim: 8,
                ydim: 8,
                zdim: 8,
                porosity: 0.2,
                pore_size: 2,
                record_samples: true,
                seed: Some(777),
                ..Default::default()
            })
            .unwrap();
            let mut threshold = 1.0;
            while model.produce_pores(&mut threshold).more {}
            model.finish_pores();

            let mut threshold = model.params().output_inc;
            while model.consume(&mut threshold).more {
                threshold += model.params().output_inc;
            }
            model.take_samples()
        };
        let first = run();
        assert!(!first.is_empty());
        assert_eq!(first, run());
    }

    #[test]
    fn test_aggregate_fill_constructs_consistent_model() {
        let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&messages);
        let params = SimParams {
            xdim: 30,
            ydim: 30,
            zdim: 30,
            aggregate_enable: true,
            particle_size: 10,
            replace_enable: true,
            seed: Some(9),
            ..Default::default()
        };
        let model = CubeModel::with_sink(params, move |msg| {
            log.lock().unwrap().push(msg.to_string())
        })
        .unwrap();

        assert!(model.particle_count() >= 1);
        assert!(model.volume() > 0);
        assert!(model.volume() < model.grid_size());
        assert_eq!(model.volume(), model.initial_volume());
        assert!(model.indices_consistent());
        assert!(model.exposure_matches_visibility());

        let messages = messages.lock().unwrap();
        assert!(messages.iter().any(|m| m.starts_with("Container Volume")));
        assert!(messages.iter().any(|m| m.starts_with("Porosity")));
    }

    #[test]
    fn test_shared_model_snapshot() {
        let params = SimParams {
            xdim: 4,
            ydim: 4,
            zdim: 4,
            seed: Some(6),
            ..Default::default()
        };
        let shared = SharedModel::new(CubeModel::new(params).unwrap());
        let snapshot = shared.try_render_snapshot().expect("lock uncontended");
        assert_eq!(snapshot.volume, 64);
        assert_eq!(snapshot.surface_area, 96);
        let volume = shared.with(|m| m.volume());
        assert_eq!(volume, 64);
    }
}
