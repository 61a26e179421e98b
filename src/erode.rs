//! Erosion engine: single-cube consumption and pore carving.
//!
//! Two removal paths exist. The fast path serves ordinary consumption,
//! where the victim is always a single cube picked from the exposed
//! boundary, so no neighbor can be mid-removal. The general path serves
//! pore carving and fragment discard, where previously hidden cubes can
//! become newly exposed mid-batch; it drains an explicit worklist with an
//! index cursor instead of recursing, keeping large pores stack-safe.

use rand::Rng;

use crate::cube::{opposite, NUM_FACES};
use crate::index::FaceKey;
use crate::model::{CubeModel, Progress};
use crate::shape::FillMode;
use crate::snapshot::{PlotPoint, SurfaceSample};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Reporting increment used while carving pores and placing particles.
pub(crate) const PORE_PROGRESS_INC: f64 = 0.2;

impl CubeModel {
    /// Mark a cube not-visible and drop it from the active index without
    /// touching any face bookkeeping. Only correct for cubes with no entry
    /// in the exposure index.
    pub(crate) fn delete_cube(&mut self, offset: usize) {
        self.grid.cube_mut(offset).hide();
        self.active.remove(offset);
    }

    /// Fast-path removal of one uniformly random exposed cube.
    ///
    /// Every hidden face of the victim has a visible neighbor that survives
    /// this call, so newly exposed faces can be added directly and no
    /// worklist is needed.
    pub(crate) fn remove_cube_fast(&mut self) {
        let index = self.rng.gen_range(0..self.exposed.len());
        let offset = self.exposed.get(index).offset();
        for face in (0..NUM_FACES).rev() {
            if self.grid.cube(offset).is_exposed(face) {
                self.exposed.remove(FaceKey::new(offset, face));
            } else {
                let adj = self.grid.neighbor(offset, face);
                self.add_face(adj, opposite(face));
            }
        }
        self.delete_cube(offset);
    }

    /// General removal starting at `start`, cascading through neighbors that
    /// were already deleted without face bookkeeping (interior cubes of the
    /// same batch). Those are re-marked visible to prevent re-queueing, put
    /// on the worklist, and processed iteratively.
    pub(crate) fn remove_cube_cascade(&mut self, start: usize) {
        let mut worklist = vec![start];
        let mut cursor = 0;
        while cursor < worklist.len() {
            let offset = worklist[cursor];
            for face in (0..NUM_FACES).rev() {
                if self.grid.cube(offset).is_exposed(face) {
                    // The face dies with the cube. Faces set during a cascade
                    // were never indexed, so this may be a no-op.
                    self.exposed.remove(FaceKey::new(offset, face));
                } else {
                    let adj = self.grid.neighbor(offset, face);
                    if self.grid.cube(adj).is_visible() {
                        self.add_face(adj, opposite(face));
                    } else {
                        let cube = self.grid.cube_mut(adj);
                        cube.set_face(opposite(face));
                        cube.show();
                        worklist.push(adj);
                    }
                }
            }
            self.delete_cube(offset);
            cursor += 1;
        }
    }

    /// Remove one uniformly random exposed cube via the general path.
    pub(crate) fn remove_random_exposed(&mut self) {
        let index = self.rng.gen_range(0..self.exposed.len());
        let offset = self.exposed.get(index).offset();
        self.remove_cube_cascade(offset);
    }

    /// Remove the cube at (`x`,`y`,`z`) if present; used by spherical pore
    /// carving.
    pub(crate) fn remove_at(&mut self, x: usize, y: usize, z: usize) {
        let offset = self.grid.offset(x, y, z);
        if !self.grid.cube(offset).is_visible() {
            return;
        }
        if self.grid.cube(offset).has_exposed() {
            self.remove_cube_cascade(offset);
        } else {
            self.delete_cube(offset);
        }
    }

    /// Remove one uniformly random active cube regardless of exposure.
    /// Interior victims are deleted without face bookkeeping; the cavity
    /// surface is accounted for by [`CubeModel::recount_exposed_faces`].
    pub(crate) fn naive_remove_cube(&mut self) {
        let index = self.rng.gen_range(0..self.active.len());
        let offset = self.active.get(index);
        if !self.grid.cube(offset).is_visible() {
            return;
        }
        if self.grid.cube(offset).has_exposed() {
            self.remove_cube_cascade(offset);
        } else {
            self.delete_cube(offset);
        }
    }

    /// Clamp a pore span so it stays inside `[0, limit)`. Returns the
    /// inclusive start/end of the span. A pore wider than the axis collapses
    /// to the whole axis.
    fn pore_bounds(pos: usize, pore: usize, limit: usize) -> (usize, usize) {
        let span = (pore - 1).min(limit - 1);
        let mut start = pos.saturating_sub(pore / 2);
        if start + span >= limit {
            start = limit - 1 - span;
        }
        (start, start + span)
    }

    /// Pick the pore edge length for this carving step: fixed, or uniform in
    /// [1, pore_size], clamped down so a full pore never overshoots the
    /// remaining removal quota.
    pub(crate) fn pore_size(&mut self, cubes_remaining: u64) -> u32 {
        let mut pore = if self.params.pore_is_fixed {
            self.params.pore_size
        } else {
            self.rng.gen_range(1..=self.params.pore_size.max(1))
        };
        if (pore as u64).pow(3) > cubes_remaining {
            pore = (cubes_remaining as f64).cbrt() as u32;
        }
        pore
    }

    /// Carve a pore of edge length `pore` centered on the cube at `offset`:
    /// an axis-aligned cube clamped to the grid, or an ellipsoidal region
    /// when spherical pores are configured.
    pub(crate) fn remove_pore(&mut self, offset: usize, pore: u32) {
        if pore <= 1 {
            if !self.grid.cube(offset).is_visible() {
                return;
            }
            if self.grid.cube(offset).has_exposed() {
                self.remove_cube_cascade(offset);
            } else {
                self.delete_cube(offset);
            }
            return;
        }

        let (x, y, z) = self.grid.pos(offset);

        if !self.params.pore_is_cuboid && pore > 2 {
            self.generate_ellipsoid(
                x as i64,
                y as i64,
                z as i64,
                pore,
                pore,
                pore,
                FillMode::Remove,
            );
            return;
        }

        let pore = pore as usize;
        let (x_start, x_end) = Self::pore_bounds(x, pore, self.grid.xdim());
        let (y_start, y_end) = Self::pore_bounds(y, pore, self.grid.ydim());
        let (z_start, z_end) = Self::pore_bounds(z, pore, self.grid.zdim());

        // Interior cubes carry no index entries and are deleted outright;
        // the rest are batched so the cascade can resolve neighbors that
        // disappear in the same pore.
        let mut batch = Vec::with_capacity(pore * pore * pore);
        for bz in z_start..=z_end {
            for by in y_start..=y_end {
                for bx in x_start..=x_end {
                    let off = self.grid.offset(bx, by, bz);
                    if !self.grid.cube(off).is_visible() {
                        continue;
                    }
                    if self.grid.cube(off).has_exposed() {
                        batch.push(off);
                    } else {
                        self.delete_cube(off);
                    }
                }
            }
        }
        for off in batch {
            self.remove_cube_cascade(off);
        }
    }

    /// Carve pores until `porosity × initial volume` cubes are gone,
    /// returning whenever the removed fraction crosses `threshold` so the
    /// caller can interleave rendering or cancellation. Once the quota is
    /// met, stray fragments are discarded and, if replacement is enabled,
    /// the volume is restored to exactly the requested figure.
    pub fn produce_pores(&mut self, threshold: &mut f64) -> Progress {
        let quota = (self.initial_volume as f64 * self.params.porosity).round() as u64;
        self.cubes_removed = self.initial_volume - self.active.len() as u64;
        let mut pore = self.pore_size(quota.saturating_sub(self.cubes_removed));

        while self.cubes_removed < quota && !self.stop_requested() {
            let index = self.rng.gen_range(0..self.active.len());
            let offset = self.active.get(index);
            if !self.params.pore_is_fixed {
                pore = self.pore_size(quota - self.cubes_removed);
            }
            self.remove_pore(offset, pore);
            self.cubes_removed = self.initial_volume - self.active.len() as u64;

            let ratio = self.cubes_removed as f64 / quota as f64;
            if ratio >= *threshold {
                if ratio > *threshold {
                    while ratio > *threshold {
                        *threshold += PORE_PROGRESS_INC;
                    }
                    *threshold -= PORE_PROGRESS_INC;
                }
                return Progress {
                    more: true,
                    percent: (ratio * 100.0).round() as u32,
                };
            }
        }

        let percent = if quota == 0 {
            100
        } else {
            ((self.cubes_removed as f64 / quota as f64) * 100.0).round() as u32
        };

        self.send(&format!(
            "After Removal {} Total Cubes - {} exposed faces",
            self.volume(),
            self.surface_area()
        ));

        // Pore carving can split cubes off the main body; drop them.
        self.detect_fragments();
        let discarded = self.discard_fragments();
        if discarded > 0 {
            self.send(&format!(
                "After fragment removal: Discarded {} Cubes - {} Total Cubes - {} exposed faces",
                discarded,
                self.volume(),
                self.surface_area()
            ));
        }

        if self.params.with_replacement && self.cubes_removed != quota {
            let expected = self.initial_volume - quota;
            self.send(&format!("Expected volume {expected} cubes"));
            self.reset_expected_volume(expected);
        }

        // The consume phase starts from the porous shape.
        self.initial_volume = self.volume();
        self.max_surface_area = self.surface_area();
        self.initial_removed = 0;

        Progress {
            more: false,
            percent,
        }
    }

    /// Release pore-phase scratch data and reset the removal counter for
    /// the consume phase.
    pub fn finish_pores(&mut self) {
        self.fragments.clear();
        self.fragment_sizes.clear();
        self.labels_in = Vec::new();
        self.labels_out = Vec::new();
        self.cubes_removed = 0;
        self.last_sampled = None;
    }

    /// Progress reporting for the aggregate phase, mirroring the pore loop's
    /// threshold contract. The particles themselves are placed during
    /// construction, so each call only accounts for the removal quota already
    /// covered by inter-particle voids and never blocks waiting for work.
    pub fn produce_particles(&mut self, threshold: &mut f64) -> Progress {
        let quota = (self.initial_volume as f64 * self.params.porosity).round() as u64;
        self.cubes_removed = self.initial_volume - self.active.len() as u64;

        if self.cubes_removed < quota && !self.stop_requested() {
            let ratio = self.cubes_removed as f64 / quota as f64;
            if ratio >= *threshold {
                if ratio > *threshold {
                    while ratio > *threshold {
                        *threshold += PORE_PROGRESS_INC;
                    }
                    *threshold -= PORE_PROGRESS_INC;
                }
                return Progress {
                    more: true,
                    percent: (ratio * 100.0).round() as u32,
                };
            }
        }

        let percent = if quota == 0 {
            100
        } else {
            ((self.cubes_removed as f64 / quota as f64) * 100.0).round() as u32
        };
        Progress {
            more: false,
            percent,
        }
    }

    /// The main erosion loop. Removes one random exposed cube at a time
    /// until the surface is gone, a stop is requested, or the removed
    /// fraction of the initial volume crosses `threshold`; the threshold is
    /// advanced past any overshoot so callers never miss a reporting
    /// boundary. Returns with `more == false` once every cube is gone.
    pub fn consume(&mut self, threshold: &mut f64) -> Progress {
        let fast = !(self.params.porosity > 0.0);
        let mut surface = self.exposed.len() as u64;

        while surface > 0 && !self.stop_requested() {
            self.record_sample(surface);
            self.record_plot_point(surface);

            let ratio = self.cubes_removed as f64 / self.initial_volume as f64;
            if ratio >= *threshold {
                if ratio > *threshold {
                    while ratio > *threshold {
                        *threshold += self.params.output_inc;
                    }
                    *threshold -= self.params.output_inc;
                }
                return Progress {
                    more: true,
                    percent: (ratio * 100.0).round() as u32,
                };
            }

            if self.params.naive_removal {
                self.naive_remove_cube();
            } else if fast {
                self.remove_cube_fast();
            } else {
                self.remove_random_exposed();
            }
            self.cubes_removed += 1;
            surface = self.exposed.len() as u64;
        }

        self.record_sample(surface);
        self.record_plot_point(surface);

        let percent =
            ((self.cubes_removed as f64 / self.initial_volume as f64) * 100.0).round() as u32;
        Progress {
            more: false,
            percent,
        }
    }

    fn record_sample(&mut self, surface: u64) {
        if !self.params.record_samples || self.last_sampled == Some(self.cubes_removed) {
            return;
        }
        let sub = self.params.output_subsample;
        if sub > 1 && self.cubes_removed % sub != 0 {
            return;
        }
        let exposed_faces = if self.params.naive_removal {
            self.recount_exposed_faces()
        } else {
            surface
        };
        self.samples.push(SurfaceSample {
            cubes_removed: self.cubes_removed,
            exposed_faces,
        });
        self.last_sampled = Some(self.cubes_removed);
    }

    fn record_plot_point(&mut self, surface: u64) {
        if !self.params.record_plot {
            return;
        }
        let sub = self.params.output_subsample;
        if sub > 1 && self.cubes_removed % sub != 0 {
            return;
        }
        let removed = (self.cubes_removed + self.initial_removed) as f64;
        let total = (self.initial_volume + self.initial_removed) as f64;
        self.plot.push(PlotPoint {
            removed_fraction: removed / total,
            surface_fraction: surface as f64 / self.max_surface_area as f64,
        });
    }

    /// Count physically exposed faces by visibility inspection rather than
    /// from the index. Needed in naive-removal mode, where hidden cavities
    /// carry real surface the index never sees.
    pub fn recount_exposed_faces(&self) -> u64 {
        let count_one = |&offset: &usize| -> u64 {
            let mut exposed = 0u64;
            for face in 0..NUM_FACES {
                match self.grid.neighbor_checked(offset, face) {
                    Some(adj) if self.grid.cube(adj).is_visible() => {}
                    _ => exposed += 1,
                }
            }
            exposed
        };

        #[cfg(feature = "parallel")]
        {
            self.active.as_slice().par_iter().map(count_one).sum()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.active.as_slice().iter().map(count_one).sum()
        }
    }
}
