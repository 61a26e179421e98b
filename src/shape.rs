//! Initial shape generation and cube insertion.
//!
//! Fills the grid with a cuboid or ellipsoid solid, stamps aggregate
//! sub-particles, or imports an external point list. The ellipsoid scan
//! walks z-slices and, within each slice, an ellipse cross-section via
//! squared-radius comparisons; even dimensions repeat the center row/slice
//! so the lattice stays symmetric.

use crate::aggregate::Aggregate;
use crate::cube::opposite;
use crate::index::FaceKey;
use crate::model::CubeModel;

/// What an ellipsoid scan does at each interior lattice point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FillMode {
    /// Insert a cube (counts points as it goes).
    Insert,
    /// Remove a cube; used by spherical pore carving.
    Remove,
    /// Count interior points without mutating anything.
    Count,
}

impl CubeModel {
    /// Fill the entire grid volume with cubes.
    pub(crate) fn generate_cuboid(&mut self) {
        for z in 0..self.grid.zdim() {
            for y in 0..self.grid.ydim() {
                for x in 0..self.grid.xdim() {
                    self.insert_cube(x, y, z, false);
                }
            }
        }
    }

    /// Scan an ellipsoid of `width`×`height`×`depth` centered at
    /// (`x0`,`y0`,`z0`), applying `mode` at each interior lattice point.
    /// Returns the number of interior points visited in insert/count modes.
    pub(crate) fn generate_ellipsoid(
        &mut self,
        x0: i64,
        y0: i64,
        z0: i64,
        width: u32,
        height: u32,
        depth: u32,
        mode: FillMode,
    ) -> u64 {
        let mut count = 0u64;
        let mut depth = depth as i64;
        let mut rpt = depth % 2 == 0;
        if rpt {
            depth -= 1;
        }

        let zradius = depth as f64 / 2.0;
        let mut zpos = (z0 as f64 - zradius).floor() as i64;
        let z_hi = (zradius - 1.0).ceil() as i64;
        let z_lo = (-zradius).floor() as i64;
        let mut z = z_hi;
        while z > z_lo {
            let in_z = zpos >= 0 && (zpos as usize) < self.grid.zdim();
            if mode != FillMode::Remove || in_z {
                let zc = z as f64 / zradius;
                let zcomp = (1.0 - zc * zc).sqrt();
                self.generate_ellipse(x0, y0, zpos, zcomp, width, height, mode, &mut count);
            }
            zpos += 1;
            if rpt && z == 0 {
                z += 1;
                rpt = false;
            }
            z -= 1;
        }

        count
    }

    /// One elliptical slice of the ellipsoid scan.
    #[allow(clippy::too_many_arguments)]
    fn generate_ellipse(
        &mut self,
        x0: i64,
        y0: i64,
        zpos: i64,
        zcomp: f64,
        width: u32,
        height: u32,
        mode: FillMode,
        count: &mut u64,
    ) {
        let mut height = height as i64;
        let mut yrpt = height % 2 == 0;
        if yrpt {
            height -= 1;
        }
        let yradius = (height as f64 / 2.0) * zcomp;

        let mut width = width as i64;
        let xrpt_org = width % 2 == 0;
        if xrpt_org {
            width -= 1;
        }
        let xradius = (width as f64 / 2.0) * zcomp;

        let mut ypos = (y0 as f64 - yradius).floor() as i64;
        let y_hi = (yradius - 1.0).ceil() as i64;
        let y_lo = (-yradius).floor() as i64;
        let mut y = y_hi;
        while y > y_lo {
            let in_y = ypos >= 0 && (ypos as usize) < self.grid.ydim();
            if mode != FillMode::Remove || in_y {
                let mut xrpt = xrpt_org;
                let yr = y as f64 / yradius;
                let xcomp = (1.0 - yr * yr).sqrt() * xradius;
                let mut xpos = (x0 as f64 - xcomp).floor() as i64;
                let x_hi = (xcomp - 1.0).ceil() as i64;
                let x_lo = (-xcomp).floor() as i64;
                let mut x = x_hi;
                while x > x_lo {
                    match mode {
                        FillMode::Remove => {
                            if xpos >= 0 && (xpos as usize) < self.grid.xdim() {
                                self.remove_at(xpos as usize, ypos as usize, zpos as usize);
                            }
                        }
                        FillMode::Insert => {
                            *count += 1;
                            if self.point_in_grid(xpos, ypos, zpos) {
                                self.insert_cube(
                                    xpos as usize,
                                    ypos as usize,
                                    zpos as usize,
                                    false,
                                );
                            }
                        }
                        FillMode::Count => {
                            *count += 1;
                        }
                    }
                    xpos += 1;
                    if xrpt && x == 0 {
                        x += 1;
                        xrpt = false;
                    }
                    x -= 1;
                }
            }
            ypos += 1;
            if yrpt && y == 0 {
                y += 1;
                yrpt = false;
            }
            y -= 1;
        }
    }

    #[inline]
    fn point_in_grid(&self, x: i64, y: i64, z: i64) -> bool {
        x >= 0
            && (x as usize) < self.grid.xdim()
            && y >= 0
            && (y as usize) < self.grid.ydim()
            && z >= 0
            && (z as usize) < self.grid.zdim()
    }

    /// Insert a cube at (`x`,`y`,`z`): mark it visible, then for each face
    /// either attach to an already-visible neighbor (hiding the shared face
    /// on both cubes) or mark the face exposed. `do_update` additionally
    /// maintains the exposure and active indices, which is required once the
    /// indices exist (replacement-time inserts).
    ///
    /// Inserting where a cube is already visible counts a collision and does
    /// nothing else; the aggregate prefill uses the collision count as its
    /// replacement shortfall.
    pub(crate) fn insert_cube(&mut self, x: usize, y: usize, z: usize, do_update: bool) {
        let offset = self.grid.offset(x, y, z);
        if self.grid.cube(offset).is_visible() {
            self.insert_collisions += 1;
            return;
        }
        self.grid.cube_mut(offset).show();

        let adj = (x > 0).then(|| self.grid.neighbor(offset, 1));
        self.insert_face(offset, 1, adj, do_update);
        let adj = (y > 0).then(|| self.grid.neighbor(offset, 2));
        self.insert_face(offset, 2, adj, do_update);
        let adj = (z > 0).then(|| self.grid.neighbor(offset, 0));
        self.insert_face(offset, 0, adj, do_update);
        let adj = (x < self.grid.xdim() - 1).then(|| self.grid.neighbor(offset, 4));
        self.insert_face(offset, 4, adj, do_update);
        let adj = (y < self.grid.ydim() - 1).then(|| self.grid.neighbor(offset, 3));
        self.insert_face(offset, 3, adj, do_update);
        let adj = (z < self.grid.zdim() - 1).then(|| self.grid.neighbor(offset, 5));
        self.insert_face(offset, 5, adj, do_update);

        if do_update {
            self.active.insert(offset);
        }
        self.initial_volume += 1;
    }

    /// Attach one face of a newly inserted cube to its neighbor cell.
    fn insert_face(&mut self, offset: usize, face: usize, adjacent: Option<usize>, do_update: bool) {
        if let Some(adj) = adjacent {
            if self.grid.cube(adj).is_visible() {
                let adj_face = opposite(face);
                self.grid.cube_mut(offset).clear_face(face);
                self.grid.cube_mut(adj).clear_face(adj_face);
                if do_update {
                    self.exposed.remove(FaceKey::new(adj, adj_face));
                }
                return;
            }
        }
        if do_update {
            self.add_face(offset, face);
        } else {
            self.grid.cube_mut(offset).set_face(face);
        }
    }

    /// Scale an external point list to the grid and insert one cube per
    /// scaled point.
    pub(crate) fn import_points(&mut self, points: &[[f64; 3]]) {
        let mut min = [f64::MAX; 3];
        let mut max = [f64::MIN; 3];
        for p in points {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }

        let dims = [self.grid.xdim(), self.grid.ydim(), self.grid.zdim()];
        let mut scalar = [1.0f64; 3];
        for axis in 0..3 {
            let diff = max[axis] - min[axis];
            if diff > 0.0 {
                scalar[axis] = (dims[axis] - 1) as f64 / diff;
            }
        }

        for p in points {
            let x = (((p[0] - min[0]) * scalar[0]).round() as usize).min(dims[0] - 1);
            let y = (((p[1] - min[1]) * scalar[1]).round() as usize).min(dims[1] - 1);
            let z = (((p[2] - min[2]) * scalar[2]).round() as usize).min(dims[2] - 1);
            self.insert_cube(x, y, z, false);
        }
    }

    /// Pack sub-particles into the container and stamp each one into the
    /// grid as a small ellipsoid.
    pub(crate) fn prefill_aggregate(&mut self) {
        let x0 = (self.params.xdim / 2) as i64;
        let y0 = (self.params.ydim / 2) as i64;
        let z0 = (self.params.zdim / 2) as i64;
        let (w, h, d) = (self.params.xdim, self.params.ydim, self.params.zdim);
        let container_volume = self.generate_ellipsoid(x0, y0, z0, w, h, d, FillMode::Count);
        self.send(&format!("Container Volume {container_volume}"));

        let mut aggregate = Aggregate::new(
            self.params.cuboid,
            self.params.xdim as f64,
            self.params.ydim as f64,
            self.params.zdim as f64,
            self.params.particle_size as f64,
        );
        let sink = self.sink.clone();
        aggregate.generate(&mut self.rng, |msg| {
            if let Some(sink) = &sink {
                sink(msg);
            }
        });

        let pd = self.params.particle_size;
        for particle in aggregate.particles().to_vec() {
            self.generate_ellipsoid(
                particle.x as i64,
                particle.y as i64,
                particle.z as i64,
                pd,
                pd,
                pd,
                FillMode::Insert,
            );
        }
        self.particles_generated = aggregate.particles().len() as u64;

        let porosity = 1.0 - self.initial_volume as f64 / container_volume as f64;
        self.send(&format!("Porosity {porosity:.2}"));
    }
}
