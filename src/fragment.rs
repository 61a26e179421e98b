//! Fragment detection over the active-cube set.
//!
//! Builds a boolean occupancy volume from the active index, labels its
//! connected components (face, edge, or vertex adjacency), re-tags every
//! active cube with its component label, and groups cube offsets by label so
//! fragments can be measured or discarded. All of it is derived state,
//! rebuilt on every detection pass and stale in between.

use crate::config::Connectivity;
use crate::model::CubeModel;

impl Connectivity {
    /// Neighbor step table for this adjacency.
    pub(crate) fn steps(self) -> Vec<(i64, i64, i64)> {
        let mut steps = Vec::with_capacity(self.degree());
        for dz in -1i64..=1 {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let taxicab = dx.abs() + dy.abs() + dz.abs();
                    let keep = match self {
                        Connectivity::Faces => taxicab == 1,
                        Connectivity::Edges => (1..=2).contains(&taxicab),
                        Connectivity::Vertices => taxicab >= 1,
                    };
                    if keep {
                        steps.push((dx, dy, dz));
                    }
                }
            }
        }
        steps
    }
}

/// Label the connected components of `occupancy` (a dense x-major volume of
/// `dims`), writing a 1-based component label per occupied cell into `out`.
/// Returns the number of components found. Flood fill runs on an explicit
/// queue, never the call stack.
pub(crate) fn label_components(
    occupancy: &[bool],
    dims: (usize, usize, usize),
    connectivity: Connectivity,
    out: &mut [u32],
) -> usize {
    let (xdim, ydim, zdim) = dims;
    debug_assert_eq!(occupancy.len(), xdim * ydim * zdim);
    debug_assert_eq!(out.len(), occupancy.len());

    let steps = connectivity.steps();
    let row = xdim;
    let layer = xdim * ydim;

    let mut next_label = 0u32;
    let mut queue: Vec<usize> = Vec::new();

    for seed in 0..occupancy.len() {
        if !occupancy[seed] || out[seed] != 0 {
            continue;
        }
        next_label += 1;
        out[seed] = next_label;
        queue.clear();
        queue.push(seed);

        while let Some(offset) = queue.pop() {
            let z = offset / layer;
            let rem = offset % layer;
            let y = rem / row;
            let x = rem % row;
            for &(dx, dy, dz) in &steps {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                let nz = z as i64 + dz;
                if nx < 0
                    || ny < 0
                    || nz < 0
                    || nx as usize >= xdim
                    || ny as usize >= ydim
                    || nz as usize >= zdim
                {
                    continue;
                }
                let noff = nz as usize * layer + ny as usize * row + nx as usize;
                if occupancy[noff] && out[noff] == 0 {
                    out[noff] = next_label;
                    queue.push(noff);
                }
            }
        }
    }

    next_label as usize
}

impl CubeModel {
    /// Load the occupancy scratch volume from the active index.
    fn init_labels(&mut self) {
        let len = self.grid.len();
        if self.labels_in.len() != len {
            self.labels_in = vec![false; len];
            self.labels_out = vec![0; len];
        } else {
            self.labels_in.fill(false);
            self.labels_out.fill(0);
        }
        for offset in self.active.iter() {
            self.labels_in[offset] = true;
        }
    }

    /// Label every active cube with its connected-component id and rebuild
    /// the fragment membership groups. Returns the number of fragments; 1
    /// means the object is still fully connected (membership groups are not
    /// materialized in that case).
    pub fn detect_fragments(&mut self) -> usize {
        self.init_labels();

        let dims = (self.grid.xdim(), self.grid.ydim(), self.grid.zdim());
        let n_labels = label_components(
            &self.labels_in,
            dims,
            self.params.connectivity,
            &mut self.labels_out,
        );

        self.fragment_sizes = vec![0; n_labels + 1];
        self.fragments.clear();

        if n_labels == 1 {
            return 1;
        }

        for index in 0..self.active.len() {
            let offset = self.active.get(index);
            let label = self.labels_out[offset];
            self.fragment_sizes[label as usize] += 1;
            self.grid.cube_mut(offset).set_fragment(label);
            self.fragments.entry(label).or_default().push(offset);
        }

        n_labels
    }

    /// Keep the largest fragment and remove every cube of the others.
    /// Returns the number of cubes discarded, which is added to the removed
    /// tally. Size ties keep an arbitrary winner.
    pub fn discard_fragments(&mut self) -> u64 {
        if self.fragments.len() <= 1 {
            return 0;
        }

        let mut groups: Vec<Vec<usize>> = std::mem::take(&mut self.fragments)
            .into_values()
            .collect();
        groups.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut discarded = 0u64;
        for group in groups.iter().skip(1) {
            discarded += group.len() as u64;
            for &offset in group {
                if self.grid.cube(offset).has_exposed() {
                    self.remove_cube_cascade(offset);
                } else {
                    self.delete_cube(offset);
                }
            }
        }

        self.cubes_removed += discarded;
        discarded
    }

    /// Log10-binned histogram of fragment sizes from the last detection
    /// pass: bin = round(log10(size)) clamped to 5, value = log10 of the
    /// bin's fragment count (0 for empty bins).
    pub fn fragment_histogram(&self) -> [f64; 6] {
        let mut hist = [0u32; 6];
        for group in self.fragments.values() {
            let size = group.len() as f64;
            let bin = (size.log10().round() as usize).min(5);
            hist[bin] += 1;
        }
        let mut out = [0.0f64; 6];
        for (slot, &count) in out.iter_mut().zip(hist.iter()) {
            if count > 0 {
                *slot = (count as f64).log10();
            }
        }
        out
    }

    /// Sizes-per-label table from the last detection pass.
    pub fn fragment_sizes(&self) -> &[u32] {
        &self.fragment_sizes
    }
}
