//! Dense 3D cube grid.
//!
//! The grid is a flat, linearly addressed array of [`Cube`] records for an
//! x×y×z volume. Linear offset = z·(xdim·ydim) + y·xdim + x. Dimensions are
//! fixed for the lifetime of one simulation run; the grid exclusively owns
//! every cube record (no per-cell allocation).

use crate::cube::Cube;

/// Fixed-size 3D grid of cube records.
#[derive(Debug, Clone)]
pub struct Grid {
    xdim: usize,
    ydim: usize,
    zdim: usize,
    /// One row's worth of cubes.
    row: usize,
    /// One layer's worth of cubes.
    layer: usize,
    cubes: Vec<Cube>,
}

impl Grid {
    /// Allocate a grid of `xdim * ydim * zdim` empty cells.
    pub fn new(xdim: usize, ydim: usize, zdim: usize) -> Self {
        let row = xdim;
        let layer = row * ydim;
        Self {
            xdim,
            ydim,
            zdim,
            row,
            layer,
            cubes: vec![Cube::default(); layer * zdim],
        }
    }

    /// Total cell count of the grid (x·y·z).
    #[inline]
    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }

    #[inline]
    pub fn xdim(&self) -> usize {
        self.xdim
    }

    #[inline]
    pub fn ydim(&self) -> usize {
        self.ydim
    }

    #[inline]
    pub fn zdim(&self) -> usize {
        self.zdim
    }

    /// Linear offset for grid coordinates.
    #[inline]
    pub fn offset(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.xdim && y < self.ydim && z < self.zdim);
        z * self.layer + y * self.row + x
    }

    /// Grid coordinates for a linear offset.
    #[inline]
    pub fn pos(&self, offset: usize) -> (usize, usize, usize) {
        let z = offset / self.layer;
        let rem = offset % self.layer;
        (rem % self.row, rem / self.row, z)
    }

    #[inline]
    pub fn cube(&self, offset: usize) -> &Cube {
        &self.cubes[offset]
    }

    #[inline]
    pub fn cube_mut(&mut self, offset: usize) -> &mut Cube {
        &mut self.cubes[offset]
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize, z: usize) -> &Cube {
        &self.cubes[self.offset(x, y, z)]
    }

    /// Offset of the cell adjacent to `offset` across `face`.
    ///
    /// Callers must only ask across faces that have a neighbor; a hidden face
    /// bit is the usual proof (a hidden face always has an in-grid neighbor).
    #[inline]
    pub fn neighbor(&self, offset: usize, face: usize) -> usize {
        match face {
            0 => offset - self.layer,
            1 => offset - 1,
            2 => offset - self.row,
            3 => offset + self.row,
            4 => offset + 1,
            5 => offset + self.layer,
            _ => unreachable!("face index out of range"),
        }
    }

    /// Bounds-aware neighbor lookup.
    pub fn neighbor_checked(&self, offset: usize, face: usize) -> Option<usize> {
        let (x, y, z) = self.pos(offset);
        let ok = match face {
            0 => z > 0,
            1 => x > 0,
            2 => y > 0,
            3 => y < self.ydim - 1,
            4 => x < self.xdim - 1,
            5 => z < self.zdim - 1,
            _ => unreachable!("face index out of range"),
        };
        ok.then(|| self.neighbor(offset, face))
    }
}
