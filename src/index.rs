//! Removable index structures for exposed faces and active cubes.
//!
//! Both structures pair a growable list with a reverse lookup so that
//! membership tests, uniform random picks, and removal of an arbitrary
//! element are all O(1). Removal swaps the victim with the last list entry
//! and pops, which destroys ordering; the lists are only ever consulted for
//! random selection and full iteration, never for ordered access.

use std::collections::HashMap;

use rand::Rng;

use crate::rng::XorShift64;

/// Key identifying one face of one cube: `offset << 3 | face`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceKey(u64);

const FACE_BITS: u32 = 3;
const FACE_MASK: u64 = 0x7;

impl FaceKey {
    #[inline]
    pub fn new(offset: usize, face: usize) -> Self {
        debug_assert!(face < crate::cube::NUM_FACES);
        Self((offset as u64) << FACE_BITS | face as u64)
    }

    #[inline]
    pub fn offset(self) -> usize {
        (self.0 >> FACE_BITS) as usize
    }

    #[inline]
    pub fn face(self) -> usize {
        (self.0 & FACE_MASK) as usize
    }
}

/// Index of every currently exposed face.
///
/// Map and list are kept in lock-step: `list[map[k]] == k` for every present
/// key, and the list length always equals the map size.
#[derive(Debug, Default)]
pub struct ExposedFaces {
    map: HashMap<FaceKey, usize>,
    list: Vec<FaceKey>,
}

impl ExposedFaces {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    #[inline]
    pub fn contains(&self, key: FaceKey) -> bool {
        self.map.contains_key(&key)
    }

    /// Add a face to the index. Double insertion is an invariant breach.
    pub fn insert(&mut self, key: FaceKey) {
        if self.map.contains_key(&key) {
            debug_assert!(false, "face {key:?} inserted twice");
            return;
        }
        self.map.insert(key, self.list.len());
        self.list.push(key);
    }

    /// Remove a face by key via swap-with-last. Removing an absent key is a
    /// no-op; cascading removal relies on that tolerance.
    pub fn remove(&mut self, key: FaceKey) -> bool {
        let Some(index) = self.map.remove(&key) else {
            return false;
        };
        // Map and list move in lock-step, so the list cannot be empty here.
        let last = self.list[self.list.len() - 1];
        if last != key {
            self.list[index] = last;
            if let Some(slot) = self.map.get_mut(&last) {
                *slot = index;
            }
        }
        self.list.pop();
        true
    }

    #[inline]
    pub fn get(&self, index: usize) -> FaceKey {
        self.list[index]
    }

    /// Uniformly random face, or `None` when the index is empty.
    pub fn pick(&self, rng: &mut XorShift64) -> Option<FaceKey> {
        if self.list.is_empty() {
            return None;
        }
        Some(self.list[rng.gen_range(0..self.list.len())])
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = FaceKey> + '_ {
        self.list.iter().copied()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[FaceKey] {
        &self.list
    }

    /// Snapshot of the current key set (used for the original-surface map).
    pub fn key_set(&self) -> std::collections::HashSet<FaceKey> {
        self.list.iter().copied().collect()
    }

    /// Verify the map/list lock-step invariant. Test support.
    #[cfg(test)]
    pub fn check_invariants(&self) -> bool {
        self.map.len() == self.list.len()
            && self.map.iter().all(|(k, &i)| self.list[i] == *k)
    }
}

/// Index of every currently visible cube, keyed by grid offset.
///
/// Uses a parallel slot array instead of a hash map: `slot[offset]` holds the
/// cube's position in the list, or [`ActiveCubes::NONE`] when absent. Interior
/// cubes with zero exposed faces are tracked here even though the face index
/// does not know them.
#[derive(Debug, Default)]
pub struct ActiveCubes {
    list: Vec<usize>,
    slot: Vec<usize>,
}

impl ActiveCubes {
    const NONE: usize = usize::MAX;

    /// Create an index able to address `grid_len` offsets.
    pub fn new(grid_len: usize) -> Self {
        Self {
            list: Vec::new(),
            slot: vec![Self::NONE; grid_len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    #[inline]
    pub fn contains(&self, offset: usize) -> bool {
        self.slot[offset] != Self::NONE
    }

    pub fn insert(&mut self, offset: usize) {
        if self.contains(offset) {
            debug_assert!(false, "offset {offset} inserted twice");
            return;
        }
        self.slot[offset] = self.list.len();
        self.list.push(offset);
    }

    /// Swap-with-last removal; absent offsets are a tolerated no-op.
    pub fn remove(&mut self, offset: usize) -> bool {
        let index = self.slot[offset];
        if index == Self::NONE {
            return false;
        }
        self.slot[offset] = Self::NONE;
        // A set slot means the list holds at least that entry.
        let last = self.list[self.list.len() - 1];
        if last != offset {
            self.list[index] = last;
            self.slot[last] = index;
        }
        self.list.pop();
        true
    }

    #[inline]
    pub fn get(&self, index: usize) -> usize {
        self.list[index]
    }

    /// Uniformly random active cube offset.
    pub fn pick(&self, rng: &mut XorShift64) -> Option<usize> {
        if self.list.is_empty() {
            return None;
        }
        Some(self.list[rng.gen_range(0..self.list.len())])
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.list.iter().copied()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[usize] {
        &self.list
    }

    #[cfg(test)]
    pub fn check_invariants(&self) -> bool {
        self.list.iter().enumerate().all(|(i, &off)| self.slot[off] == i)
            && self.slot.iter().filter(|&&s| s != Self::NONE).count() == self.list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_key_roundtrip() {
        for face in 0..6 {
            let key = FaceKey::new(123_456, face);
            assert_eq!(key.offset(), 123_456);
            assert_eq!(key.face(), face);
        }
    }

    #[test]
    fn test_exposed_insert_remove() {
        let mut idx = ExposedFaces::new();
        let a = FaceKey::new(0, 1);
        let b = FaceKey::new(5, 2);
        let c = FaceKey::new(9, 0);
        idx.insert(a);
        idx.insert(b);
        idx.insert(c);
        assert_eq!(idx.len(), 3);
        assert!(idx.check_invariants());

        // Removing a middle element swaps the tail into its place.
        assert!(idx.remove(a));
        assert_eq!(idx.len(), 2);
        assert!(!idx.contains(a));
        assert!(idx.contains(b) && idx.contains(c));
        assert!(idx.check_invariants());

        // Absent key removal is a tolerated no-op.
        assert!(!idx.remove(a));
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn test_exposed_randomized_churn() {
        let mut idx = ExposedFaces::new();
        let mut rng = XorShift64::new(99);
        let mut present: Vec<FaceKey> = Vec::new();

        for step in 0..5_000u64 {
            let grow = present.is_empty() || rng.next_f64() < 0.6;
            if grow {
                let key = FaceKey::new(step as usize, (step % 6) as usize);
                idx.insert(key);
                present.push(key);
            } else {
                let victim = present.swap_remove(rng.gen_range(0..present.len()));
                assert!(idx.remove(victim));
            }
        }
        assert_eq!(idx.len(), present.len());
        assert!(idx.check_invariants());
        for key in present {
            assert!(idx.contains(key));
        }
    }

    #[test]
    fn test_exposed_pick_only_returns_members() {
        let mut idx = ExposedFaces::new();
        let mut rng = XorShift64::new(3);
        assert_eq!(idx.pick(&mut rng), None);
        for off in 0..16 {
            idx.insert(FaceKey::new(off, off % 6));
        }
        for _ in 0..200 {
            let key = idx.pick(&mut rng).unwrap();
            assert!(idx.contains(key));
        }
    }

    #[test]
    fn test_active_insert_remove() {
        let mut idx = ActiveCubes::new(100);
        for off in [3, 17, 42, 99] {
            idx.insert(off);
        }
        assert_eq!(idx.len(), 4);
        assert!(idx.check_invariants());

        assert!(idx.remove(17));
        assert!(!idx.contains(17));
        assert!(!idx.remove(17));
        assert_eq!(idx.len(), 3);
        assert!(idx.check_invariants());

        assert!(idx.remove(99));
        assert!(idx.remove(3));
        assert!(idx.remove(42));
        assert!(idx.is_empty());
    }

    #[test]
    fn test_pick_is_uniformish() {
        let mut idx = ActiveCubes::new(4);
        for off in 0..4 {
            idx.insert(off);
        }
        let mut rng = XorShift64::new(5);
        let mut hits = [0u32; 4];
        for _ in 0..4_000 {
            hits[idx.pick(&mut rng).unwrap()] += 1;
        }
        for h in hits {
            assert!(h > 700, "pick badly skewed: {hits:?}");
        }
    }
}
