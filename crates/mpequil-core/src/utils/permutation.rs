//! Bijective index mapping between solver ordering and original ordering.
//!
//! The solver leaves every per-species array in its original order and keeps
//! the component/noncomponent partition in a [`Permutation`]: the first
//! `n_components` solver positions name the component species, the rest name
//! the noncomponent species. Both directions of the mapping are stored so
//! lookups never scan.

/// A bijection between solver positions and original indices.
///
/// Invariant: `from_original(to_original(p)) == p` for every position `p`.
/// Accessors check bounds; construction and mutation check bijectivity in
/// debug builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    /// Position -> original index.
    fwd: Vec<usize>,
    /// Original index -> position.
    inv: Vec<usize>,
}

impl Permutation {
    /// The identity mapping on `n` indices.
    pub fn identity(n: usize) -> Self {
        Self {
            fwd: (0..n).collect(),
            inv: (0..n).collect(),
        }
    }

    /// Build from an explicit position -> original ordering.
    ///
    /// # Panics
    /// Panics if `order` is not a permutation of `0..order.len()`.
    pub fn from_order(order: Vec<usize>) -> Self {
        let n = order.len();
        let mut inv = vec![usize::MAX; n];
        for (pos, &orig) in order.iter().enumerate() {
            assert!(orig < n, "index {} out of range for length {}", orig, n);
            assert!(
                inv[orig] == usize::MAX,
                "index {} appears more than once",
                orig
            );
            inv[orig] = pos;
        }
        Self { fwd: order, inv }
    }

    pub fn len(&self) -> usize {
        self.fwd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fwd.is_empty()
    }

    /// Original index stored at solver position `pos`.
    pub fn to_original(&self, pos: usize) -> usize {
        self.fwd[pos]
    }

    /// Solver position of original index `orig`.
    pub fn from_original(&self, orig: usize) -> usize {
        self.inv[orig]
    }

    /// Swap the contents of two solver positions.
    pub fn swap_positions(&mut self, a: usize, b: usize) {
        self.fwd.swap(a, b);
        self.inv[self.fwd[a]] = a;
        self.inv[self.fwd[b]] = b;
        debug_assert!(self.is_bijective());
    }

    fn is_bijective(&self) -> bool {
        self.fwd
            .iter()
            .enumerate()
            .all(|(pos, &orig)| orig < self.len() && self.inv[orig] == pos)
    }
}
