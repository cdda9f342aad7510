//! Connected component labeling of 3D masks using union-find.
//!
//! Single raster pass assigning provisional labels from already visited
//! neighbors, followed by a flattening pass that renumbers components
//! sequentially in order of their first voxel.

use common::buffer3::Buffer3;
use serde::{Deserialize, Serialize};

/// Voxel connectivity for connected component labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Face neighbors only: 6 in 3D, 4 in a planar image.
    Face,
    /// Face, edge and corner neighbors: 26 in 3D, 8 in a planar image.
    #[default]
    Full,
}

impl Connectivity {
    /// Offsets (dz, dy, dx) of neighbors that precede a voxel in raster order.
    fn backward_offsets(self) -> &'static [[isize; 3]] {
        const FACE: [[isize; 3]; 3] = [[-1, 0, 0], [0, -1, 0], [0, 0, -1]];
        const FULL: [[isize; 3]; 13] = [
            [-1, -1, -1],
            [-1, -1, 0],
            [-1, -1, 1],
            [-1, 0, -1],
            [-1, 0, 0],
            [-1, 0, 1],
            [-1, 1, -1],
            [-1, 1, 0],
            [-1, 1, 1],
            [0, -1, -1],
            [0, -1, 0],
            [0, -1, 1],
            [0, 0, -1],
        ];
        match self {
            Connectivity::Face => &FACE,
            Connectivity::Full => &FULL,
        }
    }
}

/// Label volume produced by [`label`]: 0 is background, components are 1..=n.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    labels: Buffer3<u32>,
    num_labels: usize,
}

impl LabelMap {
    /// Number of connected components (excluding background).
    #[inline]
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    #[inline]
    pub fn labels(&self) -> &Buffer3<u32> {
        &self.labels
    }

    #[inline]
    pub fn into_labels(self) -> Buffer3<u32> {
        self.labels
    }
}

/// Label connected `true` regions of `mask`.
pub fn label(mask: &Buffer3<bool>, connectivity: Connectivity) -> LabelMap {
    let [depth, height, width] = mask.shape();
    let mut labels = Buffer3::new_filled(mask.shape(), 0u32);
    if mask.is_empty() {
        return LabelMap {
            labels,
            num_labels: 0,
        };
    }

    let offsets = connectivity.backward_offsets();
    let mut uf = UnionFind::new();

    for z in 0..depth {
        for y in 0..height {
            for x in 0..width {
                let idx = mask.index_of(z, y, x);
                if !mask.voxels()[idx] {
                    continue;
                }

                let mut assigned = 0u32;
                for &[dz, dy, dx] in offsets {
                    let (Some(nz), Some(ny), Some(nx)) = (
                        z.checked_add_signed(dz),
                        y.checked_add_signed(dy),
                        x.checked_add_signed(dx),
                    ) else {
                        continue;
                    };
                    if ny >= height || nx >= width {
                        continue;
                    }
                    let neighbor = labels[(nz, ny, nx)];
                    if neighbor == 0 {
                        continue;
                    }
                    if assigned == 0 {
                        assigned = neighbor;
                    } else if assigned != neighbor {
                        uf.union(assigned, neighbor);
                    }
                }

                labels.voxels_mut()[idx] = if assigned == 0 {
                    uf.make_set()
                } else {
                    assigned
                };
            }
        }
    }

    let num_labels = uf.flatten_labels(&mut labels);
    tracing::trace!("Labeled {} components in {:?} volume", num_labels, mask.shape());

    LabelMap { labels, num_labels }
}

/// Sequential union-find over 1-based provisional labels.
#[derive(Debug)]
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new() -> Self {
        Self {
            parent: Vec::with_capacity(256),
        }
    }

    #[inline]
    fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32 + 1;
        self.parent.push(label);
        label
    }

    /// Find root with path halving.
    #[inline]
    fn find(&mut self, mut label: u32) -> u32 {
        loop {
            let parent = self.parent[(label - 1) as usize];
            if parent == label {
                return label;
            }
            let grandparent = self.parent[(parent - 1) as usize];
            self.parent[(label - 1) as usize] = grandparent;
            label = grandparent;
        }
    }

    #[inline]
    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[(larger - 1) as usize] = smaller;
        }
    }

    /// Rewrite provisional labels to 1..=n in raster order of first voxel.
    fn flatten_labels(&mut self, labels: &mut [u32]) -> usize {
        if self.parent.is_empty() {
            return 0;
        }

        let mut final_label = vec![0u32; self.parent.len()];
        let mut next = 0u32;

        for label in labels.iter_mut() {
            if *label == 0 {
                continue;
            }
            let root = self.find(*label);
            let slot = &mut final_label[(root - 1) as usize];
            if *slot == 0 {
                next += 1;
                *slot = next;
            }
            *label = *slot;
        }

        next as usize
    }
}
