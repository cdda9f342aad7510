//! Dense 3D buffer stored in (z, y, x) raster order.
//!
//! A planar image is a buffer of depth 1. Axes of extent 1 carry no spatial
//! neighborhood, so border queries ignore them.

use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::slice;

/// Shape of a [`Buffer3`] as `[depth, height, width]`.
pub type Shape3 = [usize; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct Buffer3<T> {
    voxels: Vec<T>,
    depth: usize,
    height: usize,
    width: usize,
}

impl<T> Buffer3<T> {
    pub fn new(shape: Shape3, voxels: Vec<T>) -> Self {
        let [depth, height, width] = shape;
        assert_eq!(
            voxels.len(),
            depth * height * width,
            "voxels length must equal depth * height * width"
        );
        Self {
            voxels,
            depth,
            height,
            width,
        }
    }

    #[inline]
    pub fn shape(&self) -> Shape3 {
        [self.depth, self.height, self.width]
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of voxels in one z-plane.
    #[inline]
    pub fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// Linear index of voxel (z, y, x).
    #[inline]
    pub fn index_of(&self, z: usize, y: usize, x: usize) -> usize {
        debug_assert!(z < self.depth && y < self.height && x < self.width);
        (z * self.height + y) * self.width + x
    }

    /// Inverse of [`Buffer3::index_of`].
    #[inline]
    pub fn coords_of(&self, idx: usize) -> [usize; 3] {
        let plane = self.plane_len();
        let z = idx / plane;
        let rem = idx % plane;
        [z, rem / self.width, rem % self.width]
    }

    /// Linear stride of each axis, `[plane, width, 1]`.
    #[inline]
    pub fn strides(&self) -> [usize; 3] {
        [self.plane_len(), self.width, 1]
    }

    #[inline]
    pub fn get(&self, z: usize, y: usize, x: usize) -> &T {
        &self.voxels[self.index_of(z, y, x)]
    }

    #[inline]
    pub fn get_mut(&mut self, z: usize, y: usize, x: usize) -> &mut T {
        let idx = self.index_of(z, y, x);
        &mut self.voxels[idx]
    }

    /// True when (z, y, x) lies on the outer face of any non-singleton axis.
    #[inline]
    pub fn is_border(&self, z: usize, y: usize, x: usize) -> bool {
        let on_face = |pos: usize, extent: usize| extent > 1 && (pos == 0 || pos + 1 == extent);
        on_face(z, self.depth) || on_face(y, self.height) || on_face(x, self.width)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    #[inline]
    pub fn voxels(&self) -> &[T] {
        &self.voxels
    }

    #[inline]
    pub fn voxels_mut(&mut self) -> &mut [T] {
        &mut self.voxels
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.voxels.iter()
    }

    /// Build a buffer of the same shape by mapping every voxel.
    pub fn map<U, F>(&self, f: F) -> Buffer3<U>
    where
        F: FnMut(&T) -> U,
    {
        Buffer3 {
            voxels: self.voxels.iter().map(f).collect(),
            depth: self.depth,
            height: self.height,
            width: self.width,
        }
    }
}

impl<T: Clone> Buffer3<T> {
    pub fn new_filled(shape: Shape3, value: T) -> Self {
        let [depth, height, width] = shape;
        Self {
            voxels: vec![value; depth * height * width],
            depth,
            height,
            width,
        }
    }
}

impl Buffer3<bool> {
    /// Number of `true` voxels.
    pub fn count_set(&self) -> usize {
        self.voxels.iter().filter(|&&v| v).count()
    }
}

impl<T> Index<(usize, usize, usize)> for Buffer3<T> {
    type Output = T;

    #[inline]
    fn index(&self, (z, y, x): (usize, usize, usize)) -> &Self::Output {
        self.get(z, y, x)
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Buffer3<T> {
    #[inline]
    fn index_mut(&mut self, (z, y, x): (usize, usize, usize)) -> &mut Self::Output {
        self.get_mut(z, y, x)
    }
}

impl<T> Deref for Buffer3<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.voxels
    }
}

impl<T> DerefMut for Buffer3<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voxels
    }
}

impl<'a, T> IntoIterator for &'a Buffer3<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.voxels.iter()
    }
}
