// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-element layout attributes.

use core::ops::Mul;

use kurbo::{Affine, Point, Rect, Size};

use crate::types::{ElementCategory, ElementKey, ElementKind, IndexPath};

/// A 4×4 homogeneous transform, row-vector convention (`p' = p · M`).
///
/// The 2-D affine part lives in `m[0][0..2]`, `m[1][0..2]` and `m[3][0..2]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform3D {
    /// Rows of the matrix.
    pub m: [[f64; 4]; 4],
}

impl Transform3D {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// A translation.
    #[must_use]
    pub const fn translation(tx: f64, ty: f64, tz: f64) -> Self {
        let mut t = Self::IDENTITY;
        t.m[3][0] = tx;
        t.m[3][1] = ty;
        t.m[3][2] = tz;
        t
    }

    /// A scale about the origin.
    #[must_use]
    pub const fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut t = Self::IDENTITY;
        t.m[0][0] = sx;
        t.m[1][1] = sy;
        t.m[2][2] = sz;
        t
    }

    /// Embed a 2-D affine transform.
    #[must_use]
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        let mut t = Self::IDENTITY;
        t.m[0][0] = a;
        t.m[0][1] = b;
        t.m[1][0] = c;
        t.m[1][1] = d;
        t.m[3][0] = e;
        t.m[3][1] = f;
        t
    }

    /// The 2-D affine part, ignoring any depth components.
    #[must_use]
    pub fn to_affine(&self) -> Affine {
        let m = &self.m;
        Affine::new([m[0][0], m[0][1], m[1][0], m[1][1], m[3][0], m[3][1]])
    }

    /// Whether the transform is exactly representable as a 2-D affine transform.
    #[must_use]
    pub fn is_affine(&self) -> bool {
        let m = &self.m;
        m[0][2] == 0.0
            && m[0][3] == 0.0
            && m[1][2] == 0.0
            && m[1][3] == 0.0
            && m[2] == [0.0, 0.0, 1.0, 0.0]
            && m[3][2] == 0.0
            && m[3][3] == 1.0
    }

    /// Whether this is the identity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// `a * b` applies `a` first, then `b`.
impl Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        Self { m: out }
    }
}

/// Geometry and presentation state of one element.
///
/// `center` and `size` are derived from `frame`: setting the size keeps the
/// center, setting the center keeps the size.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutAttributes {
    /// Identity of the element.
    pub key: ElementKey,
    /// Frame in content coordinates, before `transform`.
    pub frame: Rect,
    /// Transform applied about the center.
    pub transform: Transform3D,
    /// Opacity in `0.0..=1.0`.
    pub alpha: f64,
    /// Stacking order; higher draws on top.
    pub z_index: i32,
    /// Whether the element is hidden.
    pub hidden: bool,
}

impl LayoutAttributes {
    /// Attributes with default presentation: opaque, untransformed, `z_index` 0.
    #[must_use]
    pub fn new(key: ElementKey, frame: Rect) -> Self {
        Self {
            key,
            frame,
            transform: Transform3D::IDENTITY,
            alpha: 1.0,
            z_index: 0,
            hidden: false,
        }
    }

    /// Attributes of a cell.
    #[must_use]
    pub fn cell(path: IndexPath, frame: Rect) -> Self {
        Self::new(ElementKey::Cell(path), frame)
    }

    /// Attributes of a supplementary view.
    #[must_use]
    pub fn supplementary(kind: ElementKind, path: IndexPath, frame: Rect) -> Self {
        Self::new(ElementKey::Supplementary(kind, path), frame)
    }

    /// Attributes of a decoration view.
    #[must_use]
    pub fn decoration(kind: ElementKind, path: IndexPath, frame: Rect) -> Self {
        Self::new(ElementKey::Decoration(kind, path), frame)
    }

    /// Category of the element.
    #[must_use]
    pub const fn category(&self) -> ElementCategory {
        self.key.category()
    }

    /// Center of the frame.
    #[must_use]
    pub fn center(&self) -> Point {
        self.frame.center()
    }

    /// Moves the frame so its center is `center`.
    pub fn set_center(&mut self, center: Point) {
        self.frame = Rect::from_center_size(center, self.frame.size());
    }

    /// Size of the frame.
    #[must_use]
    pub fn size(&self) -> Size {
        self.frame.size()
    }

    /// Resizes the frame about its center.
    pub fn set_size(&mut self, size: Size) {
        self.frame = Rect::from_center_size(self.frame.center(), size);
    }

    /// The frame in the element's own coordinates.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.frame.size())
    }

    /// The 2-D affine part of [`LayoutAttributes::transform`].
    #[must_use]
    pub fn transform_2d(&self) -> Affine {
        self.transform.to_affine()
    }

    /// Replace the 3-D transform with a 2-D one.
    pub fn set_transform_2d(&mut self, affine: Affine) {
        self.transform = Transform3D::from_affine(affine);
    }
}

/// Interiors intersect: touching edges do not count.
pub(crate) fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_keeps_center_and_center_keeps_size() {
        let mut a = LayoutAttributes::cell(IndexPath::new(0, 0), Rect::new(0.0, 0.0, 10.0, 20.0));
        a.set_size(Size::new(20.0, 10.0));
        assert_eq!(a.center(), Point::new(5.0, 10.0));
        assert_eq!(a.frame, Rect::new(-5.0, 5.0, 15.0, 15.0));
        a.set_center(Point::new(0.0, 0.0));
        assert_eq!(a.size(), Size::new(20.0, 10.0));
        assert_eq!(a.bounds(), Rect::new(0.0, 0.0, 20.0, 10.0));
    }

    #[test]
    fn affine_round_trips_through_3d() {
        let affine = Affine::translate((3.0, 4.0)) * Affine::scale(2.0);
        let mut a = LayoutAttributes::cell(IndexPath::new(0, 0), Rect::ZERO);
        a.set_transform_2d(affine);
        assert!(a.transform.is_affine());
        assert_eq!(a.transform_2d(), affine);

        a.transform.m[2][3] = -0.002;
        assert!(!a.transform.is_affine());
    }

    #[test]
    fn composition_applies_left_first() {
        let t = Transform3D::scale(2.0, 2.0, 1.0) * Transform3D::translation(5.0, 0.0, 0.0);
        // (1, 0) scaled to (2, 0), then moved to (7, 0).
        assert_eq!(t.to_affine() * Point::new(1.0, 0.0), Point::new(7.0, 0.0));
        assert!((Transform3D::IDENTITY * t) == t);
        assert!(Transform3D::default().is_identity());
    }

    #[test]
    fn strict_overlap_excludes_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(overlaps(a, Rect::new(5.0, 5.0, 15.0, 15.0)));
        assert!(!overlaps(a, Rect::new(10.0, 0.0, 20.0, 10.0)));
        assert!(overlaps(Rect::new(2.0, 2.0, 2.0, 4.0), a));
    }
}
