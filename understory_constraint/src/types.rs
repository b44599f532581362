// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public vocabulary: attributes, relations, priorities, axes and item identifiers.

use core::fmt;

/// Identifier for a layout item (generational).
///
/// Removing an item bumps the generation stored in its slot, so any copy of
/// the old id is detected as stale in O(1).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) u32, pub(crate) u32);

impl ItemId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Layout axis.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Axis {
    /// The x axis.
    Horizontal,
    /// The y axis.
    Vertical,
}

/// Horizontal reading direction used to resolve leading and trailing edges.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum LayoutDirection {
    /// Leading is the left edge.
    #[default]
    LeftToRight,
    /// Leading is the right edge.
    RightToLeft,
}

/// A named scalar facet of an item's geometry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LayoutAttribute {
    /// Left edge.
    Left,
    /// Right edge.
    Right,
    /// Top edge.
    Top,
    /// Bottom edge.
    Bottom,
    /// Leading edge (left in left-to-right layouts).
    Leading,
    /// Trailing edge (right in left-to-right layouts).
    Trailing,
    /// Width.
    Width,
    /// Height.
    Height,
    /// Horizontal center.
    CenterX,
    /// Vertical center.
    CenterY,
    /// Text baseline, measured from the top edge.
    Baseline,
    /// Placeholder for the second attribute of a constant-only constraint.
    NotAnAttribute,
}

impl LayoutAttribute {
    /// The axis this attribute lives on, or `None` for [`LayoutAttribute::NotAnAttribute`].
    pub const fn axis(self) -> Option<Axis> {
        match self {
            Self::Left
            | Self::Right
            | Self::Leading
            | Self::Trailing
            | Self::Width
            | Self::CenterX => Some(Axis::Horizontal),
            Self::Top | Self::Bottom | Self::Height | Self::CenterY | Self::Baseline => {
                Some(Axis::Vertical)
            }
            Self::NotAnAttribute => None,
        }
    }

    /// Whether this is a size attribute (width or height).
    pub const fn is_size(self) -> bool {
        matches!(self, Self::Width | Self::Height)
    }

    /// Whether this is a location attribute (edge, center or baseline).
    pub const fn is_location(self) -> bool {
        !self.is_size() && !matches!(self, Self::NotAnAttribute)
    }

    /// Whether this attribute depends on the layout direction.
    pub const fn is_directional(self) -> bool {
        matches!(self, Self::Leading | Self::Trailing)
    }

    /// Whether this is an absolute left or right edge.
    pub const fn is_absolute_horizontal_edge(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

/// Relation between the two sides of a constraint.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Relation {
    /// `first <= second * multiplier + constant`
    LessOrEqual,
    /// `first == second * multiplier + constant`
    Equal,
    /// `first >= second * multiplier + constant`
    GreaterOrEqual,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::GreaterOrEqual => ">=",
        })
    }
}

/// Constraint priority in `[0, 1000]`.
///
/// [`Priority::REQUIRED`] constraints must hold exactly. Anything lower is
/// optional: the solver minimizes its weighted violation instead.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Priority(f32);

impl Priority {
    /// Must hold exactly.
    pub const REQUIRED: Self = Self(1000.0);
    /// Default priority for compression resistance.
    pub const DEFAULT_HIGH: Self = Self(750.0);
    /// Default priority for content hugging.
    pub const DEFAULT_LOW: Self = Self(250.0);
    /// Priority used while measuring a fitting size.
    pub const FITTING_SIZE: Self = Self(50.0);

    /// Create a priority, clamping into `[0, 1000]`. NaN maps to zero.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1000.0))
    }

    /// Raw value.
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Whether this is [`Priority::REQUIRED`].
    pub fn is_required(self) -> bool {
        self.0 >= 1000.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::REQUIRED
    }
}

impl From<f32> for Priority {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

/// A pair of values, one per axis.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PerAxis<T> {
    /// Value for [`Axis::Horizontal`].
    pub horizontal: T,
    /// Value for [`Axis::Vertical`].
    pub vertical: T,
}

impl<T: Copy> PerAxis<T> {
    /// Same value on both axes.
    pub const fn splat(value: T) -> Self {
        Self {
            horizontal: value,
            vertical: value,
        }
    }

    /// Value for `axis`.
    pub const fn get(&self, axis: Axis) -> T {
        match axis {
            Axis::Horizontal => self.horizontal,
            Axis::Vertical => self.vertical,
        }
    }

    /// Replace the value for `axis`.
    pub fn set(&mut self, axis: Axis, value: T) {
        match axis {
            Axis::Horizontal => self.horizontal = value,
            Axis::Vertical => self.vertical = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_clamps() {
        assert_eq!(Priority::new(2000.0), Priority::REQUIRED);
        assert_eq!(Priority::new(-3.0).value(), 0.0);
        assert_eq!(Priority::new(f32::NAN).value(), 0.0);
        assert!(Priority::REQUIRED.is_required());
        assert!(!Priority::DEFAULT_HIGH.is_required());
    }

    #[test]
    fn attribute_classification() {
        assert_eq!(LayoutAttribute::Baseline.axis(), Some(Axis::Vertical));
        assert_eq!(LayoutAttribute::Leading.axis(), Some(Axis::Horizontal));
        assert_eq!(LayoutAttribute::NotAnAttribute.axis(), None);
        assert!(LayoutAttribute::Width.is_size());
        assert!(LayoutAttribute::CenterY.is_location());
        assert!(!LayoutAttribute::NotAnAttribute.is_location());
        assert!(LayoutAttribute::Trailing.is_directional());
        assert!(LayoutAttribute::Right.is_absolute_horizontal_edge());
    }

    #[test]
    fn per_axis_access() {
        let mut p = PerAxis::splat(1);
        p.set(Axis::Vertical, 2);
        assert_eq!(p.get(Axis::Horizontal), 1);
        assert_eq!(p.get(Axis::Vertical), 2);
    }
}
