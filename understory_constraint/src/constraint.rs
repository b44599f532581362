// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Constraint values and their identifiers.

use crate::types::{ItemId, LayoutAttribute, Priority, Relation};

/// Identifier for a constraint attached to a [`ConstraintLayout`](crate::ConstraintLayout) (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub(crate) u32, pub(crate) u32);

impl ConstraintId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// `first_item.first_attribute REL second_item.second_attribute * multiplier + constant`
///
/// A `Constraint` is a plain value until it is handed to
/// [`ConstraintLayout::add_constraints`](crate::ConstraintLayout::add_constraints).
/// Once attached, the layout owns it and only the constant can change, through
/// [`ConstraintLayout::set_constant`](crate::ConstraintLayout::set_constant).
///
/// ```rust
/// use understory_constraint::{
///     Constraint, ConstraintLayout, ItemProps, LayoutAttribute, Priority, Relation,
/// };
///
/// let mut layout = ConstraintLayout::new();
/// let a = layout.insert_item(None, ItemProps::default());
/// let b = layout.insert_item(None, ItemProps::default());
///
/// // b.width == a.width * 0.5 + 10, but only as a strong preference.
/// let c = Constraint::new(
///     b,
///     LayoutAttribute::Width,
///     Relation::Equal,
///     a,
///     LayoutAttribute::Width,
///     0.5,
///     10.0,
/// )
/// .with_priority(Priority::DEFAULT_HIGH);
/// assert!(!c.priority.is_required());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    /// Item on the left-hand side.
    pub first_item: ItemId,
    /// Attribute of `first_item`.
    pub first_attribute: LayoutAttribute,
    /// Relation between both sides.
    pub relation: Relation,
    /// Item on the right-hand side, `None` for a constant-only constraint.
    pub second_item: Option<ItemId>,
    /// Attribute of `second_item`, [`LayoutAttribute::NotAnAttribute`] when absent.
    pub second_attribute: LayoutAttribute,
    /// Scale applied to the right-hand attribute.
    pub multiplier: f64,
    /// Offset added to the right-hand side.
    pub constant: f64,
    /// Priority; [`Priority::REQUIRED`] unless changed before attaching.
    pub priority: Priority,
    /// Host hint that this constraint should survive serialization of the item tree.
    pub should_persist: bool,
}

impl Constraint {
    /// A relation between two item attributes.
    pub fn new(
        first_item: ItemId,
        first_attribute: LayoutAttribute,
        relation: Relation,
        second_item: ItemId,
        second_attribute: LayoutAttribute,
        multiplier: f64,
        constant: f64,
    ) -> Self {
        Self {
            first_item,
            first_attribute,
            relation,
            second_item: Some(second_item),
            second_attribute,
            multiplier,
            constant,
            priority: Priority::REQUIRED,
            should_persist: false,
        }
    }

    /// `item.attribute REL constant`.
    pub fn constant(
        item: ItemId,
        attribute: LayoutAttribute,
        relation: Relation,
        constant: f64,
    ) -> Self {
        Self {
            first_item: item,
            first_attribute: attribute,
            relation,
            second_item: None,
            second_attribute: LayoutAttribute::NotAnAttribute,
            multiplier: 0.0,
            constant,
            priority: Priority::REQUIRED,
            should_persist: false,
        }
    }

    /// `first.attribute == second.attribute + constant`, the common alignment form.
    pub fn equal(
        first_item: ItemId,
        second_item: ItemId,
        attribute: LayoutAttribute,
        constant: f64,
    ) -> Self {
        Self::new(
            first_item,
            attribute,
            Relation::Equal,
            second_item,
            attribute,
            1.0,
            constant,
        )
    }

    /// Builder: set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set [`Constraint::should_persist`].
    pub fn persisted(mut self, should_persist: bool) -> Self {
        self.should_persist = should_persist;
        self
    }

    /// Items referenced by this constraint.
    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        core::iter::once(self.first_item).chain(self.second_item)
    }

    /// Check the shape of the constraint, ignoring item liveness.
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        let Some(axis) = self.first_attribute.axis() else {
            return Err("first attribute must not be NotAnAttribute");
        };
        if !self.multiplier.is_finite() || !self.constant.is_finite() {
            return Err("multiplier and constant must be finite");
        }
        match self.second_item {
            None => {
                if self.second_attribute != LayoutAttribute::NotAnAttribute {
                    return Err("second attribute requires a second item");
                }
                if self.first_attribute.is_directional() {
                    return Err("leading/trailing need a second item to measure from");
                }
            }
            Some(_) => {
                let Some(second_axis) = self.second_attribute.axis() else {
                    return Err("second item requires a second attribute");
                };
                let first = self.first_attribute;
                let second = self.second_attribute;
                if first.is_size() != second.is_size() {
                    return Err("cannot relate a location attribute to a size attribute");
                }
                if first.is_location() && axis != second_axis {
                    return Err("cannot relate locations on different axes");
                }
                if (first.is_directional() && second.is_absolute_horizontal_edge())
                    || (second.is_directional() && first.is_absolute_horizontal_edge())
                {
                    return Err("cannot mix leading/trailing with left/right");
                }
                if first.is_location() && self.multiplier == 0.0 {
                    return Err("a location cannot be related to zero times another location");
                }
            }
        }
        Ok(())
    }
}

/// Solve-time state of an attached constraint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConstraintState {
    /// The relation holds within tolerance.
    Satisfied,
    /// An optional constraint the solver could not satisfy.
    Violated {
        /// Magnitude of the violation.
        residual: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (ItemId, ItemId) {
        (ItemId::new(0, 1), ItemId::new(1, 1))
    }

    #[test]
    fn builders() {
        let (a, b) = ids();
        let c = Constraint::equal(a, b, LayoutAttribute::Top, 4.0)
            .with_priority(Priority::DEFAULT_LOW)
            .persisted(true);
        assert_eq!(c.priority, Priority::DEFAULT_LOW);
        assert!(c.should_persist);
        assert_eq!(c.items().collect::<alloc::vec::Vec<_>>(), [a, b]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_mixed_axes_and_kinds() {
        let (a, b) = ids();
        let axes = Constraint::equal(a, b, LayoutAttribute::Top, 0.0);
        let mut axes = axes;
        axes.second_attribute = LayoutAttribute::Left;
        assert!(axes.validate().is_err());

        let kinds = Constraint::new(
            a,
            LayoutAttribute::Width,
            Relation::Equal,
            b,
            LayoutAttribute::Left,
            1.0,
            0.0,
        );
        assert!(kinds.validate().is_err());

        let directional = Constraint::new(
            a,
            LayoutAttribute::Leading,
            Relation::Equal,
            b,
            LayoutAttribute::Right,
            1.0,
            0.0,
        );
        assert!(directional.validate().is_err());
    }

    #[test]
    fn size_across_axes_is_allowed() {
        let (a, b) = ids();
        let aspect = Constraint::new(
            a,
            LayoutAttribute::Width,
            Relation::Equal,
            b,
            LayoutAttribute::Height,
            2.0,
            0.0,
        );
        assert!(aspect.validate().is_ok());
    }

    #[test]
    fn rejects_non_finite_and_dangling_attribute() {
        let (a, _) = ids();
        let nan = Constraint::constant(a, LayoutAttribute::Width, Relation::Equal, f64::NAN);
        assert!(nan.validate().is_err());
        let mut dangling = Constraint::constant(a, LayoutAttribute::Width, Relation::Equal, 1.0);
        dangling.second_attribute = LayoutAttribute::Height;
        assert!(dangling.validate().is_err());
        let none = Constraint::constant(a, LayoutAttribute::NotAnAttribute, Relation::Equal, 1.0);
        assert!(none.validate().is_err());
        let leading = Constraint::constant(a, LayoutAttribute::Leading, Relation::Equal, 1.0);
        assert!(leading.validate().is_err());
    }
}
