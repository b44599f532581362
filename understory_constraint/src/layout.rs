// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The solve set: items, attached constraints and the solver that ties them together.

use alloc::vec::Vec;

use kurbo::{Rect, Size};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::constraint::{Constraint, ConstraintId, ConstraintState};
use crate::error::{ConflictError, ConstraintError, FormatParseError};
use crate::expr::Expression;
use crate::format::{FormatBindings, FormatContext, FormatOptions};
use crate::items::{ItemProps, ItemTable};
use crate::simplex::Solver;
use crate::types::{Axis, ItemId, LayoutAttribute, LayoutDirection, PerAxis, Priority, Relation};

/// Tolerance used when reporting whether a constraint holds.
const SATISFIED_TOLERANCE: f64 = 1.0e-6;

/// Weight bonus for earlier constraints, so equal priorities resolve in insertion order.
const INSERTION_ORDER_BIAS: f64 = 0.5;

/// Configuration of one solve set.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// How leading and trailing resolve.
    pub direction: LayoutDirection,
    /// Spacing of a bare `-` between two views in a visual format string.
    pub standard_sibling_spacing: f64,
    /// Spacing of a bare `-` between a view and a `|` edge.
    pub standard_superview_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::LeftToRight,
            standard_sibling_spacing: 8.0,
            standard_superview_spacing: 20.0,
        }
    }
}

/// Items whose frames changed in a [`ConstraintLayout::solve`].
#[derive(Clone, Debug, Default)]
pub struct SolveSummary {
    /// Items whose frame changed, in slot order.
    pub changed: Vec<ItemId>,
    /// Old and new frames of every changed item.
    pub dirty_rects: Vec<Rect>,
}

impl SolveSummary {
    /// Returns the union of all dirty rects.
    pub fn union_rect(&self) -> Option<Rect> {
        let mut it = self.dirty_rects.iter().copied();
        let first = it.next()?;
        Some(it.fold(first, |acc, r| acc.union(r)))
    }

    /// Whether nothing moved.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

#[derive(Clone, Debug)]
struct ConstraintSlot {
    generation: u32,
    constraint: Constraint,
    /// `lhs - rhs` as attached, kept in sync with the constant.
    expression: Expression,
    implicit: bool,
}

/// A set of items and the constraints that position them.
///
/// Constraints are checked and folded into an incremental simplex tableau as
/// they are attached, so conflicts among required constraints surface from
/// [`ConstraintLayout::add_constraints`] rather than later. Frames only move
/// when [`ConstraintLayout::solve`] is called.
///
/// ## Example
///
/// ```rust
/// use kurbo::Rect;
/// use understory_constraint::{Constraint, ConstraintLayout, ItemProps, LayoutAttribute, Relation};
///
/// let mut layout = ConstraintLayout::new();
/// let root = layout.insert_item(None, ItemProps::default());
/// let child = layout.insert_item(Some(root), ItemProps::default());
///
/// layout
///     .add_constraints([
///         Constraint::constant(root, LayoutAttribute::Left, Relation::Equal, 0.0),
///         Constraint::constant(root, LayoutAttribute::Top, Relation::Equal, 0.0),
///         Constraint::constant(root, LayoutAttribute::Width, Relation::Equal, 200.0),
///         Constraint::constant(root, LayoutAttribute::Height, Relation::Equal, 100.0),
///         Constraint::equal(child, root, LayoutAttribute::Leading, 10.0),
///         Constraint::equal(child, root, LayoutAttribute::Trailing, -10.0),
///         Constraint::equal(child, root, LayoutAttribute::CenterY, 0.0),
///         Constraint::constant(child, LayoutAttribute::Height, Relation::Equal, 20.0),
///     ])
///     .unwrap();
///
/// layout.solve();
/// assert_eq!(layout.frame(child), Some(Rect::new(10.0, 40.0, 190.0, 60.0)));
/// ```
#[derive(Debug)]
pub struct ConstraintLayout {
    config: LayoutConfig,
    items: ItemTable,
    constraints: Vec<Option<ConstraintSlot>>,
    /// last generation per slot (persists across frees)
    constraint_generations: Vec<u32>,
    constraint_free: Vec<usize>,
    solver: Solver<ConstraintId>,
    next_sequence: u64,
}

impl Default for ConstraintLayout {
    fn default() -> Self {
        Self::with_config(LayoutConfig::default())
    }
}

impl ConstraintLayout {
    /// Create an empty left-to-right layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty layout with a specific configuration.
    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            config,
            items: ItemTable::default(),
            constraints: Vec::new(),
            constraint_generations: Vec::new(),
            constraint_free: Vec::new(),
            solver: Solver::new(),
            next_sequence: 0,
        }
    }

    /// The configuration this layout was built with.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    // --- items ---

    /// Insert an item under `parent` (or as a root if `None`).
    ///
    /// Intrinsic sizes in `props` become hugging and compression constraints
    /// right away. A non-finite intrinsic size is treated as no intrinsic size
    /// on that axis, and the stored props say so.
    pub fn insert_item(&mut self, parent: Option<ItemId>, mut props: ItemProps) -> ItemId {
        for axis in [Axis::Horizontal, Axis::Vertical] {
            if props.intrinsic_size.get(axis).is_some_and(|v| !v.is_finite()) {
                debug!(?axis, "ignoring non-finite intrinsic size");
                props.intrinsic_size.set(axis, None);
            }
        }
        let id = self.items.insert(parent, props);
        if let Err(err) = self.attach_intrinsic(id) {
            debug!(?id, %err, "intrinsic size constraints rejected");
            if let Some(slot) = self.items.get_mut(id) {
                slot.props.intrinsic_size = PerAxis::splat(None);
            }
        }
        id
    }

    /// Remove an item and its subtree.
    ///
    /// Every constraint that references a removed item is detached and
    /// dropped. Ids of removed items become stale.
    pub fn remove_item(&mut self, id: ItemId) {
        if !self.items.is_alive(id) {
            return;
        }
        if let Some(parent) = self.items.get(id).and_then(|s| s.parent)
            && let Some(p) = self.items.get_mut(parent)
        {
            p.children.retain(|c| *c != id);
        }
        let subtree = self.items.subtree(id);
        let mut retracted = 0_usize;
        for &item in &subtree {
            let attached: SmallVec<[ConstraintId; 8]> = self
                .items
                .get(item)
                .map(|s| s.constraints.clone())
                .unwrap_or_default();
            for c in attached {
                if self.detach(c).is_some() {
                    retracted += 1;
                }
            }
        }
        for &item in &subtree {
            if let Some(slot) = self.items.free(item) {
                let v = slot.variables;
                for var in [v.x, v.y, v.width, v.height] {
                    self.solver.remove_variable(var);
                }
            }
        }
        debug!(?id, items = subtree.len(), retracted, "removed item subtree");
    }

    /// Whether `id` refers to a live item.
    pub fn is_alive(&self, id: ItemId) -> bool {
        self.items.is_alive(id)
    }

    /// Parent of a live item.
    pub fn parent_of(&self, id: ItemId) -> Option<ItemId> {
        self.items.get(id).and_then(|s| s.parent)
    }

    /// Children of a live item; empty for stale ids.
    pub fn children_of(&self, id: ItemId) -> &[ItemId] {
        self.items.get(id).map_or(&[], |s| s.children.as_slice())
    }

    /// Sizing hints of a live item.
    pub fn item_props(&self, id: ItemId) -> Option<&ItemProps> {
        self.items.get(id).map(|s| &s.props)
    }

    /// Replace the sizing hints of an item.
    ///
    /// When only intrinsic size values change, the implicit constraints are
    /// updated in place. Otherwise they are rebuilt. On error the item keeps
    /// its previous props and implicit constraints.
    pub fn set_item_props(&mut self, id: ItemId, props: ItemProps) -> Result<(), ConstraintError> {
        let Some(slot) = self.items.get(id) else {
            return Err(ConstraintError::StaleItem { index: 0 });
        };
        if [props.intrinsic_size.horizontal, props.intrinsic_size.vertical]
            .into_iter()
            .flatten()
            .any(|v| !v.is_finite())
        {
            return Err(ConstraintError::InvalidConstraint {
                index: 0,
                reason: "intrinsic size must be finite",
            });
        }
        let old = slot.props.clone();
        let same_shape = old.content_hugging == props.content_hugging
            && old.compression_resistance == props.compression_resistance
            && old.intrinsic_size.horizontal.is_some() == props.intrinsic_size.horizontal.is_some()
            && old.intrinsic_size.vertical.is_some() == props.intrinsic_size.vertical.is_some();
        let implicit = slot.intrinsic.clone();
        if same_shape {
            let mut changed: SmallVec<[(ConstraintId, f64); 4]> = SmallVec::new();
            for c in implicit {
                let Some(constraint) = self.constraint(c) else {
                    continue;
                };
                let previous = constraint.constant;
                let axis = constraint.first_attribute.axis().unwrap_or(Axis::Horizontal);
                let Some(value) = props.intrinsic_size.get(axis) else {
                    continue;
                };
                if let Err(err) = self.set_constant(c, value) {
                    for (c, previous) in changed.into_iter().rev() {
                        if let Err(restore) = self.set_constant(c, previous) {
                            debug!(?c, %restore, "intrinsic constant could not be restored");
                        }
                    }
                    return Err(err);
                }
                changed.push((c, previous));
            }
            if let Some(slot) = self.items.get_mut(id) {
                slot.props = props;
            }
            return Ok(());
        }
        for &c in &implicit {
            self.detach(c);
        }
        if let Some(slot) = self.items.get_mut(id) {
            slot.props = props;
        }
        if let Err(err) = self.attach_intrinsic(id) {
            if let Some(slot) = self.items.get_mut(id) {
                slot.props = old;
            }
            if let Err(restore) = self.attach_intrinsic(id) {
                debug!(?id, %restore, "previous intrinsic constraints could not be restored");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Update the intrinsic size of an item.
    pub fn set_intrinsic_size(
        &mut self,
        id: ItemId,
        size: PerAxis<Option<f64>>,
    ) -> Result<(), ConstraintError> {
        let mut props = self
            .item_props(id)
            .cloned()
            .ok_or(ConstraintError::StaleItem { index: 0 })?;
        props.intrinsic_size = size;
        self.set_item_props(id, props)
    }

    /// Update the content hugging priority of an item along `axis`.
    pub fn set_content_hugging_priority(
        &mut self,
        id: ItemId,
        axis: Axis,
        priority: Priority,
    ) -> Result<(), ConstraintError> {
        let mut props = self
            .item_props(id)
            .cloned()
            .ok_or(ConstraintError::StaleItem { index: 0 })?;
        props.content_hugging.set(axis, priority);
        self.set_item_props(id, props)
    }

    /// Update the compression resistance priority of an item along `axis`.
    pub fn set_compression_resistance_priority(
        &mut self,
        id: ItemId,
        axis: Axis,
        priority: Priority,
    ) -> Result<(), ConstraintError> {
        let mut props = self
            .item_props(id)
            .cloned()
            .ok_or(ConstraintError::StaleItem { index: 0 })?;
        props.compression_resistance.set(axis, priority);
        self.set_item_props(id, props)
    }

    // --- constraints ---

    /// Attach a batch of constraints.
    ///
    /// The batch is all or nothing: if any constraint is malformed, references
    /// a removed item, or is a required constraint that cannot hold together
    /// with the required constraints already attached, nothing from the
    /// batch stays attached and the error names the offending position.
    /// Optional constraints never conflict.
    pub fn add_constraints(
        &mut self,
        constraints: impl IntoIterator<Item = Constraint>,
    ) -> Result<Vec<ConstraintId>, ConstraintError> {
        let batch: Vec<Constraint> = constraints.into_iter().collect();
        for (index, c) in batch.iter().enumerate() {
            if !c.items().all(|i| self.items.is_alive(i)) {
                return Err(ConstraintError::StaleItem { index });
            }
            c.validate()
                .map_err(|reason| ConstraintError::InvalidConstraint { index, reason })?;
        }
        let mut added = Vec::with_capacity(batch.len());
        for (index, c) in batch.into_iter().enumerate() {
            match self.attach(c, false) {
                Ok(id) => added.push(id),
                Err(constraint) => {
                    debug!(
                        index,
                        rolled_back = added.len(),
                        "required constraint conflicts, rolling back batch"
                    );
                    for id in added.into_iter().rev() {
                        self.detach(id);
                    }
                    return Err(ConflictError { index, constraint }.into());
                }
            }
        }
        trace!(count = added.len(), "attached constraints");
        Ok(added)
    }

    /// Detach constraints, returning their values. Stale ids are skipped.
    pub fn remove_constraints(&mut self, ids: &[ConstraintId]) -> Vec<Constraint> {
        ids.iter().filter_map(|id| self.detach(*id)).collect()
    }

    /// Change the constant of an attached constraint in place.
    ///
    /// Only tableau rows that mention this constraint are touched before a
    /// dual simplex pass, which keeps per-frame animation of constants cheap.
    /// If the new value makes the required constraints infeasible, the old
    /// constant stays in effect and a conflict is returned.
    pub fn set_constant(&mut self, id: ConstraintId, value: f64) -> Result<(), ConstraintError> {
        let old = self
            .constraint(id)
            .ok_or(ConstraintError::UnknownConstraint(id))?
            .constant;
        if !value.is_finite() {
            return Err(ConstraintError::InvalidConstraint {
                index: 0,
                reason: "multiplier and constant must be finite",
            });
        }
        if old == value {
            return Ok(());
        }
        let delta = old - value;
        if self.solver.change_constant(id, delta).is_err() {
            let mut constraint = self
                .constraint(id)
                .cloned()
                .ok_or(ConstraintError::UnknownConstraint(id))?;
            constraint.constant = value;
            debug!(?id, old, value, "constant change conflicts, keeping old value");
            return Err(ConflictError {
                index: 0,
                constraint,
            }
            .into());
        }
        if let Some(slot) = self.constraint_slot_mut(id) {
            slot.constraint.constant = value;
            slot.expression.constant += delta;
        }
        Ok(())
    }

    /// An attached constraint.
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraint_slot(id).map(|s| &s.constraint)
    }

    /// Whether `id` is attached.
    pub fn is_attached(&self, id: ConstraintId) -> bool {
        self.constraint_slot(id).is_some()
    }

    /// Attached constraint ids in slot order, implicit intrinsic constraints included.
    pub fn constraint_ids(&self) -> impl Iterator<Item = ConstraintId> + '_ {
        self.constraints.iter().enumerate().filter_map(|(idx, slot)| {
            slot.as_ref().map(|s| {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "ConstraintId uses 32-bit indices by design."
                )]
                let idx = idx as u32;
                ConstraintId::new(idx, s.generation)
            })
        })
    }

    /// Whether an attached constraint was generated from an item's intrinsic size.
    pub fn is_implicit(&self, id: ConstraintId) -> bool {
        self.constraint_slot(id).is_some_and(|s| s.implicit)
    }

    /// Magnitude by which an attached constraint is currently violated.
    ///
    /// Always near zero for required constraints.
    pub fn residual(&self, id: ConstraintId) -> Option<f64> {
        let slot = self.constraint_slot(id)?;
        let v = slot.expression.evaluate(|var| self.solver.value_of(var));
        Some(match slot.constraint.relation {
            Relation::Equal => v.abs(),
            Relation::LessOrEqual => v.max(0.0),
            Relation::GreaterOrEqual => (-v).max(0.0),
        })
    }

    /// Whether an attached constraint currently holds.
    pub fn constraint_state(&self, id: ConstraintId) -> Option<ConstraintState> {
        let residual = self.residual(id)?;
        Some(if residual <= SATISFIED_TOLERANCE {
            ConstraintState::Satisfied
        } else {
            ConstraintState::Violated { residual }
        })
    }

    // --- solving and queries ---

    /// Copy solved values into item frames.
    ///
    /// Returns the items whose frames moved, with their old and new frames.
    pub fn solve(&mut self) -> SolveSummary {
        let mut summary = SolveSummary::default();
        for (id, slot) in self.items.iter_mut() {
            let v = slot.variables;
            let x = self.solver.value_of(v.x);
            let y = self.solver.value_of(v.y);
            let w = self.solver.value_of(v.width);
            let h = self.solver.value_of(v.height);
            let frame = Rect::new(x, y, x + w, y + h);
            if frame != slot.frame {
                summary.changed.push(id);
                summary.dirty_rects.push(slot.frame);
                summary.dirty_rects.push(frame);
                slot.frame = frame;
            }
        }
        trace!(changed = summary.changed.len(), "solved");
        summary
    }

    /// Frame of a live item in layout space, as of the last [`ConstraintLayout::solve`].
    pub fn frame(&self, id: ItemId) -> Option<Rect> {
        self.items.get(id).map(|s| s.frame)
    }

    /// Frame of a live item relative to its parent's origin.
    pub fn local_frame(&self, id: ItemId) -> Option<Rect> {
        let frame = self.frame(id)?;
        let origin = self
            .parent_of(id)
            .and_then(|p| self.frame(p))
            .map_or(kurbo::Vec2::ZERO, |r| r.origin().to_vec2());
        Some(frame - origin)
    }

    /// Value of one attribute of a live item in layout space, as of the last solve.
    pub fn value_of(&self, id: ItemId, attribute: LayoutAttribute) -> Option<f64> {
        let slot = self.items.get(id)?;
        let f = slot.frame;
        let rtl = self.config.direction == LayoutDirection::RightToLeft;
        Some(match attribute {
            LayoutAttribute::Left => f.x0,
            LayoutAttribute::Right => f.x1,
            LayoutAttribute::Top => f.y0,
            LayoutAttribute::Bottom => f.y1,
            LayoutAttribute::Leading => {
                if rtl {
                    f.x1
                } else {
                    f.x0
                }
            }
            LayoutAttribute::Trailing => {
                if rtl {
                    f.x0
                } else {
                    f.x1
                }
            }
            LayoutAttribute::Width => f.width(),
            LayoutAttribute::Height => f.height(),
            LayoutAttribute::CenterX => f.center().x,
            LayoutAttribute::CenterY => f.center().y,
            LayoutAttribute::Baseline => f.y0 + slot.props.baseline_offset.unwrap_or(f.height()),
            LayoutAttribute::NotAnAttribute => return None,
        })
    }

    /// Whether the attached constraints leave some part of the item's frame undetermined.
    pub fn has_ambiguous_layout(&self, id: ItemId) -> bool {
        let Some(slot) = self.items.get(id) else {
            return false;
        };
        let v = slot.variables;
        [v.x, v.y, v.width, v.height]
            .into_iter()
            .any(|var| self.solver.is_ambiguous(var))
    }

    /// Constraints that influence `id` along `axis`, directly or through other items.
    pub fn constraints_affecting(&self, id: ItemId, axis: Axis) -> Vec<ConstraintId> {
        let mut found: Vec<ConstraintId> = Vec::new();
        let mut visited: Vec<ItemId> = alloc::vec![id];
        let mut queue: Vec<ItemId> = alloc::vec![id];
        while let Some(item) = queue.pop() {
            let Some(slot) = self.items.get(item) else {
                continue;
            };
            for &cid in &slot.constraints {
                let Some(c) = self.constraint(cid) else {
                    continue;
                };
                let on_axis = c.first_attribute.axis() == Some(axis)
                    || c.second_attribute.axis() == Some(axis);
                if !on_axis || found.contains(&cid) {
                    continue;
                }
                found.push(cid);
                for other in c.items() {
                    if !visited.contains(&other) {
                        visited.push(other);
                        queue.push(other);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    /// Size the item would take if it were pulled towards `target` at [`Priority::FITTING_SIZE`].
    ///
    /// Frames are left untouched.
    pub fn fitting_size(&mut self, id: ItemId, target: Size) -> Option<Size> {
        let vars = self.items.get(id)?.variables;
        let pulls = [
            Constraint::constant(id, LayoutAttribute::Width, Relation::Equal, target.width),
            Constraint::constant(id, LayoutAttribute::Height, Relation::Equal, target.height),
        ];
        let mut attached: SmallVec<[ConstraintId; 2]> = SmallVec::new();
        for c in pulls {
            match self.attach(c.with_priority(Priority::FITTING_SIZE), false) {
                Ok(cid) => attached.push(cid),
                Err(_) => {
                    for cid in attached {
                        self.detach(cid);
                    }
                    return None;
                }
            }
        }
        let size = Size::new(
            self.solver.value_of(vars.width),
            self.solver.value_of(vars.height),
        );
        for cid in attached {
            self.detach(cid);
        }
        Some(size)
    }

    // --- visual format ---

    /// Parse a visual format string into detached constraints.
    ///
    /// `|` edges refer to the parent of the adjacent view.
    pub fn constraints_with_visual_format(
        &self,
        format: &str,
        options: FormatOptions,
        bindings: &FormatBindings<'_>,
    ) -> Result<Vec<Constraint>, FormatParseError> {
        let cx = FormatContext {
            parent_of: &|id: ItemId| self.parent_of(id),
            sibling_spacing: self.config.standard_sibling_spacing,
            superview_spacing: self.config.standard_superview_spacing,
        };
        crate::format::constraints_from_format(format, options, bindings, &cx)
    }

    /// Parse a visual format string and attach the result as one batch.
    pub fn add_visual_format(
        &mut self,
        format: &str,
        options: FormatOptions,
        bindings: &FormatBindings<'_>,
    ) -> Result<Vec<ConstraintId>, ConstraintError> {
        let constraints = self.constraints_with_visual_format(format, options, bindings)?;
        self.add_constraints(constraints)
    }

    // --- internals ---

    fn constraint_slot(&self, id: ConstraintId) -> Option<&ConstraintSlot> {
        self.constraints
            .get(id.idx())
            .and_then(|s| s.as_ref())
            .filter(|s| s.generation == id.1)
    }

    fn constraint_slot_mut(&mut self, id: ConstraintId) -> Option<&mut ConstraintSlot> {
        self.constraints
            .get_mut(id.idx())
            .and_then(|s| s.as_mut())
            .filter(|s| s.generation == id.1)
    }

    fn build_expression(&self, c: &Constraint) -> Option<Expression> {
        let mirrored = self.config.direction == LayoutDirection::RightToLeft
            && (c.first_attribute.is_directional() || c.second_attribute.is_directional());
        let first = self.items.get(c.first_item)?;
        let mut expr =
            first
                .variables
                .expression(c.first_attribute, mirrored, first.props.baseline_offset);
        if let Some(second_id) = c.second_item {
            let second = self.items.get(second_id)?;
            let rhs = second.variables.expression(
                c.second_attribute,
                mirrored,
                second.props.baseline_offset,
            );
            expr.add_scaled(&rhs, -c.multiplier);
        }
        expr.constant -= c.constant;
        Some(expr)
    }

    fn allocate_constraint_id(&mut self) -> ConstraintId {
        let (idx, generation) = if let Some(idx) = self.constraint_free.pop() {
            let generation = self.constraint_generations[idx].saturating_add(1);
            self.constraint_generations[idx] = generation;
            (idx, generation)
        } else {
            self.constraints.push(None);
            self.constraint_generations.push(1);
            (self.constraints.len() - 1, 1)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "ConstraintId uses 32-bit indices by design."
        )]
        ConstraintId::new(idx as u32, generation)
    }

    /// Attach one validated constraint, handing it back if the solver rejects it.
    fn attach(
        &mut self,
        constraint: Constraint,
        implicit: bool,
    ) -> Result<ConstraintId, Constraint> {
        let Some(expression) = self.build_expression(&constraint) else {
            return Err(constraint);
        };
        let id = self.allocate_constraint_id();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let weight = (!constraint.priority.is_required()).then(|| {
            f64::from(constraint.priority.value())
                + INSERTION_ORDER_BIAS / (1.0 + sequence as f64)
        });
        if let Err(err) =
            self.solver
                .add_constraint(id, &expression, constraint.relation, weight)
        {
            debug!(?id, ?err, "solver rejected constraint");
            self.constraint_free.push(id.idx());
            return Err(constraint);
        }
        for item in constraint.items() {
            if let Some(slot) = self.items.get_mut(item)
                && !slot.constraints.contains(&id)
            {
                slot.constraints.push(id);
            }
        }
        self.constraints[id.idx()] = Some(ConstraintSlot {
            generation: id.1,
            constraint,
            expression,
            implicit,
        });
        Ok(id)
    }

    fn detach(&mut self, id: ConstraintId) -> Option<Constraint> {
        self.constraint_slot(id)?;
        let slot = self.constraints[id.idx()].take()?;
        self.constraint_free.push(id.idx());
        if let Err(err) = self.solver.remove_constraint(id) {
            debug!(?id, ?err, "solver failed to retract constraint");
        }
        for item in slot.constraint.items() {
            if let Some(s) = self.items.get_mut(item) {
                s.constraints.retain(|c| *c != id);
                s.intrinsic.retain(|c| *c != id);
            }
        }
        Some(slot.constraint)
    }

    fn attach_intrinsic(&mut self, id: ItemId) -> Result<(), ConstraintError> {
        let Some(slot) = self.items.get(id) else {
            return Err(ConstraintError::StaleItem { index: 0 });
        };
        let props = slot.props.clone();
        let mut implicit: SmallVec<[ConstraintId; 4]> = SmallVec::new();
        for (axis, attribute) in [
            (Axis::Horizontal, LayoutAttribute::Width),
            (Axis::Vertical, LayoutAttribute::Height),
        ] {
            let Some(value) = props.intrinsic_size.get(axis) else {
                continue;
            };
            let pair = [
                Constraint::constant(id, attribute, Relation::LessOrEqual, value)
                    .with_priority(props.content_hugging.get(axis)),
                Constraint::constant(id, attribute, Relation::GreaterOrEqual, value)
                    .with_priority(props.compression_resistance.get(axis)),
            ];
            for (index, c) in pair.into_iter().enumerate() {
                match self.attach(c, true) {
                    Ok(cid) => implicit.push(cid),
                    Err(constraint) => {
                        for cid in implicit {
                            self.detach(cid);
                        }
                        return Err(ConflictError { index, constraint }.into());
                    }
                }
            }
        }
        if let Some(slot) = self.items.get_mut(id) {
            slot.intrinsic = implicit;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatBindings;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1.0e-6
    }

    fn close_rect(a: Option<Rect>, b: Rect) -> bool {
        a.is_some_and(|a| {
            close(a.x0, b.x0) && close(a.y0, b.y0) && close(a.x1, b.x1) && close(a.y1, b.y1)
        })
    }

    fn pin(id: ItemId, rect: Rect) -> [Constraint; 4] {
        [
            Constraint::constant(id, LayoutAttribute::Left, Relation::Equal, rect.x0),
            Constraint::constant(id, LayoutAttribute::Top, Relation::Equal, rect.y0),
            Constraint::constant(id, LayoutAttribute::Width, Relation::Equal, rect.width()),
            Constraint::constant(id, LayoutAttribute::Height, Relation::Equal, rect.height()),
        ]
    }

    #[test]
    fn leading_and_trailing_insets() {
        let mut l = ConstraintLayout::new();
        let root = l.insert_item(None, ItemProps::default());
        let child = l.insert_item(Some(root), ItemProps::default());
        l.add_constraints(pin(root, Rect::new(0.0, 0.0, 300.0, 200.0)))
            .unwrap();
        l.add_constraints([
            Constraint::equal(child, root, LayoutAttribute::Leading, 20.0),
            Constraint::equal(child, root, LayoutAttribute::Trailing, -20.0),
            Constraint::equal(child, root, LayoutAttribute::Top, 10.0),
            Constraint::constant(child, LayoutAttribute::Height, Relation::Equal, 30.0),
        ])
        .unwrap();
        let summary = l.solve();
        assert_eq!(summary.changed.len(), 2);
        assert!(close_rect(l.frame(child), Rect::new(20.0, 10.0, 280.0, 40.0)));
        assert!(close_rect(l.local_frame(child), Rect::new(20.0, 10.0, 280.0, 40.0)));
        assert!(l.solve().is_empty(), "second solve changes nothing");
    }

    #[test]
    fn right_to_left_mirrors_leading() {
        let mut l = ConstraintLayout::with_config(LayoutConfig {
            direction: LayoutDirection::RightToLeft,
            ..LayoutConfig::default()
        });
        let root = l.insert_item(None, ItemProps::default());
        let a = l.insert_item(Some(root), ItemProps::default());
        let b = l.insert_item(Some(root), ItemProps::default());
        l.add_constraints(pin(root, Rect::new(0.0, 0.0, 300.0, 100.0)))
            .unwrap();
        l.add_constraints([
            Constraint::equal(a, root, LayoutAttribute::Leading, 20.0),
            Constraint::constant(a, LayoutAttribute::Width, Relation::Equal, 50.0),
            Constraint::new(
                b,
                LayoutAttribute::Leading,
                Relation::Equal,
                a,
                LayoutAttribute::Trailing,
                1.0,
                10.0,
            ),
            Constraint::constant(b, LayoutAttribute::Width, Relation::Equal, 40.0),
        ])
        .unwrap();
        l.solve();
        let fa = l.frame(a).unwrap();
        let fb = l.frame(b).unwrap();
        assert!(close(fa.x1, 280.0) && close(fa.x0, 230.0), "{fa:?}");
        assert!(close(fb.x1, 220.0) && close(fb.x0, 180.0), "{fb:?}");
        assert_eq!(l.value_of(a, LayoutAttribute::Leading), Some(fa.x1));
    }

    #[test]
    fn conflicting_batch_is_rolled_back() {
        let mut l = ConstraintLayout::new();
        let a = l.insert_item(None, ItemProps::default());
        l.add_constraints([Constraint::constant(a, LayoutAttribute::Width, Relation::Equal, 10.0)])
            .unwrap();
        let before = l.constraint_ids().count();
        let err = l
            .add_constraints([
                Constraint::constant(a, LayoutAttribute::Height, Relation::Equal, 5.0),
                Constraint::constant(a, LayoutAttribute::Width, Relation::Equal, 20.0),
            ])
            .unwrap_err();
        match err {
            ConstraintError::Conflict(c) => {
                assert_eq!(c.index, 1);
                assert_eq!(c.constraint.constant, 20.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(l.constraint_ids().count(), before);
        l.solve();
        let size = l.frame(a).unwrap().size();
        assert!(close(size.width, 10.0) && close(size.height, 0.0));
    }

    #[test]
    fn conflicting_inequality_leaves_kept_bound_enforced() {
        let mut l = ConstraintLayout::new();
        let a = l.insert_item(None, ItemProps::default());
        let keep = l
            .add_constraints([Constraint::constant(
                a,
                LayoutAttribute::Width,
                Relation::GreaterOrEqual,
                10.0,
            )])
            .unwrap();
        l.solve();
        let before = l.frame(a);
        assert!(matches!(
            l.add_constraints([Constraint::constant(
                a,
                LayoutAttribute::Width,
                Relation::LessOrEqual,
                5.0,
            )]),
            Err(ConstraintError::Conflict(_))
        ));
        l.solve();
        assert!(l.residual(keep[0]).unwrap() <= 1.0e-6);
        assert_eq!(l.constraint_state(keep[0]), Some(ConstraintState::Satisfied));
        assert_eq!(l.frame(a), before);
        assert!(l.frame(a).unwrap().width() >= 10.0 - 1.0e-6);
        // A compatible upper bound is still accepted afterwards.
        l.add_constraints([Constraint::constant(
            a,
            LayoutAttribute::Width,
            Relation::LessOrEqual,
            15.0,
        )])
        .unwrap();
        l.solve();
        let w = l.frame(a).unwrap().width();
        assert!((10.0 - 1.0e-6..=15.0 + 1.0e-6).contains(&w), "width {w}");
    }

    #[test]
    fn non_finite_intrinsic_size_is_dropped() {
        let mut l = ConstraintLayout::new();
        let a = l.insert_item(None, ItemProps::with_intrinsic_size(f64::NAN, 20.0));
        let props = l.item_props(a).unwrap();
        assert_eq!(props.intrinsic_size.horizontal, None);
        assert_eq!(props.intrinsic_size.vertical, Some(20.0));
        assert_eq!(l.constraint_ids().filter(|c| l.is_implicit(*c)).count(), 2);
        assert!(matches!(
            l.set_intrinsic_size(
                a,
                PerAxis {
                    horizontal: Some(f64::INFINITY),
                    vertical: Some(20.0),
                },
            ),
            Err(ConstraintError::InvalidConstraint { .. })
        ));
        assert_eq!(l.item_props(a).unwrap().intrinsic_size.horizontal, None);
    }

    #[test]
    fn failed_intrinsic_update_keeps_previous_props() {
        let mut l = ConstraintLayout::new();
        let props = ItemProps {
            content_hugging: PerAxis::splat(Priority::REQUIRED),
            compression_resistance: PerAxis::splat(Priority::REQUIRED),
            ..ItemProps::with_intrinsic_size(50.0, 20.0)
        };
        let a = l.insert_item(None, props);
        l.add_constraints([Constraint::constant(
            a,
            LayoutAttribute::Height,
            Relation::GreaterOrEqual,
            15.0,
        )])
        .unwrap();
        // The width change alone fits; the height change does not.
        let err = l
            .set_intrinsic_size(
                a,
                PerAxis {
                    horizontal: Some(60.0),
                    vertical: Some(10.0),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ConstraintError::Conflict(_)));
        let kept = l.item_props(a).unwrap().intrinsic_size;
        assert_eq!(kept.horizontal, Some(50.0));
        assert_eq!(kept.vertical, Some(20.0));
        l.solve();
        assert!(close_rect(l.frame(a), Rect::new(0.0, 0.0, 50.0, 20.0)));
        let constants: Vec<f64> = l
            .constraint_ids()
            .filter(|c| l.is_implicit(*c))
            .filter_map(|c| l.constraint(c).map(|c| c.constant))
            .collect();
        assert_eq!(constants, [50.0, 50.0, 20.0, 20.0]);
    }

    #[test]
    fn invalid_and_stale_constraints_are_rejected_up_front() {
        let mut l = ConstraintLayout::new();
        let a = l.insert_item(None, ItemProps::default());
        let b = l.insert_item(None, ItemProps::default());
        let mixed = Constraint::new(
            a,
            LayoutAttribute::Top,
            Relation::Equal,
            b,
            LayoutAttribute::Left,
            1.0,
            0.0,
        );
        assert!(matches!(
            l.add_constraints([
                Constraint::constant(a, LayoutAttribute::Width, Relation::Equal, 1.0),
                mixed,
            ]),
            Err(ConstraintError::InvalidConstraint { index: 1, .. })
        ));
        assert_eq!(l.constraint_ids().count(), 0);
        l.remove_item(b);
        assert!(matches!(
            l.add_constraints([Constraint::equal(a, b, LayoutAttribute::Top, 0.0)]),
            Err(ConstraintError::StaleItem { index: 0 })
        ));
    }

    #[test]
    fn set_constant_updates_in_place() {
        let mut l = ConstraintLayout::new();
        let root = l.insert_item(None, ItemProps::default());
        let child = l.insert_item(Some(root), ItemProps::default());
        l.add_constraints(pin(root, Rect::new(0.0, 0.0, 100.0, 100.0)))
            .unwrap();
        let ids = l
            .add_constraints([
                Constraint::equal(child, root, LayoutAttribute::Left, 5.0),
                Constraint::constant(child, LayoutAttribute::Width, Relation::Equal, 10.0),
            ])
            .unwrap();
        l.set_constant(ids[0], 30.0).unwrap();
        l.solve();
        assert!(close(l.frame(child).unwrap().x0, 30.0));
        assert_eq!(l.constraint(ids[0]).unwrap().constant, 30.0);
        assert!(matches!(
            l.set_constant(ConstraintId::new(99, 1), 1.0),
            Err(ConstraintError::UnknownConstraint(_))
        ));
    }

    #[test]
    fn set_constant_conflict_keeps_old_value() {
        let mut l = ConstraintLayout::new();
        let a = l.insert_item(None, ItemProps::default());
        let ids = l
            .add_constraints([
                Constraint::constant(a, LayoutAttribute::Width, Relation::GreaterOrEqual, 10.0),
                Constraint::constant(a, LayoutAttribute::Width, Relation::LessOrEqual, 20.0),
            ])
            .unwrap();
        assert!(matches!(
            l.set_constant(ids[0], 50.0),
            Err(ConstraintError::Conflict(_))
        ));
        assert_eq!(l.constraint(ids[0]).unwrap().constant, 10.0);
        l.solve();
        let w = l.frame(a).unwrap().width();
        assert!((10.0 - 1.0e-6..=20.0 + 1.0e-6).contains(&w));
    }

    #[test]
    fn removing_an_item_retracts_its_constraints() {
        let mut l = ConstraintLayout::new();
        let root = l.insert_item(None, ItemProps::default());
        let child = l.insert_item(Some(root), ItemProps::default());
        let grandchild = l.insert_item(Some(child), ItemProps::default());
        let keep = l
            .add_constraints([Constraint::constant(root, LayoutAttribute::Width, Relation::Equal, 100.0)])
            .unwrap();
        let gone = l
            .add_constraints([
                Constraint::equal(child, root, LayoutAttribute::Width, 0.0),
                Constraint::equal(grandchild, child, LayoutAttribute::Width, 0.0),
            ])
            .unwrap();
        l.remove_item(child);
        assert!(!l.is_alive(child));
        assert!(!l.is_alive(grandchild));
        assert!(l.children_of(root).is_empty());
        assert!(l.is_attached(keep[0]));
        assert!(gone.iter().all(|id| !l.is_attached(*id)));
        // The freed slot comes back with a new generation.
        let fresh = l.insert_item(Some(root), ItemProps::default());
        assert_ne!(fresh, child);
        assert!(l.frame(child).is_none());
    }

    #[test]
    fn intrinsic_size_hugs_and_resists() {
        let mut l = ConstraintLayout::new();
        let label = l.insert_item(None, ItemProps::with_intrinsic_size(80.0, 20.0));
        l.solve();
        assert!(close_rect(l.frame(label), Rect::new(0.0, 0.0, 80.0, 20.0)));

        let squeeze = l
            .add_constraints([Constraint::constant(label, LayoutAttribute::Width, Relation::Equal, 60.0)])
            .unwrap();
        l.solve();
        assert!(close(l.frame(label).unwrap().width(), 60.0));
        l.remove_constraints(&squeeze);

        l.set_intrinsic_size(
            label,
            PerAxis {
                horizontal: Some(120.0),
                vertical: Some(20.0),
            },
        )
        .unwrap();
        l.solve();
        assert!(close(l.frame(label).unwrap().width(), 120.0));
        assert_eq!(
            l.constraint_ids().filter(|c| l.is_implicit(*c)).count(),
            4,
            "fast path keeps the same implicit constraints"
        );

        l.set_intrinsic_size(
            label,
            PerAxis {
                horizontal: Some(120.0),
                vertical: None,
            },
        )
        .unwrap();
        assert_eq!(l.constraint_ids().filter(|c| l.is_implicit(*c)).count(), 2);
    }

    #[test]
    fn hugging_priority_decides_who_stretches() {
        let mut l = ConstraintLayout::new();
        let row = l.insert_item(None, ItemProps::default());
        let a = l.insert_item(Some(row), ItemProps::with_intrinsic_size(40.0, 10.0));
        let b = l.insert_item(Some(row), ItemProps::with_intrinsic_size(40.0, 10.0));
        l.set_content_hugging_priority(a, Axis::Horizontal, Priority::new(251.0))
            .unwrap();
        l.add_constraints(pin(row, Rect::new(0.0, 0.0, 200.0, 10.0)))
            .unwrap();
        l.add_constraints([
            Constraint::equal(a, row, LayoutAttribute::Left, 0.0),
            Constraint::new(
                b,
                LayoutAttribute::Left,
                Relation::Equal,
                a,
                LayoutAttribute::Right,
                1.0,
                0.0,
            ),
            Constraint::equal(b, row, LayoutAttribute::Right, 0.0),
        ])
        .unwrap();
        l.solve();
        assert!(close(l.frame(a).unwrap().width(), 40.0));
        assert!(close(l.frame(b).unwrap().width(), 160.0));
    }

    #[test]
    fn equal_priorities_resolve_in_insertion_order() {
        let mut l = ConstraintLayout::new();
        let a = l.insert_item(None, ItemProps::default());
        let p = Priority::new(500.0);
        l.add_constraints([
            Constraint::constant(a, LayoutAttribute::Left, Relation::Equal, 10.0).with_priority(p),
            Constraint::constant(a, LayoutAttribute::Left, Relation::Equal, 20.0).with_priority(p),
        ])
        .unwrap();
        l.solve();
        assert!(close(l.frame(a).unwrap().x0, 10.0));
    }

    #[test]
    fn residuals_report_optional_violation() {
        let mut l = ConstraintLayout::new();
        let a = l.insert_item(None, ItemProps::default());
        let ids = l
            .add_constraints([
                Constraint::constant(a, LayoutAttribute::Width, Relation::LessOrEqual, 50.0),
                Constraint::constant(a, LayoutAttribute::Width, Relation::Equal, 80.0)
                    .with_priority(Priority::DEFAULT_HIGH),
            ])
            .unwrap();
        assert_eq!(l.constraint_state(ids[0]), Some(ConstraintState::Satisfied));
        match l.constraint_state(ids[1]) {
            Some(ConstraintState::Violated { residual }) => assert!(close(residual, 30.0)),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn ambiguity_and_affecting_constraints() {
        let mut l = ConstraintLayout::new();
        let root = l.insert_item(None, ItemProps::default());
        let child = l.insert_item(Some(root), ItemProps::default());
        let root_ids = l
            .add_constraints(pin(root, Rect::new(0.0, 0.0, 100.0, 100.0)))
            .unwrap();
        let ids = l
            .add_constraints([
                Constraint::equal(child, root, LayoutAttribute::Left, 0.0),
                Constraint::equal(child, root, LayoutAttribute::Width, 0.0),
                Constraint::equal(child, root, LayoutAttribute::Top, 0.0),
            ])
            .unwrap();
        assert!(!l.has_ambiguous_layout(root));
        assert!(l.has_ambiguous_layout(child), "height is free");
        l.add_constraints([Constraint::constant(child, LayoutAttribute::Height, Relation::Equal, 5.0)])
            .unwrap();
        assert!(!l.has_ambiguous_layout(child));

        let affecting = l.constraints_affecting(child, Axis::Horizontal);
        assert!(affecting.contains(&ids[0]) && affecting.contains(&ids[1]));
        assert!(affecting.contains(&root_ids[0]) && affecting.contains(&root_ids[2]));
        assert!(!affecting.contains(&ids[2]));
    }

    #[test]
    fn fitting_size_wraps_content() {
        let mut l = ConstraintLayout::new();
        let card = l.insert_item(None, ItemProps::default());
        let label = l.insert_item(Some(card), ItemProps::with_intrinsic_size(80.0, 20.0));
        l.add_constraints([
            Constraint::equal(label, card, LayoutAttribute::Leading, 10.0),
            Constraint::equal(label, card, LayoutAttribute::Trailing, -10.0),
            Constraint::equal(label, card, LayoutAttribute::Top, 5.0),
            Constraint::equal(label, card, LayoutAttribute::Bottom, -5.0),
        ])
        .unwrap();
        let count = l.constraint_ids().count();
        let size = l.fitting_size(card, Size::ZERO).unwrap();
        assert!(close(size.width, 100.0) && close(size.height, 30.0), "{size:?}");
        assert_eq!(l.constraint_ids().count(), count);
    }

    #[test]
    fn visual_format_end_to_end() {
        let mut l = ConstraintLayout::new();
        let root = l.insert_item(None, ItemProps::default());
        let a = l.insert_item(Some(root), ItemProps::default());
        let b = l.insert_item(Some(root), ItemProps::default());
        l.add_constraints(pin(root, Rect::new(0.0, 0.0, 200.0, 100.0)))
            .unwrap();
        let bindings = FormatBindings::new().view("a", a).view("b", b);
        l.add_visual_format("H:|-[a]-[b(==a)]-|", FormatOptions::ALIGN_ALL_TOP, &bindings)
            .unwrap();
        l.add_visual_format("V:|-[a(30)]", FormatOptions::empty(), &bindings)
            .unwrap();
        l.add_visual_format("V:[b(==a)]", FormatOptions::empty(), &bindings)
            .unwrap();
        l.solve();
        // 200 = 20 + w + 8 + w + 20
        assert!(close_rect(l.frame(a), Rect::new(20.0, 20.0, 96.0, 50.0)));
        assert!(close_rect(l.frame(b), Rect::new(104.0, 20.0, 180.0, 50.0)));
    }
}
