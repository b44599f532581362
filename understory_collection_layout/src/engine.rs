// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The engine: owns a layout strategy, the counts snapshot and the attributes cache.

use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::{Point, Rect, Size, Vec2};
use tracing::{debug, trace};

use crate::attributes::{LayoutAttributes, overlaps};
use crate::error::CollectionError;
use crate::invalidation::InvalidationContext;
use crate::layout::{CollectionLayout, LayoutContext};
use crate::types::{
    DataSource, ElementCategory, ElementKey, ElementKind, IndexPath, SectionCounts,
};
use crate::update::{UpdateItem, UpdateMap};

/// A rectangle that contains every finite frame.
const EVERYWHERE: Rect = Rect::new(
    f64::NEG_INFINITY,
    f64::NEG_INFINITY,
    f64::INFINITY,
    f64::INFINITY,
);

/// What started the animated change in progress.
#[derive(Debug)]
enum Animation<L> {
    Batch,
    Bounds,
    /// Holds the outgoing layout.
    Layout(L),
}

#[derive(Debug)]
struct UpdateState<L> {
    map: UpdateMap,
    /// Every element of the pre-update pass.
    old: HashMap<ElementKey, LayoutAttributes>,
    animation: Animation<L>,
}

/// Drives a [`CollectionLayout`]: invalidation, preparation, cached queries and batch updates.
///
/// Queries fail with [`CollectionError::NotPrepared`] while invalidation is
/// pending, so a stale attribute is never observed. A new engine starts with
/// everything invalidated.
///
/// ```rust
/// use kurbo::Rect;
/// use understory_collection_layout::{
///     CollectionLayoutEngine, ElementKey, FlowLayout, FlowLayoutConfig,
/// };
///
/// let flow = FlowLayout::new(FlowLayoutConfig::default());
/// let mut engine = CollectionLayoutEngine::new(flow, Rect::new(0.0, 0.0, 170.0, 100.0));
/// engine.prepare(&[10_usize]);
///
/// assert_eq!(engine.content_extent().unwrap().height, 230.0);
/// let third = engine.attributes_for(&ElementKey::cell(0, 2)).unwrap();
/// assert_eq!(third.frame, Rect::new(120.0, 0.0, 170.0, 50.0));
/// let visible = engine.attributes_in_rect(Rect::new(0.0, 0.0, 170.0, 50.0)).unwrap().count();
/// assert_eq!(visible, 3);
/// ```
#[derive(Debug)]
pub struct CollectionLayoutEngine<L: CollectionLayout> {
    layout: L,
    bounds: Rect,
    counts: SectionCounts,
    cache: HashMap<ElementKey, LayoutAttributes>,
    pending: Option<InvalidationContext>,
    update: Option<UpdateState<L>>,
}

impl<L: CollectionLayout> CollectionLayoutEngine<L> {
    /// Creates an engine around `layout` with the host's current `bounds`.
    pub fn new(layout: L, bounds: Rect) -> Self {
        Self {
            layout,
            bounds,
            counts: SectionCounts::default(),
            cache: HashMap::new(),
            pending: Some(InvalidationContext::everything()),
            update: None,
        }
    }

    /// Returns a shared reference to the layout.
    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Returns a mutable reference to the layout, invalidating everything.
    pub fn layout_mut(&mut self) -> &mut L {
        self.invalidate();
        &mut self.layout
    }

    /// Current host bounds.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Counts snapshot of the last prepare.
    pub fn counts(&self) -> &SectionCounts {
        &self.counts
    }

    /// Whether queries can be answered.
    pub fn is_prepared(&self) -> bool {
        self.pending.is_none()
    }

    /// Pending invalidation, if any.
    pub fn pending_invalidation(&self) -> Option<&InvalidationContext> {
        self.pending.as_ref()
    }

    // --- invalidation ---

    /// Invalidate everything.
    pub fn invalidate(&mut self) {
        self.invalidate_with(InvalidationContext::everything());
    }

    /// Merge `cx` into the pending invalidation. Empty contexts are ignored.
    pub fn invalidate_with(&mut self, cx: InvalidationContext) {
        if cx.is_empty() {
            return;
        }
        debug!(flags = ?cx.flags, keys = cx.invalidated_keys().count(), "invalidate");
        match &mut self.pending {
            Some(pending) => pending.merge(cx),
            None => self.pending = Some(cx),
        }
    }

    /// Update the host bounds.
    ///
    /// Returns `true` if the layout asked to be invalidated by the change.
    pub fn set_bounds(&mut self, bounds: Rect) -> bool {
        let old = self.bounds;
        if old == bounds {
            return false;
        }
        self.bounds = bounds;
        self.layout.bounds_changed(bounds);
        if !self.layout.should_invalidate_for_bounds_change(old, bounds) {
            return false;
        }
        let cx = self.layout.invalidation_context_for_bounds_change(old, bounds);
        self.invalidate_with(cx);
        true
    }

    /// Apply pending invalidation and recompute.
    ///
    /// Counts are re-queried from `data` only when the pending context asks
    /// for it. Returns the applied context, whose adjustments the host should
    /// apply to its content offset and size, or `None` when nothing was
    /// pending.
    pub fn prepare<D: DataSource + ?Sized>(&mut self, data: &D) -> Option<InvalidationContext> {
        let cx = self.pending.take()?;
        if cx.invalidates_data_source_counts() {
            self.counts = SectionCounts::from_source(data);
        }
        self.run_prepare(&cx);
        Some(cx)
    }

    fn run_prepare(&mut self, cx: &InvalidationContext) {
        self.layout.prepare(&LayoutContext {
            bounds: self.bounds,
            counts: &self.counts,
            invalidation: cx,
        });
        if cx.is_keys_only() {
            for key in cx.invalidated_keys() {
                self.cache.remove(key);
            }
        } else {
            self.cache.clear();
        }
        trace!(
            sections = self.counts.sections(),
            items = self.counts.total(),
            "prepared"
        );
    }

    fn ensure_prepared(&self) -> Result<(), CollectionError> {
        if self.pending.is_some() {
            return Err(CollectionError::NotPrepared);
        }
        Ok(())
    }

    // --- queries ---

    /// Every element whose frame strictly intersects `rect`.
    ///
    /// The iterator borrows the engine; calling again restarts the query.
    pub fn attributes_in_rect(
        &self,
        rect: Rect,
    ) -> Result<impl Iterator<Item = LayoutAttributes> + '_, CollectionError> {
        self.ensure_prepared()?;
        Ok(self
            .layout
            .attributes_in_rect(rect)
            .filter(move |a| overlaps(a.frame, rect)))
    }

    /// Elements intersecting the current bounds.
    pub fn visible_attributes(
        &self,
    ) -> Result<impl Iterator<Item = LayoutAttributes> + '_, CollectionError> {
        self.attributes_in_rect(self.bounds)
    }

    /// Attributes of one element, cached until it is invalidated.
    pub fn attributes_for(
        &mut self,
        key: &ElementKey,
    ) -> Result<LayoutAttributes, CollectionError> {
        self.ensure_prepared()?;
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit.clone());
        }
        let attributes = self.lookup(key)?;
        self.cache.insert(key.clone(), attributes.clone());
        Ok(attributes)
    }

    fn lookup(&self, key: &ElementKey) -> Result<LayoutAttributes, CollectionError> {
        let out_of_range = || CollectionError::OutOfRange { key: key.clone() };
        if !self.counts.contains_key(key) {
            return Err(out_of_range());
        }
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit.clone());
        }
        self.layout.attributes_for(key).ok_or_else(out_of_range)
    }

    /// Size of the whole scrollable content.
    pub fn content_extent(&self) -> Result<Size, CollectionError> {
        self.ensure_prepared()?;
        Ok(self.layout.content_extent())
    }

    /// Where scrolling should come to rest.
    pub fn target_content_offset(
        &self,
        proposed: Point,
        velocity: Vec2,
    ) -> Result<Point, CollectionError> {
        self.ensure_prepared()?;
        Ok(self.layout.target_content_offset(proposed, velocity))
    }

    /// Feed back attributes an element measured for itself.
    ///
    /// Returns `true` if the layout took them and invalidated.
    pub fn apply_preferred_attributes(
        &mut self,
        preferred: &LayoutAttributes,
    ) -> Result<bool, CollectionError> {
        let original = self.attributes_for(&preferred.key)?;
        if !self
            .layout
            .should_invalidate_for_preferred_attributes(preferred, &original)
        {
            return Ok(false);
        }
        let cx = self
            .layout
            .invalidation_context_for_preferred_attributes(preferred, &original);
        self.invalidate_with(cx);
        Ok(true)
    }

    // --- batch updates ---

    /// Begin a batch update against the counts now reported by `data`.
    ///
    /// The engine must be prepared with the pre-update counts. The layout is
    /// recomputed for the new counts immediately; appearing and disappearing
    /// attributes are then available until [`Self::finalize_updates`].
    pub fn prepare_for_updates<D: DataSource + ?Sized>(
        &mut self,
        items: &[UpdateItem],
        data: &D,
    ) -> Result<(), CollectionError> {
        self.ensure_idle()?;
        let new_counts = SectionCounts::from_source(data);
        let map = UpdateMap::resolve(&self.counts, &new_counts, items)?;
        debug!(
            items = items.len(),
            deleted = map.deleted().len(),
            inserted = map.inserted().len(),
            sections_deleted = map.deleted_sections().len(),
            sections_inserted = map.inserted_sections().len(),
            "batch update"
        );
        let old = self.snapshot();
        self.layout.prepare_for_updates(&map);
        self.counts = new_counts;
        self.run_prepare(&InvalidationContext::data_source_counts());
        self.update = Some(UpdateState {
            map,
            old,
            animation: Animation::Batch,
        });
        Ok(())
    }

    /// Begin an animated change of the host bounds.
    ///
    /// Applies the bounds like [`Self::set_bounds`] and recomputes right away
    /// if the layout asked for it, without re-querying counts. Every element
    /// keeps its identity, so appearing and disappearing attributes describe
    /// how it moves between the two layouts until
    /// [`Self::finalize_animated_bounds_change`]. Returns `true` if the
    /// layout was recomputed.
    pub fn begin_animated_bounds_change(&mut self, bounds: Rect) -> Result<bool, CollectionError> {
        self.ensure_idle()?;
        let map = UpdateMap::resolve(&self.counts, &self.counts, &[])?;
        let old = self.snapshot();
        let old_bounds = self.bounds;
        let changed = self.set_bounds(bounds);
        if let Some(cx) = self.pending.take() {
            self.run_prepare(&cx);
        }
        self.layout.prepare_for_animated_bounds_change(old_bounds);
        debug!(?old_bounds, ?bounds, changed, "animated bounds change");
        self.update = Some(UpdateState {
            map,
            old,
            animation: Animation::Bounds,
        });
        Ok(changed)
    }

    /// Finish the animated bounds change.
    pub fn finalize_animated_bounds_change(&mut self) -> Result<(), CollectionError> {
        self.finish(|a| matches!(a, Animation::Bounds), NO_BOUNDS_CHANGE)?;
        self.layout.finalize_animated_bounds_change();
        Ok(())
    }

    /// Begin replacing the layout with `incoming`.
    ///
    /// Both layouts are notified, `incoming` is prepared with the current
    /// bounds and counts, and from then on queries answer from it. Appearing
    /// and disappearing attributes describe how each element moves from the
    /// outgoing layout to the incoming one until
    /// [`Self::finalize_layout_transition`].
    pub fn begin_layout_transition(&mut self, incoming: L) -> Result<(), CollectionError> {
        self.ensure_idle()?;
        let map = UpdateMap::resolve(&self.counts, &self.counts, &[])?;
        let old = self.snapshot();
        let mut incoming = incoming;
        self.layout.prepare_for_transition_to_layout(&incoming);
        incoming.prepare_for_transition_from_layout(&self.layout);
        let outgoing = core::mem::replace(&mut self.layout, incoming);
        self.run_prepare(&InvalidationContext::everything());
        debug!(elements = old.len(), "layout transition");
        self.update = Some(UpdateState {
            map,
            old,
            animation: Animation::Layout(outgoing),
        });
        Ok(())
    }

    /// Finish the layout transition.
    ///
    /// Returns the content offset delta the host should apply, computed the
    /// same way as for [`Self::finalize_updates`], and hands back the
    /// outgoing layout.
    pub fn finalize_layout_transition(&mut self) -> Result<(Vec2, L), CollectionError> {
        let state = self.finish(|a| matches!(a, Animation::Layout(_)), NO_LAYOUT_TRANSITION)?;
        let Animation::Layout(mut outgoing) = state.animation else {
            return Err(NO_LAYOUT_TRANSITION);
        };
        outgoing.finalize_layout_transition();
        self.layout.finalize_layout_transition();
        Ok((self.transition_offset_delta(), outgoing))
    }

    /// Whether a batch update, animated bounds change or layout transition is in progress.
    pub fn is_updating(&self) -> bool {
        self.update.is_some()
    }

    fn ensure_idle(&self) -> Result<(), CollectionError> {
        self.ensure_prepared()?;
        if self.update.is_some() {
            return Err(CollectionError::InvalidUpdate {
                reason: "an animated change is already in progress",
                path: None,
            });
        }
        Ok(())
    }

    fn snapshot(&self) -> HashMap<ElementKey, LayoutAttributes> {
        self.layout
            .attributes_in_rect(EVERYWHERE)
            .map(|a| (a.key.clone(), a))
            .collect()
    }

    /// Take the state of the animated change in progress if `expected` accepts it.
    fn finish(
        &mut self,
        expected: fn(&Animation<L>) -> bool,
        missing: CollectionError,
    ) -> Result<UpdateState<L>, CollectionError> {
        if !self.update.as_ref().is_some_and(|u| expected(&u.animation)) {
            return Err(missing);
        }
        self.update.take().ok_or(missing)
    }

    /// Mapping of the animated change in progress; the identity outside batch updates.
    pub fn update_map(&self) -> Option<&UpdateMap> {
        self.update.as_ref().map(|u| &u.map)
    }

    /// Pre-update elements with no post-update counterpart, sorted by key.
    ///
    /// Covers deleted cells and the supplementary and decoration views of
    /// deleted or reloaded sections, plus any view the new layout stopped
    /// producing.
    pub fn disappearing_keys(&self) -> Result<Vec<ElementKey>, CollectionError> {
        self.ensure_prepared()?;
        let state = self.update.as_ref().ok_or(NO_ANIMATION)?;
        let mut keys: Vec<ElementKey> = state
            .old
            .keys()
            .filter(|k| {
                state
                    .map
                    .map_key_forward(k)
                    .is_none_or(|after| self.layout.attributes_for(&after).is_none())
            })
            .cloned()
            .collect();
        keys.sort_unstable_by_key(sort_key);
        Ok(keys)
    }

    /// Post-update elements with no pre-update counterpart, sorted by key.
    pub fn appearing_keys(&self) -> Result<Vec<ElementKey>, CollectionError> {
        self.ensure_prepared()?;
        let state = self.update.as_ref().ok_or(NO_ANIMATION)?;
        let mut keys: Vec<ElementKey> = self
            .layout
            .attributes_in_rect(EVERYWHERE)
            .map(|a| a.key)
            .filter(|k| {
                state
                    .map
                    .map_key_backward(k)
                    .is_none_or(|before| !state.old.contains_key(&before))
            })
            .collect();
        keys.sort_unstable_by_key(sort_key);
        keys.dedup();
        Ok(keys)
    }

    /// Starting attributes of an element keyed by its post-update identity.
    ///
    /// Inserted elements start at their final frame, fully transparent.
    /// Surviving elements, including views of moved sections, start at their
    /// pre-update frame.
    pub fn initial_attributes_for_appearing(
        &self,
        key: &ElementKey,
    ) -> Result<LayoutAttributes, CollectionError> {
        self.ensure_prepared()?;
        let state = self.update.as_ref().ok_or(NO_ANIMATION)?;
        let target = self.lookup(key)?;
        let start = match state.map.map_key_backward(key).and_then(|k| state.old.get(&k)) {
            Some(old) => LayoutAttributes {
                key: key.clone(),
                ..old.clone()
            },
            None => LayoutAttributes {
                alpha: 0.0,
                ..target
            },
        };
        Ok(self.layout.initial_attributes_for_appearing(start))
    }

    /// Ending attributes of an element keyed by its pre-update identity.
    ///
    /// Deleted elements end at their old frame, fully transparent. Surviving
    /// elements end at their post-update frame.
    pub fn final_attributes_for_disappearing(
        &self,
        key: &ElementKey,
    ) -> Result<LayoutAttributes, CollectionError> {
        self.ensure_prepared()?;
        let state = self.update.as_ref().ok_or(NO_ANIMATION)?;
        let old = state
            .old
            .get(key)
            .cloned()
            .ok_or_else(|| CollectionError::OutOfRange { key: key.clone() })?;
        let end = match state.map.map_key_forward(key).and_then(|k| self.lookup(&k).ok()) {
            Some(new) => LayoutAttributes {
                key: key.clone(),
                ..new
            },
            None => LayoutAttributes { alpha: 0.0, ..old },
        };
        Ok(self.layout.final_attributes_for_disappearing(end))
    }

    /// Finish the batch update.
    ///
    /// Returns the content offset delta the host should apply: the current
    /// offset clamped to the new content extent, then adjusted by
    /// [`CollectionLayout::target_content_offset_for_transition`].
    pub fn finalize_updates(&mut self) -> Result<Vec2, CollectionError> {
        self.finish(|a| matches!(a, Animation::Batch), NO_UPDATE)?;
        self.layout.finalize_updates();
        Ok(self.transition_offset_delta())
    }

    fn transition_offset_delta(&self) -> Vec2 {
        let extent = self.layout.content_extent();
        let offset = self.bounds.origin();
        let max_x = (extent.width - self.bounds.width()).max(0.0);
        let max_y = (extent.height - self.bounds.height()).max(0.0);
        let clamped = Point::new(offset.x.clamp(0.0, max_x), offset.y.clamp(0.0, max_y));
        let target = self.layout.target_content_offset_for_transition(clamped);
        debug!(?offset, ?target, "transition finalized");
        target - offset
    }
}

/// Orders keys by category, then kind, then index path.
fn sort_key(key: &ElementKey) -> (ElementCategory, Option<ElementKind>, IndexPath) {
    (key.category(), key.kind().cloned(), key.index_path())
}

const NO_UPDATE: CollectionError = CollectionError::InvalidUpdate {
    reason: "no batch update in progress",
    path: None,
};

const NO_BOUNDS_CHANGE: CollectionError = CollectionError::InvalidUpdate {
    reason: "no animated bounds change in progress",
    path: None,
};

const NO_LAYOUT_TRANSITION: CollectionError = CollectionError::InvalidUpdate {
    reason: "no layout transition in progress",
    path: None,
};

const NO_ANIMATION: CollectionError = CollectionError::InvalidUpdate {
    reason: "no animated change in progress",
    path: None,
};
