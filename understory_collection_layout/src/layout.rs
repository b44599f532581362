// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The layout strategy trait.

use alloc::boxed::Box;

use kurbo::{Point, Rect, Size, Vec2};

use crate::attributes::LayoutAttributes;
use crate::invalidation::InvalidationContext;
use crate::types::{ElementKey, SectionCounts};
use crate::update::UpdateMap;

/// Inputs to [`CollectionLayout::prepare`].
#[derive(Copy, Clone, Debug)]
pub struct LayoutContext<'a> {
    /// Host bounds; the origin is the content offset.
    pub bounds: Rect,
    /// Counts snapshot for this pass.
    pub counts: &'a SectionCounts,
    /// What was invalidated since the previous pass.
    pub invalidation: &'a InvalidationContext,
}

/// A layout strategy driven by [`CollectionLayoutEngine`](crate::CollectionLayoutEngine).
///
/// Only the first four methods are required. The rest are policy hooks with
/// neutral defaults: no invalidation on bounds or self-sizing changes, no
/// scroll snapping, no-op transition notifications, and unmodified
/// appearing/disappearing attributes.
pub trait CollectionLayout {
    /// Recompute internal state after invalidation.
    fn prepare(&mut self, cx: &LayoutContext<'_>);

    /// Size of the whole scrollable content.
    fn content_extent(&self) -> Size;

    /// All elements whose frames may intersect `rect`.
    ///
    /// Returning extra elements is allowed; the engine filters by strict
    /// intersection.
    fn attributes_in_rect<'a>(
        &'a self,
        rect: Rect,
    ) -> Box<dyn Iterator<Item = LayoutAttributes> + 'a>;

    /// Attributes of one element, `None` if it does not exist.
    fn attributes_for(&self, key: &ElementKey) -> Option<LayoutAttributes>;

    /// The host bounds changed; called before the invalidation policy is consulted.
    fn bounds_changed(&mut self, bounds: Rect) {
        let _ = bounds;
    }

    /// Whether moving the host from `old` to `new` bounds requires a recompute.
    fn should_invalidate_for_bounds_change(&self, old: Rect, new: Rect) -> bool {
        let _ = (old, new);
        false
    }

    /// Context applied when [`Self::should_invalidate_for_bounds_change`] returns `true`.
    fn invalidation_context_for_bounds_change(&self, old: Rect, new: Rect) -> InvalidationContext {
        let _ = (old, new);
        InvalidationContext::everything()
    }

    /// Whether an element's self-measured attributes require a recompute.
    fn should_invalidate_for_preferred_attributes(
        &self,
        preferred: &LayoutAttributes,
        original: &LayoutAttributes,
    ) -> bool {
        let _ = (preferred, original);
        false
    }

    /// Record self-measured attributes and return the context to apply.
    fn invalidation_context_for_preferred_attributes(
        &mut self,
        preferred: &LayoutAttributes,
        original: &LayoutAttributes,
    ) -> InvalidationContext {
        let _ = original;
        InvalidationContext::new().with_keys([preferred.key.clone()])
    }

    /// Where scrolling should come to rest, given where it would rest and the release velocity.
    fn target_content_offset(&self, proposed: Point, velocity: Vec2) -> Point {
        let _ = velocity;
        proposed
    }

    /// Content offset to use after a batch update or layout transition.
    fn target_content_offset_for_transition(&self, proposed: Point) -> Point {
        proposed
    }

    /// A batch update begins; called before `prepare` runs with the new counts.
    fn prepare_for_updates(&mut self, updates: &UpdateMap) {
        let _ = updates;
    }

    /// The batch update finished.
    fn finalize_updates(&mut self) {}

    /// The host bounds changed inside an animation.
    ///
    /// Called once the layout has been prepared for the new bounds, before
    /// any appearing or disappearing attributes are requested.
    fn prepare_for_animated_bounds_change(&mut self, old_bounds: Rect) {
        let _ = old_bounds;
    }

    /// The animated bounds change finished.
    fn finalize_animated_bounds_change(&mut self) {}

    /// This layout is about to be replaced by `incoming`.
    fn prepare_for_transition_to_layout(&mut self, incoming: &dyn CollectionLayout) {
        let _ = incoming;
    }

    /// This layout is about to replace `outgoing`; called before its first `prepare`.
    fn prepare_for_transition_from_layout(&mut self, outgoing: &dyn CollectionLayout) {
        let _ = outgoing;
    }

    /// The layout transition finished; called on both layouts.
    fn finalize_layout_transition(&mut self) {}

    /// Adjust the starting attributes of an appearing element.
    fn initial_attributes_for_appearing(&self, attributes: LayoutAttributes) -> LayoutAttributes {
        attributes
    }

    /// Adjust the ending attributes of a disappearing element.
    fn final_attributes_for_disappearing(&self, attributes: LayoutAttributes) -> LayoutAttributes {
        attributes
    }
}
