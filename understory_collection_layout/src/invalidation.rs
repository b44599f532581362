// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation contexts: what must be recomputed before the next query.

use bitflags::bitflags;
use hashbrown::HashSet;
use kurbo::{Size, Vec2};

use crate::types::ElementKey;

bitflags! {
    /// Scope of a pending recompute.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InvalidationFlags: u8 {
        /// Recompute everything, re-querying counts and delegate metrics.
        const EVERYTHING = 1 << 0;
        /// Data-source counts changed; re-query them and the delegate.
        const DATA_SOURCE_COUNTS = 1 << 1;
        /// Delegate metrics changed; re-query them with the cached counts.
        const DELEGATE_METRICS = 1 << 2;
        /// Positions changed. Alone with explicit keys, only those keys are stale.
        const LAYOUT_ATTRIBUTES = 1 << 3;
    }
}

/// Describes a pending recompute.
///
/// Contexts merge: flags and keys are unioned, adjustments are summed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvalidationContext {
    /// Scope of the recompute.
    pub flags: InvalidationFlags,
    keys: HashSet<ElementKey>,
    /// Added to the host's content offset after the recompute.
    pub content_offset_adjustment: Vec2,
    /// Added to the content size after the recompute.
    pub content_size_adjustment: Size,
}

impl InvalidationContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate everything.
    #[must_use]
    pub fn everything() -> Self {
        Self::with_flags(InvalidationFlags::EVERYTHING)
    }

    /// Data-source counts changed.
    #[must_use]
    pub fn data_source_counts() -> Self {
        Self::with_flags(InvalidationFlags::DATA_SOURCE_COUNTS)
    }

    /// A context with the given flags.
    #[must_use]
    pub fn with_flags(flags: InvalidationFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Builder: add explicit keys. Implies [`InvalidationFlags::LAYOUT_ATTRIBUTES`].
    #[must_use]
    pub fn with_keys(mut self, keys: impl IntoIterator<Item = ElementKey>) -> Self {
        self.invalidate_keys(keys);
        self
    }

    /// Builder: add a content offset adjustment.
    #[must_use]
    pub fn with_offset_adjustment(mut self, delta: Vec2) -> Self {
        self.content_offset_adjustment += delta;
        self
    }

    /// Builder: add a content size adjustment.
    #[must_use]
    pub fn with_size_adjustment(mut self, delta: Size) -> Self {
        self.content_size_adjustment = self.content_size_adjustment + delta;
        self
    }

    /// Add explicit keys.
    pub fn invalidate_keys(&mut self, keys: impl IntoIterator<Item = ElementKey>) {
        self.keys.extend(keys);
        if !self.keys.is_empty() {
            self.flags |= InvalidationFlags::LAYOUT_ATTRIBUTES;
        }
    }

    /// Explicitly invalidated keys, in no particular order.
    pub fn invalidated_keys(&self) -> impl Iterator<Item = &ElementKey> + '_ {
        self.keys.iter()
    }

    /// Whether `key` is stale under this context.
    #[must_use]
    pub fn is_invalidated(&self, key: &ElementKey) -> bool {
        (!self.flags.is_empty() && !self.is_keys_only()) || self.keys.contains(key)
    }

    /// Whether the context invalidates everything.
    #[must_use]
    pub fn invalidates_everything(&self) -> bool {
        self.flags.contains(InvalidationFlags::EVERYTHING)
    }

    /// Whether counts must be re-queried.
    #[must_use]
    pub fn invalidates_data_source_counts(&self) -> bool {
        self.flags
            .intersects(InvalidationFlags::EVERYTHING | InvalidationFlags::DATA_SOURCE_COUNTS)
    }

    /// Whether delegate metrics must be re-queried.
    #[must_use]
    pub fn invalidates_delegate_metrics(&self) -> bool {
        self.flags.intersects(
            InvalidationFlags::EVERYTHING
                | InvalidationFlags::DATA_SOURCE_COUNTS
                | InvalidationFlags::DELEGATE_METRICS,
        )
    }

    /// Whether only the explicit keys are stale.
    #[must_use]
    pub fn is_keys_only(&self) -> bool {
        self.flags == InvalidationFlags::LAYOUT_ATTRIBUTES && !self.keys.is_empty()
    }

    /// Whether the context requests nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
            && self.keys.is_empty()
            && self.content_offset_adjustment == Vec2::ZERO
            && self.content_size_adjustment == Size::ZERO
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        self.flags |= other.flags;
        self.keys.extend(other.keys);
        self.content_offset_adjustment += other.content_offset_adjustment;
        self.content_size_adjustment = self.content_size_adjustment + other.content_size_adjustment;
    }
}
