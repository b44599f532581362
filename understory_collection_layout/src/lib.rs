// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_collection_layout --heading-base-level=0

//! Understory Collection Layout: cached, incrementally invalidated layout of sectioned collections.
//!
//! A collection is a 2-D item space split into sections, each with its own
//! item count. A layout strategy turns that space into [`LayoutAttributes`]
//! (frame, transform, alpha, stacking order) for cells, supplementary views
//! such as section headers, and decoration views such as section backgrounds.
//!
//! The [`CollectionLayoutEngine`] drives a strategy:
//!
//! - It starts invalidated. [`CollectionLayoutEngine::prepare`] recomputes
//!   and is a no-op while nothing is pending. Queries made while invalidation
//!   is pending fail with [`CollectionError::NotPrepared`].
//! - [`CollectionLayoutEngine::attributes_in_rect`] returns a lazy,
//!   restartable iterator over every element whose frame strictly intersects
//!   a rectangle. [`CollectionLayoutEngine::attributes_for`] is a cached point lookup.
//! - [`InvalidationContext`]s scope recomputes: everything, counts,
//!   delegate metrics, or explicit keys. They also carry content offset and
//!   size adjustments for the host.
//! - Batch updates resolve deletes against pre-update paths and inserts
//!   against post-update paths ([`UpdateMap`]), for items and whole sections
//!   alike, then expose the start and end attributes of appearing and
//!   disappearing elements. Animated bounds changes and layout-to-layout
//!   transitions expose the same endpoints.
//!
//! ## API overview
//!
//! - [`CollectionLayout`]: the strategy trait. Only `prepare`, `content_extent`,
//!   `attributes_in_rect` and `attributes_for` are required.
//! - [`FlowLayout`] / [`FlowLayoutConfig`] / [`FlowDelegate`]: greedy line
//!   packing with headers, footers, insets, pinning, self-sizing and line snapping.
//! - [`ElementKey`] / [`IndexPath`] / [`ElementKind`]: element identity.
//! - [`DataSource`] / [`SectionCounts`]: where counts come from, and their snapshot.
//! - [`UpdateItem`] / [`UpdateScope`] / [`UpdateMap`]: batch updates of items and sections.
//!
//! ## Example
//!
//! ```rust
//! use kurbo::{Rect, Size};
//! use understory_collection_layout::{
//!     CollectionLayoutEngine, ElementKey, FlowLayout, FlowLayoutConfig, IndexPath, UpdateItem,
//! };
//!
//! let config = FlowLayoutConfig {
//!     header_reference_size: Size::new(0.0, 24.0),
//!     ..FlowLayoutConfig::default()
//! };
//! let mut engine = CollectionLayoutEngine::new(FlowLayout::new(config), Rect::new(0.0, 0.0, 170.0, 200.0));
//! engine.prepare(&[4_usize, 2]);
//!
//! let header = engine.attributes_for(&ElementKey::header(1)).unwrap();
//! assert_eq!(header.frame.y0, 134.0);
//!
//! // Remove the first item of section 0; the second slides into its place.
//! engine
//!     .prepare_for_updates(&[UpdateItem::delete(IndexPath::new(0, 0))], &[3_usize, 2])
//!     .unwrap();
//! let slide = engine.final_attributes_for_disappearing(&ElementKey::cell(0, 1)).unwrap();
//! assert_eq!(slide.frame.x0, 0.0);
//! let gone = engine.final_attributes_for_disappearing(&ElementKey::cell(0, 0)).unwrap();
//! assert_eq!(gone.alpha, 0.0);
//! engine.finalize_updates().unwrap();
//! ```
//!
//! ## Features
//!
//! - `std` (default): forwards to `kurbo/std` and `tracing/std`.
//! - `libm`: `no_std` builds that rely on `libm` for floating-point math.
//! - `serde`: `Serialize`/`Deserialize` for [`FlowLayoutConfig`], its enums and [`IndexPath`].
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod attributes;
mod engine;
mod error;
mod flow;
mod invalidation;
mod layout;
mod types;
mod update;

pub use attributes::{LayoutAttributes, Transform3D};
pub use engine::CollectionLayoutEngine;
pub use error::CollectionError;
pub use flow::{
    BACKGROUND_Z_INDEX, FlowDelegate, FlowLayout, FlowLayoutConfig, LineAlignment,
    PINNED_Z_INDEX, ScrollDirection, SnapMode,
};
pub use invalidation::{InvalidationContext, InvalidationFlags};
pub use layout::{CollectionLayout, LayoutContext};
pub use types::{DataSource, ElementCategory, ElementKey, ElementKind, IndexPath, SectionCounts};
pub use update::{UpdateAction, UpdateItem, UpdateMap, UpdateScope};
