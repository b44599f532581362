// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_constraint --heading-base-level=0

//! Understory Constraint: linear layout constraints with priorities.
//!
//! Describe geometry as relations between item attributes and let an
//! incremental Cassowary solver turn them into frames:
//!
//! ```text
//! first.attribute  {<=, ==, >=}  second.attribute * multiplier + constant   @ priority
//! ```
//!
//! - Required constraints ([`Priority::REQUIRED`]) hold exactly. A batch that
//!   would make them infeasible is rejected as a whole with a [`ConflictError`].
//! - Optional constraints are minimized by weighted violation, weight equal to
//!   priority. Equal priorities resolve in insertion order: the earlier constraint wins.
//! - Constants of attached constraints can be changed in place with
//!   [`ConstraintLayout::set_constant`], which only touches the tableau rows
//!   that mention the constraint.
//! - A visual format ([`ConstraintLayout::constraints_with_visual_format`])
//!   builds rows and columns of constraints from strings such as `"H:|-[icon(32)]-[title]-|"`.
//!
//! ## Not a view system
//!
//! Items are opaque ids with four unknowns each (x, y, width, height) and a
//! few sizing hints ([`ItemProps`]). Items can be nested so that `|` in a
//! visual format has a superview to refer to, but all frames live in one
//! shared layout space. Rendering, hit testing and animation belong elsewhere.
//!
//! ## API overview
//!
//! - [`ConstraintLayout`]: the solve set.
//! - [`ItemId`]: generational handle of an item. Removing an item retracts
//!   every constraint that references it.
//! - [`Constraint`] / [`ConstraintId`]: detached constraint value and handle of an attached one.
//! - [`ConstraintState`]: whether an attached constraint currently holds, with its residual.
//! - [`FormatBindings`] / [`FormatOptions`]: names and options for visual format strings.
//!
//! Key operations:
//! - [`ConstraintLayout::insert_item`] / [`ConstraintLayout::remove_item`]
//! - [`ConstraintLayout::add_constraints`] / [`ConstraintLayout::remove_constraints`]
//! - [`ConstraintLayout::set_constant`]
//! - [`ConstraintLayout::solve`] → [`SolveSummary`] of moved items.
//! - [`ConstraintLayout::frame`], [`ConstraintLayout::residual`],
//!   [`ConstraintLayout::has_ambiguous_layout`], [`ConstraintLayout::fitting_size`].
//!
//! ## Example
//!
//! ```rust
//! use understory_constraint::{ConstraintLayout, FormatBindings, FormatOptions, ItemProps};
//! use understory_constraint::{Constraint, LayoutAttribute, Relation};
//!
//! let mut layout = ConstraintLayout::new();
//! let window = layout.insert_item(None, ItemProps::default());
//! let ok = layout.insert_item(Some(window), ItemProps::with_intrinsic_size(60.0, 24.0));
//! let cancel = layout.insert_item(Some(window), ItemProps::with_intrinsic_size(80.0, 24.0));
//!
//! layout
//!     .add_constraints([
//!         Constraint::constant(window, LayoutAttribute::Left, Relation::Equal, 0.0),
//!         Constraint::constant(window, LayoutAttribute::Top, Relation::Equal, 0.0),
//!         Constraint::constant(window, LayoutAttribute::Width, Relation::Equal, 400.0),
//!         Constraint::constant(window, LayoutAttribute::Height, Relation::Equal, 300.0),
//!     ])
//!     .unwrap();
//!
//! let views = FormatBindings::new().view("ok", ok).view("cancel", cancel);
//! layout
//!     .add_visual_format("H:[cancel]-[ok]-|", FormatOptions::ALIGN_ALL_BOTTOM, &views)
//!     .unwrap();
//! layout
//!     .add_visual_format("V:[ok]-|", FormatOptions::empty(), &views)
//!     .unwrap();
//!
//! layout.solve();
//! let ok_frame = layout.frame(ok).unwrap();
//! assert!((ok_frame.x1 - 380.0).abs() < 1e-6);
//! assert!((ok_frame.y1 - 280.0).abs() < 1e-6);
//! ```
//!
//! ## Features
//!
//! - `std` (default): forwards to `kurbo/std` and `tracing/std`.
//! - `libm`: `no_std` builds that rely on `libm` for floating-point math.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod constraint;
mod error;
mod expr;
mod format;
mod items;
mod layout;
mod simplex;
mod types;

pub use constraint::{Constraint, ConstraintId, ConstraintState};
pub use error::{ConflictError, ConstraintError, FormatErrorKind, FormatParseError};
pub use format::{FormatBindings, FormatOptions};
pub use items::ItemProps;
pub use layout::{ConstraintLayout, LayoutConfig, SolveSummary};
pub use types::{Axis, ItemId, LayoutAttribute, LayoutDirection, PerAxis, Priority, Relation};
