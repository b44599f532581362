// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small dialog laid out with visual format strings.
//!
//! This example shows how to:
//! - pin a root item and describe its children with `H:` and `V:` strings,
//! - observe a rejected batch of conflicting required constraints,
//! - resize the dialog through `set_constant` and read back what moved.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example visual_format`

use std::error::Error;

use understory_constraint::{
    Constraint, ConstraintError, ConstraintLayout, FormatBindings, FormatOptions, ItemId,
    ItemProps, LayoutAttribute, Priority, Relation,
};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut layout = ConstraintLayout::new();
    let window = layout.insert_item(None, ItemProps::default());
    let icon = layout.insert_item(Some(window), ItemProps::default());
    let title = layout.insert_item(Some(window), ItemProps::with_intrinsic_size(140.0, 20.0));
    let ok = layout.insert_item(Some(window), ItemProps::with_intrinsic_size(60.0, 24.0));
    let cancel = layout.insert_item(Some(window), ItemProps::with_intrinsic_size(80.0, 24.0));

    let pins = layout.add_constraints([
        Constraint::constant(window, LayoutAttribute::Left, Relation::Equal, 0.0),
        Constraint::constant(window, LayoutAttribute::Top, Relation::Equal, 0.0),
        Constraint::constant(window, LayoutAttribute::Width, Relation::Equal, 400.0),
        Constraint::constant(window, LayoutAttribute::Height, Relation::Equal, 200.0),
    ])?;
    let window_width = pins[2];

    let views = FormatBindings::new()
        .view("icon", icon)
        .view("title", title)
        .view("ok", ok)
        .view("cancel", cancel)
        .metric("pad", 12.0);
    for format in [
        "H:|-pad-[icon(32)]-[title(>=100@750)]-|",
        "V:|-pad-[icon(32)]",
        "V:|-pad-[title]",
        "V:[ok]-|",
    ] {
        layout.add_visual_format(format, FormatOptions::empty(), &views)?;
    }
    layout.add_visual_format("H:[cancel]-[ok]-|", FormatOptions::ALIGN_ALL_BOTTOM, &views)?;

    // A softer wish: keep the title no wider than 200 when possible.
    layout.add_constraints([Constraint::constant(
        title,
        LayoutAttribute::Width,
        Relation::LessOrEqual,
        200.0,
    )
    .with_priority(Priority::DEFAULT_LOW)])?;

    layout.solve();
    print_frames("initial", &layout, &[icon, title, cancel, ok]);

    // The icon cannot be both 32 and 48 wide.
    match layout.add_constraints([Constraint::constant(
        icon,
        LayoutAttribute::Width,
        Relation::Equal,
        48.0,
    )]) {
        Err(ConstraintError::Conflict(conflict)) => {
            println!("\nrejected batch: {conflict}");
        }
        other => println!("\nunexpected result: {other:?}"),
    }

    layout.set_constant(window_width, 520.0)?;
    let summary = layout.solve();
    println!(
        "\nresize moved {} items, dirty region {:?}",
        summary.changed.len(),
        summary.union_rect()
    );
    print_frames("resized", &layout, &[icon, title, cancel, ok]);

    for id in [icon, title, ok] {
        if layout.has_ambiguous_layout(id) {
            println!("{id:?} is ambiguous");
        }
    }
    Ok(())
}

fn print_frames(label: &str, layout: &ConstraintLayout, items: &[ItemId]) {
    println!("\n== {label} ==");
    for &id in items {
        if let Some(frame) = layout.frame(id) {
            println!(
                "  {id:?}: ({:.1}, {:.1}) {:.1}x{:.1}",
                frame.x0,
                frame.y0,
                frame.width(),
                frame.height()
            );
        }
    }
}
