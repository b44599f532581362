// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A sectioned grid driven by the flow layout.
//!
//! This example shows how to:
//! - prepare a flow layout and query the elements visible in a viewport,
//! - scroll with pinned headers and settle on a snapped line,
//! - run a batch update and print the animation endpoints,
//! - feed a self-measured cell size back into the layout,
//! - drop a whole section and switch to a wider layout.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example flow_layout`

use std::error::Error;

use kurbo::{Point, Rect, Size, Vec2};
use understory_collection_layout::{
    CollectionLayoutEngine, ElementKey, FlowLayout, FlowLayoutConfig, IndexPath, SnapMode,
    UpdateItem,
};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = FlowLayoutConfig {
        item_size: Size::new(80.0, 60.0),
        estimated_item_size: Some(Size::new(80.0, 60.0)),
        header_reference_size: Size::new(0.0, 28.0),
        pin_headers: true,
        snap: SnapMode::LineStart,
        ..FlowLayoutConfig::default()
    };
    let viewport = Rect::new(0.0, 0.0, 270.0, 240.0);
    let mut engine = CollectionLayoutEngine::new(FlowLayout::new(config), viewport);
    let mut counts = vec![7_usize, 12, 5];
    engine.prepare(&counts);

    println!("content extent: {:?}", engine.content_extent()?);
    print_visible("top", &engine)?;

    // Scroll halfway into section 1 and let it settle.
    let proposed = Point::new(0.0, 205.0);
    let target = engine.target_content_offset(proposed, Vec2::new(0.0, 0.8))?;
    println!("\nfling to {proposed:?} settles at {target:?}");
    if engine.set_bounds(viewport + target.to_vec2()) {
        engine.prepare(&counts);
    }
    print_visible("scrolled", &engine)?;

    // Delete two items of section 1 and insert one at its front.
    counts[1] = 11;
    engine.prepare_for_updates(
        &[
            UpdateItem::delete(IndexPath::new(1, 2)),
            UpdateItem::delete(IndexPath::new(1, 3)),
            UpdateItem::insert(IndexPath::new(1, 0)),
        ],
        &counts,
    )?;
    println!("\n== batch update ==");
    for item in 0..4 {
        let before = ElementKey::cell(1, item);
        let end = engine.final_attributes_for_disappearing(&before)?;
        println!(
            "  {before:?} -> {:?} alpha {:.0}",
            end.frame.origin(),
            end.alpha
        );
    }
    let start = engine.initial_attributes_for_appearing(&ElementKey::cell(1, 0))?;
    println!("  inserted [1, 0] fades in at {:?}", start.frame.origin());
    let delta = engine.finalize_updates()?;
    println!("  host offset delta {delta:?}");

    // A cell measured itself taller than estimated.
    let mut preferred = engine.attributes_for(&ElementKey::cell(0, 4))?;
    preferred.frame = Rect::from_origin_size(preferred.frame.origin(), Size::new(80.0, 96.0));
    if engine.apply_preferred_attributes(&preferred)? {
        let adjust = engine
            .pending_invalidation()
            .map(|cx| cx.content_size_adjustment);
        engine.prepare(&counts);
        println!("\nself-sizing grew content by {adjust:?}");
        println!("content extent: {:?}", engine.content_extent()?);
    }

    // Drop section 0; the headers below it slide up.
    counts.remove(0);
    engine.prepare_for_updates(&[UpdateItem::delete_section(0)], &counts)?;
    println!("\n== section delete ==");
    for key in engine.disappearing_keys()? {
        println!("  {key:?} fades out");
    }
    let header = engine.final_attributes_for_disappearing(&ElementKey::header(1))?;
    println!("  header of old section 1 ends at {:?}", header.frame.origin());
    engine.finalize_updates()?;

    // Switch to larger cells.
    let wide = FlowLayout::new(FlowLayoutConfig {
        item_size: Size::new(120.0, 90.0),
        ..engine.layout().config().clone()
    });
    engine.begin_layout_transition(wide)?;
    let first = ElementKey::cell(0, 0);
    let start = engine.initial_attributes_for_appearing(&first)?;
    let end = engine.final_attributes_for_disappearing(&first)?;
    println!("\n== layout transition ==\n  {first:?} {:?} -> {:?}", start.frame, end.frame);
    let (delta, _previous) = engine.finalize_layout_transition()?;
    println!("  host offset delta {delta:?}");
    Ok(())
}

fn print_visible(
    label: &str,
    engine: &CollectionLayoutEngine<FlowLayout>,
) -> Result<(), Box<dyn Error>> {
    println!("\n== {label} @ {:?} ==", engine.bounds().origin());
    for a in engine.visible_attributes()? {
        println!("  {:?} {:?} z={}", a.key, a.frame, a.z_index);
    }
    Ok(())
}
