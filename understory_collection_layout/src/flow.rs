// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flow layout: items packed greedily into lines, sections stacked along the scroll axis.

use alloc::boxed::Box;
use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::{Insets, Point, Rect, Size, Vec2};
use smallvec::SmallVec;

use crate::attributes::{LayoutAttributes, overlaps};
use crate::invalidation::{InvalidationContext, InvalidationFlags};
use crate::layout::{CollectionLayout, LayoutContext};
use crate::types::{ElementKey, ElementKind, IndexPath, SectionCounts};
use crate::update::UpdateMap;

/// Tolerance for "fits on this line" and size comparisons.
const EPSILON: f64 = 1e-9;

/// `z_index` of pinned headers and footers.
pub const PINNED_Z_INDEX: i32 = 1024;

/// `z_index` of section backgrounds.
pub const BACKGROUND_Z_INDEX: i32 = -1;

/// Axis along which content scrolls.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollDirection {
    /// Lines are rows, stacked top to bottom.
    #[default]
    Vertical,
    /// Lines are columns, stacked left to right.
    Horizontal,
}

impl ScrollDirection {
    fn main(self, size: Size) -> f64 {
        match self {
            Self::Vertical => size.height,
            Self::Horizontal => size.width,
        }
    }

    fn cross(self, size: Size) -> f64 {
        match self {
            Self::Vertical => size.width,
            Self::Horizontal => size.height,
        }
    }

    fn main_range(self, rect: Rect) -> (f64, f64) {
        match self {
            Self::Vertical => (rect.y0, rect.y1),
            Self::Horizontal => (rect.x0, rect.x1),
        }
    }

    fn main_of(self, v: Vec2) -> f64 {
        match self {
            Self::Vertical => v.y,
            Self::Horizontal => v.x,
        }
    }

    fn with_main(self, p: Point, main: f64) -> Point {
        match self {
            Self::Vertical => Point::new(p.x, main),
            Self::Horizontal => Point::new(main, p.y),
        }
    }

    fn vec(self, main: f64) -> Vec2 {
        match self {
            Self::Vertical => Vec2::new(0.0, main),
            Self::Horizontal => Vec2::new(main, 0.0),
        }
    }

    fn size(self, cross: f64, main: f64) -> Size {
        match self {
            Self::Vertical => Size::new(cross, main),
            Self::Horizontal => Size::new(main, cross),
        }
    }

    fn rect(self, cross: f64, main: f64, cross_len: f64, main_len: f64) -> Rect {
        match self {
            Self::Vertical => Rect::new(cross, main, cross + cross_len, main + main_len),
            Self::Horizontal => Rect::new(main, cross, main + main_len, cross + cross_len),
        }
    }

    /// `(cross_before, cross_after, main_before, main_after)`.
    fn insets(self, insets: Insets) -> (f64, f64, f64, f64) {
        match self {
            Self::Vertical => (insets.x0, insets.x1, insets.y0, insets.y1),
            Self::Horizontal => (insets.y0, insets.y1, insets.x0, insets.x1),
        }
    }
}

/// How items are distributed along a line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineAlignment {
    /// Items start at the leading inset, separated by the minimum inter-item spacing.
    Start,
    /// Full lines spread their spare space between items. The last line of a
    /// section and single-item lines align to the start.
    #[default]
    Justify,
}

/// Where scrolling comes to rest.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SnapMode {
    /// Wherever the host proposes.
    #[default]
    None,
    /// At the start of a line, the next one in the direction of the velocity
    /// or the nearest one at rest.
    LineStart,
}

/// Configuration of a [`FlowLayout`].
///
/// Values apply to every section unless a [`FlowDelegate`] overrides them.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlowLayoutConfig {
    /// Size of every item.
    pub item_size: Size,
    /// Enables self-sizing: items start at this size until measured.
    pub estimated_item_size: Option<Size>,
    /// Minimum spacing between lines.
    pub minimum_line_spacing: f64,
    /// Minimum spacing between items on a line.
    pub minimum_interitem_spacing: f64,
    /// Header size; only the scroll-axis extent is used. Zero means no header.
    pub header_reference_size: Size,
    /// Footer size; only the scroll-axis extent is used. Zero means no footer.
    pub footer_reference_size: Size,
    /// Space around the items of each section, inside header and footer.
    pub section_insets: Insets,
    /// Scroll axis.
    pub scroll_direction: ScrollDirection,
    /// Keep each section's header at the leading visible edge while the section is visible.
    pub pin_headers: bool,
    /// Keep each section's footer at the trailing visible edge while the section is visible.
    pub pin_footers: bool,
    /// Distribution along a line.
    pub line_alignment: LineAlignment,
    /// Scroll snapping.
    pub snap: SnapMode,
    /// Emit a [`ElementKind::SECTION_BACKGROUND`] decoration behind each section's items.
    pub section_backgrounds: bool,
}

impl Default for FlowLayoutConfig {
    fn default() -> Self {
        Self {
            item_size: Size::new(50.0, 50.0),
            estimated_item_size: None,
            minimum_line_spacing: 10.0,
            minimum_interitem_spacing: 10.0,
            header_reference_size: Size::ZERO,
            footer_reference_size: Size::ZERO,
            section_insets: Insets::ZERO,
            scroll_direction: ScrollDirection::Vertical,
            pin_headers: false,
            pin_footers: false,
            line_alignment: LineAlignment::Justify,
            snap: SnapMode::None,
            section_backgrounds: false,
        }
    }
}

/// Per-section and per-item overrides of [`FlowLayoutConfig`].
///
/// Every method defaults to `None`, meaning "use the config". Metrics are
/// queried when counts or delegate metrics are invalidated, not on every pass.
pub trait FlowDelegate {
    /// Size of one item. Ignored while self-sizing is enabled.
    fn item_size(&self, path: IndexPath) -> Option<Size> {
        let _ = path;
        None
    }

    /// Insets of a section.
    fn section_insets(&self, section: usize) -> Option<Insets> {
        let _ = section;
        None
    }

    /// Minimum line spacing of a section.
    fn minimum_line_spacing(&self, section: usize) -> Option<f64> {
        let _ = section;
        None
    }

    /// Minimum inter-item spacing of a section.
    fn minimum_interitem_spacing(&self, section: usize) -> Option<f64> {
        let _ = section;
        None
    }

    /// Header size of a section.
    fn header_size(&self, section: usize) -> Option<Size> {
        let _ = section;
        None
    }

    /// Footer size of a section.
    fn footer_size(&self, section: usize) -> Option<Size> {
        let _ = section;
        None
    }
}

impl FlowDelegate for () {}

/// Delegate answers cached between metric invalidations.
#[derive(Clone, Debug)]
struct SectionMetrics {
    insets: Insets,
    line_spacing: f64,
    interitem_spacing: f64,
    header: Size,
    footer: Size,
    item_sizes: Vec<Size>,
}

#[derive(Copy, Clone, Debug)]
struct Line {
    main_start: f64,
    main_extent: f64,
    /// Item range `first..end`.
    first: usize,
    end: usize,
}

impl Line {
    fn main_end(&self) -> f64 {
        self.main_start + self.main_extent
    }
}

#[derive(Clone, Debug)]
struct SectionGeometry {
    main_start: f64,
    main_end: f64,
    header: Option<Rect>,
    footer: Option<Rect>,
    /// Area between header and footer, insets included.
    body: Rect,
    lines: Vec<Line>,
    items: Vec<Rect>,
}

/// Grid-like layout that fills lines across the cross axis and stacks them along the scroll axis.
///
/// A line holds `n` items while their cross extents plus `n − 1` inter-item
/// spacings fit in the available cross extent, and at least one item. The
/// line is as deep as its deepest item and shallower items are centered in it.
/// Headers and footers span the full cross extent.
#[derive(Debug)]
pub struct FlowLayout<D: FlowDelegate = ()> {
    config: FlowLayoutConfig,
    delegate: D,
    bounds: Rect,
    metrics: Vec<SectionMetrics>,
    sections: Vec<SectionGeometry>,
    /// Self-measured item sizes, by current index path.
    measured: HashMap<IndexPath, Size>,
    content_main: f64,
}

impl FlowLayout<()> {
    /// A flow layout without a delegate.
    pub fn new(config: FlowLayoutConfig) -> Self {
        Self::with_delegate(config, ())
    }
}

impl<D: FlowDelegate> FlowLayout<D> {
    /// A flow layout whose metrics can be overridden by `delegate`.
    pub fn with_delegate(config: FlowLayoutConfig, delegate: D) -> Self {
        Self {
            config,
            delegate,
            bounds: Rect::ZERO,
            metrics: Vec::new(),
            sections: Vec::new(),
            measured: HashMap::new(),
            content_main: 0.0,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &FlowLayoutConfig {
        &self.config
    }

    /// Mutable configuration. The engine must be invalidated afterwards;
    /// [`CollectionLayoutEngine::layout_mut`](crate::CollectionLayoutEngine::layout_mut) does that.
    pub fn config_mut(&mut self) -> &mut FlowLayoutConfig {
        &mut self.config
    }

    /// The delegate.
    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    /// Mutable delegate; invalidate delegate metrics after changing its answers.
    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    /// Self-measured size of an item, if one was reported.
    pub fn measured_size(&self, path: IndexPath) -> Option<Size> {
        self.measured.get(&path).copied()
    }

    /// Number of lines in `section` as of the last prepare.
    pub fn line_count(&self, section: usize) -> usize {
        self.sections.get(section).map_or(0, |s| s.lines.len())
    }

    fn query_metrics(&mut self, counts: &SectionCounts) {
        let config = &self.config;
        let delegate = &self.delegate;
        self.metrics = (0..counts.sections())
            .map(|s| SectionMetrics {
                insets: delegate.section_insets(s).unwrap_or(config.section_insets),
                line_spacing: delegate
                    .minimum_line_spacing(s)
                    .unwrap_or(config.minimum_line_spacing),
                interitem_spacing: delegate
                    .minimum_interitem_spacing(s)
                    .unwrap_or(config.minimum_interitem_spacing),
                header: delegate
                    .header_size(s)
                    .unwrap_or(config.header_reference_size),
                footer: delegate
                    .footer_size(s)
                    .unwrap_or(config.footer_reference_size),
                item_sizes: (0..counts.items_in(s))
                    .map(|i| {
                        delegate
                            .item_size(IndexPath::new(s, i))
                            .unwrap_or(config.item_size)
                    })
                    .collect(),
            })
            .collect();
    }

    fn metrics_match(&self, counts: &SectionCounts) -> bool {
        self.metrics.len() == counts.sections()
            && self
                .metrics
                .iter()
                .enumerate()
                .all(|(s, m)| m.item_sizes.len() == counts.items_in(s))
    }

    fn item_size(&self, section: usize, item: usize) -> Size {
        if let Some(estimate) = self.config.estimated_item_size {
            return self
                .measured
                .get(&IndexPath::new(section, item))
                .copied()
                .unwrap_or(estimate);
        }
        self.metrics
            .get(section)
            .and_then(|m| m.item_sizes.get(item))
            .copied()
            .unwrap_or(self.config.item_size)
    }

    fn pack(&mut self) {
        let dir = self.config.scroll_direction;
        let cross_extent = dir.cross(self.bounds.size());
        let mut main = 0.0;
        let mut sections = Vec::with_capacity(self.metrics.len());
        for (section, m) in self.metrics.iter().enumerate() {
            let (cross_before, cross_after, main_before, main_after) = dir.insets(m.insets);
            let main_start = main;
            let header_main = dir.main(m.header);
            let header =
                (header_main > 0.0).then(|| dir.rect(0.0, main, cross_extent, header_main));
            main += header_main;
            let body_start = main;
            main += main_before;

            let available = (cross_extent - cross_before - cross_after).max(0.0);
            let n = m.item_sizes.len();
            let mut items = Vec::with_capacity(n);
            let mut lines = Vec::new();
            let mut first = 0;
            while first < n {
                let mut sizes: SmallVec<[Size; 16]> = SmallVec::new();
                sizes.push(self.item_size(section, first));
                let mut used = dir.cross(sizes[0]);
                while first + sizes.len() < n {
                    let next = self.item_size(section, first + sizes.len());
                    let grown = used + m.interitem_spacing + dir.cross(next);
                    if grown > available + EPSILON {
                        break;
                    }
                    used = grown;
                    sizes.push(next);
                }
                let end = first + sizes.len();
                let extent = sizes.iter().map(|s| dir.main(*s)).fold(0.0, f64::max);
                if !lines.is_empty() {
                    main += m.line_spacing;
                }
                let gaps = sizes.len() - 1;
                let gap = match self.config.line_alignment {
                    LineAlignment::Justify if gaps > 0 && end < n => {
                        let content = sizes.iter().map(|s| dir.cross(*s)).sum::<f64>();
                        (available - content) / gaps as f64
                    }
                    _ => m.interitem_spacing,
                };
                let mut cross = cross_before;
                for size in &sizes {
                    let offset = (extent - dir.main(*size)) * 0.5;
                    items.push(dir.rect(cross, main + offset, dir.cross(*size), dir.main(*size)));
                    cross += dir.cross(*size) + gap;
                }
                lines.push(Line {
                    main_start: main,
                    main_extent: extent,
                    first,
                    end,
                });
                main += extent;
                first = end;
            }
            main += main_after;
            let body = dir.rect(0.0, body_start, cross_extent, main - body_start);
            let footer_main = dir.main(m.footer);
            let footer =
                (footer_main > 0.0).then(|| dir.rect(0.0, main, cross_extent, footer_main));
            main += footer_main;
            sections.push(SectionGeometry {
                main_start,
                main_end: main,
                header,
                footer,
                body,
                lines,
                items,
            });
        }
        self.sections = sections;
        self.content_main = main;
    }

    fn header_attributes(&self, section: usize, s: &SectionGeometry) -> Option<LayoutAttributes> {
        let frame = s.header?;
        let mut a = LayoutAttributes::supplementary(
            ElementKind::SECTION_HEADER,
            IndexPath::new(section, 0),
            frame,
        );
        if self.config.pin_headers {
            let dir = self.config.scroll_direction;
            let (natural, natural_end) = dir.main_range(frame);
            let len = natural_end - natural;
            let visible_start = dir.main_range(self.bounds).0;
            let limit = s.footer.map_or(s.main_end, |f| dir.main_range(f).0) - len;
            let start = visible_start.min(limit).max(natural);
            a.frame = frame + dir.vec(start - natural);
            a.z_index = PINNED_Z_INDEX;
        }
        Some(a)
    }

    fn footer_attributes(&self, section: usize, s: &SectionGeometry) -> Option<LayoutAttributes> {
        let frame = s.footer?;
        let mut a = LayoutAttributes::supplementary(
            ElementKind::SECTION_FOOTER,
            IndexPath::new(section, 0),
            frame,
        );
        if self.config.pin_footers {
            let dir = self.config.scroll_direction;
            let (natural, natural_end) = dir.main_range(frame);
            let len = natural_end - natural;
            let visible_end = dir.main_range(self.bounds).1;
            let limit = s.header.map_or(s.main_start, |h| dir.main_range(h).1);
            let start = (visible_end - len).max(limit).min(natural);
            a.frame = frame + dir.vec(start - natural);
            a.z_index = PINNED_Z_INDEX;
        }
        Some(a)
    }

    fn background_attributes(
        &self,
        section: usize,
        s: &SectionGeometry,
    ) -> Option<LayoutAttributes> {
        if !self.config.section_backgrounds {
            return None;
        }
        let mut a = LayoutAttributes::decoration(
            ElementKind::SECTION_BACKGROUND,
            IndexPath::new(section, 0),
            s.body,
        );
        a.z_index = BACKGROUND_Z_INDEX;
        Some(a)
    }

    fn section_in_rect<'a>(
        &'a self,
        section: usize,
        s: &'a SectionGeometry,
        rect: Rect,
    ) -> impl Iterator<Item = LayoutAttributes> + 'a {
        let (lo, hi) = self.config.scroll_direction.main_range(rect);
        let first_line = s.lines.partition_point(|l| l.main_end() <= lo);
        let cells = s.lines[first_line..]
            .iter()
            .take_while(move |l| l.main_start < hi)
            .flat_map(|l| l.first..l.end)
            .filter_map(move |i| {
                let frame = *s.items.get(i)?;
                overlaps(frame, rect)
                    .then(|| LayoutAttributes::cell(IndexPath::new(section, i), frame))
            });
        let visible = move |a: &LayoutAttributes| overlaps(a.frame, rect);
        let background = self.background_attributes(section, s).filter(visible);
        let header = self.header_attributes(section, s).filter(visible);
        let footer = self.footer_attributes(section, s).filter(visible);
        background.into_iter().chain(header).chain(cells).chain(footer)
    }

    /// Main-axis growth of the line holding `path` if that item took `size`.
    fn line_growth(&self, path: IndexPath, size: Size) -> Option<(f64, Line)> {
        let dir = self.config.scroll_direction;
        let s = self.sections.get(path.section)?;
        let idx = s.lines.partition_point(|l| l.end <= path.item);
        let line = *s.lines.get(idx)?;
        let extent = (line.first..line.end)
            .map(|i| {
                if i == path.item {
                    dir.main(size)
                } else {
                    s.items.get(i).map_or(0.0, |r| dir.main(r.size()))
                }
            })
            .fold(0.0, f64::max);
        Some((extent - line.main_extent, line))
    }

    fn line_starts(&self) -> impl Iterator<Item = f64> + '_ {
        self.sections
            .iter()
            .flat_map(|s| s.lines.iter().map(|l| l.main_start))
    }
}

impl<D: FlowDelegate> CollectionLayout for FlowLayout<D> {
    fn prepare(&mut self, cx: &LayoutContext<'_>) {
        self.bounds = cx.bounds;
        if cx.invalidation.is_keys_only() && self.sections.len() == cx.counts.sections() {
            // Pinned elements are placed at query time from the new bounds.
            return;
        }
        if cx.invalidation.invalidates_delegate_metrics() || !self.metrics_match(cx.counts) {
            self.query_metrics(cx.counts);
        }
        self.pack();
    }

    fn content_extent(&self) -> Size {
        let dir = self.config.scroll_direction;
        dir.size(dir.cross(self.bounds.size()), self.content_main)
    }

    fn attributes_in_rect<'a>(
        &'a self,
        rect: Rect,
    ) -> Box<dyn Iterator<Item = LayoutAttributes> + 'a> {
        let (lo, hi) = self.config.scroll_direction.main_range(rect);
        let first = self.sections.partition_point(|s| s.main_end <= lo);
        Box::new(
            self.sections[first..]
                .iter()
                .zip(first..)
                .take_while(move |(s, _)| s.main_start < hi)
                .flat_map(move |(s, section)| self.section_in_rect(section, s, rect)),
        )
    }

    fn attributes_for(&self, key: &ElementKey) -> Option<LayoutAttributes> {
        let path = key.index_path();
        let s = self.sections.get(path.section)?;
        match key {
            ElementKey::Cell(_) => {
                let frame = *s.items.get(path.item)?;
                Some(LayoutAttributes::cell(path, frame))
            }
            _ if path.item != 0 => None,
            ElementKey::Supplementary(kind, _) if *kind == ElementKind::SECTION_HEADER => {
                self.header_attributes(path.section, s)
            }
            ElementKey::Supplementary(kind, _) if *kind == ElementKind::SECTION_FOOTER => {
                self.footer_attributes(path.section, s)
            }
            ElementKey::Decoration(kind, _) if *kind == ElementKind::SECTION_BACKGROUND => {
                self.background_attributes(path.section, s)
            }
            _ => None,
        }
    }

    fn bounds_changed(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    fn should_invalidate_for_bounds_change(&self, old: Rect, new: Rect) -> bool {
        let dir = self.config.scroll_direction;
        if dir.cross(old.size()) != dir.cross(new.size()) {
            return true;
        }
        (self.config.pin_headers || self.config.pin_footers) && old != new
    }

    fn invalidation_context_for_bounds_change(&self, old: Rect, new: Rect) -> InvalidationContext {
        let dir = self.config.scroll_direction;
        if dir.cross(old.size()) != dir.cross(new.size()) {
            return InvalidationContext::with_flags(InvalidationFlags::LAYOUT_ATTRIBUTES);
        }
        let pin_headers = self.config.pin_headers;
        let pin_footers = self.config.pin_footers;
        let keys = self.sections.iter().enumerate().flat_map(|(i, s)| {
            let header = (pin_headers && s.header.is_some()).then(|| ElementKey::header(i));
            let footer = (pin_footers && s.footer.is_some()).then(|| ElementKey::footer(i));
            header.into_iter().chain(footer)
        });
        InvalidationContext::new().with_keys(keys)
    }

    fn should_invalidate_for_preferred_attributes(
        &self,
        preferred: &LayoutAttributes,
        original: &LayoutAttributes,
    ) -> bool {
        if self.config.estimated_item_size.is_none()
            || !matches!(preferred.key, ElementKey::Cell(_))
        {
            return false;
        }
        let (p, o) = (preferred.size(), original.size());
        (p.width - o.width).abs() > EPSILON || (p.height - o.height).abs() > EPSILON
    }

    fn invalidation_context_for_preferred_attributes(
        &mut self,
        preferred: &LayoutAttributes,
        _original: &LayoutAttributes,
    ) -> InvalidationContext {
        let ElementKey::Cell(path) = preferred.key else {
            return InvalidationContext::new();
        };
        let size = preferred.size();
        self.measured.insert(path, size);
        let mut cx = InvalidationContext::with_flags(InvalidationFlags::LAYOUT_ATTRIBUTES);
        let dir = self.config.scroll_direction;
        if let Some((growth, line)) = self.line_growth(path, size) {
            cx = cx.with_size_adjustment(dir.size(0.0, growth));
            // Keep visible content in place when a line above the viewport changes.
            if line.main_end() <= dir.main_range(self.bounds).0 {
                cx = cx.with_offset_adjustment(dir.vec(growth));
            }
        }
        cx
    }

    fn target_content_offset(&self, proposed: Point, velocity: Vec2) -> Point {
        if self.config.snap == SnapMode::None {
            return proposed;
        }
        let dir = self.config.scroll_direction;
        let at = dir.main_of(proposed.to_vec2());
        let v = dir.main_of(velocity);
        let nearest = |candidates: &mut dyn Iterator<Item = f64>| {
            candidates.fold(None, |best: Option<f64>, x| match best {
                Some(b) if (b - at).abs() <= (x - at).abs() => Some(b),
                _ => Some(x),
            })
        };
        let directed = if v > 0.0 {
            nearest(&mut self.line_starts().filter(|x| *x >= at - EPSILON))
        } else if v < 0.0 {
            nearest(&mut self.line_starts().filter(|x| *x <= at + EPSILON))
        } else {
            None
        };
        let Some(target) = directed.or_else(|| nearest(&mut self.line_starts())) else {
            return proposed;
        };
        let max = (self.content_main - dir.main(self.bounds.size())).max(0.0);
        dir.with_main(proposed, target.clamp(0.0, max))
    }

    fn prepare_for_updates(&mut self, updates: &UpdateMap) {
        if self.measured.is_empty() {
            return;
        }
        let measured = core::mem::take(&mut self.measured);
        self.measured = measured
            .into_iter()
            .filter_map(|(path, size)| updates.map_forward(path).map(|to| (to, size)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::CollectionLayoutEngine;
    use crate::update::UpdateItem;

    fn engine(
        config: FlowLayoutConfig,
        width: f64,
        counts: &[usize],
    ) -> CollectionLayoutEngine<FlowLayout> {
        let bounds = Rect::new(0.0, 0.0, width, 100.0);
        let mut e = CollectionLayoutEngine::new(FlowLayout::new(config), bounds);
        e.prepare(counts);
        e
    }

    fn frame(e: &mut CollectionLayoutEngine<FlowLayout>, section: usize, item: usize) -> Rect {
        e.attributes_for(&ElementKey::cell(section, item)).unwrap().frame
    }

    #[test]
    fn ten_items_in_four_lines() {
        let mut e = engine(FlowLayoutConfig::default(), 170.0, &[10]);
        assert_eq!(e.layout().line_count(0), 4);
        assert_eq!(e.content_extent().unwrap(), Size::new(170.0, 230.0));
        assert_eq!(frame(&mut e, 0, 2), Rect::new(120.0, 0.0, 170.0, 50.0));
        assert_eq!(frame(&mut e, 0, 3), Rect::new(0.0, 60.0, 50.0, 110.0));
        assert_eq!(frame(&mut e, 0, 9), Rect::new(0.0, 180.0, 50.0, 230.0));
    }

    #[test]
    fn justify_spreads_full_lines_only() {
        let mut e = engine(FlowLayoutConfig::default(), 180.0, &[4]);
        // 3 fit (170 <= 180); spare 10 shared by two gaps.
        assert_eq!(frame(&mut e, 0, 1).x0, 65.0);
        assert_eq!(frame(&mut e, 0, 2).x0, 130.0);
        // Last line aligns to the start.
        assert_eq!(frame(&mut e, 0, 3).x0, 0.0);

        let start = FlowLayoutConfig {
            line_alignment: LineAlignment::Start,
            ..FlowLayoutConfig::default()
        };
        let mut e = engine(start, 180.0, &[4]);
        assert_eq!(frame(&mut e, 0, 1).x0, 60.0);
        assert_eq!(frame(&mut e, 0, 2).x0, 120.0);
    }

    #[test]
    fn an_oversized_item_gets_its_own_line() {
        let config = FlowLayoutConfig {
            item_size: Size::new(300.0, 20.0),
            ..FlowLayoutConfig::default()
        };
        let e = engine(config, 100.0, &[2]);
        assert_eq!(e.layout().line_count(0), 2);
        assert_eq!(e.content_extent().unwrap().height, 50.0);
    }

    struct Tall;

    impl FlowDelegate for Tall {
        fn item_size(&self, path: IndexPath) -> Option<Size> {
            (path.item == 0).then_some(Size::new(50.0, 80.0))
        }

        fn section_insets(&self, section: usize) -> Option<Insets> {
            (section == 1).then_some(Insets::new(5.0, 7.0, 5.0, 3.0))
        }
    }

    #[test]
    fn lines_are_as_deep_as_their_deepest_item() {
        let config = FlowLayoutConfig {
            header_reference_size: Size::new(0.0, 20.0),
            footer_reference_size: Size::new(0.0, 10.0),
            ..FlowLayoutConfig::default()
        };
        let layout = FlowLayout::with_delegate(config, Tall);
        let mut e = CollectionLayoutEngine::new(layout, Rect::new(0.0, 0.0, 170.0, 100.0));
        e.prepare(&[2_usize, 1]);
        // Section 0: header 20, one 80 deep line, footer 10.
        let first = e.attributes_for(&ElementKey::cell(0, 0)).unwrap().frame;
        let second = e.attributes_for(&ElementKey::cell(0, 1)).unwrap().frame;
        assert_eq!(first, Rect::new(0.0, 20.0, 50.0, 100.0));
        assert_eq!(second, Rect::new(60.0, 35.0, 110.0, 85.0));
        let footer = e.attributes_for(&ElementKey::footer(0)).unwrap().frame;
        assert_eq!(footer, Rect::new(0.0, 100.0, 170.0, 110.0));
        // Section 1 starts at 110: header 20, top inset 7, the delegate's 80 deep item.
        let header = e.attributes_for(&ElementKey::header(1)).unwrap().frame;
        assert_eq!(header, Rect::new(0.0, 110.0, 170.0, 130.0));
        let item = e.attributes_for(&ElementKey::cell(1, 0)).unwrap().frame;
        assert_eq!(item, Rect::new(5.0, 137.0, 55.0, 217.0));
        assert_eq!(e.content_extent().unwrap().height, 230.0);
    }

    #[test]
    fn horizontal_scrolling_swaps_axes() {
        let config = FlowLayoutConfig {
            scroll_direction: ScrollDirection::Horizontal,
            ..FlowLayoutConfig::default()
        };
        let bounds = Rect::new(0.0, 0.0, 100.0, 110.0);
        let mut e = CollectionLayoutEngine::new(FlowLayout::new(config), bounds);
        e.prepare(&[5_usize]);
        // Two per column, three columns.
        assert_eq!(e.layout().line_count(0), 3);
        assert_eq!(e.content_extent().unwrap(), Size::new(170.0, 110.0));
        assert_eq!(frame(&mut e, 0, 1), Rect::new(0.0, 60.0, 50.0, 110.0));
        assert_eq!(frame(&mut e, 0, 2), Rect::new(60.0, 0.0, 110.0, 50.0));
    }

    #[test]
    fn region_queries_include_supplementary_and_decoration() {
        let config = FlowLayoutConfig {
            header_reference_size: Size::new(0.0, 30.0),
            section_backgrounds: true,
            ..FlowLayoutConfig::default()
        };
        let e = engine(config, 170.0, &[3, 3]);
        let keys: Vec<_> = e
            .attributes_in_rect(Rect::new(0.0, 0.0, 170.0, 40.0))
            .unwrap()
            .map(|a| a.key)
            .collect();
        assert_eq!(
            keys,
            [
                ElementKey::background(0),
                ElementKey::header(0),
                ElementKey::cell(0, 0),
                ElementKey::cell(0, 1),
                ElementKey::cell(0, 2),
            ]
        );
        let background = e.layout().attributes_for(&ElementKey::background(1)).unwrap();
        assert_eq!(background.z_index, BACKGROUND_Z_INDEX);
        assert_eq!(background.frame, Rect::new(0.0, 110.0, 170.0, 160.0));
        // The band between the two sections' items only touches edges.
        let between: Vec<_> = e
            .attributes_in_rect(Rect::new(0.0, 80.0, 170.0, 80.0 + 1e-3))
            .unwrap()
            .map(|a| a.key)
            .collect();
        assert_eq!(between, [ElementKey::header(1)]);
    }

    #[test]
    fn pinned_headers_follow_the_viewport() {
        let config = FlowLayoutConfig {
            header_reference_size: Size::new(0.0, 20.0),
            pin_headers: true,
            ..FlowLayoutConfig::default()
        };
        // Section 0 spans 0..130 (header 20, two lines), section 1 follows.
        let mut e = engine(config, 170.0, &[6, 3]);
        assert!(e.set_bounds(Rect::new(0.0, 50.0, 170.0, 150.0)));
        let pending = e.pending_invalidation().unwrap();
        assert!(pending.is_keys_only());
        e.prepare(&[6_usize, 3]);
        let header = e.attributes_for(&ElementKey::header(0)).unwrap();
        assert_eq!(header.frame, Rect::new(0.0, 50.0, 170.0, 70.0));
        assert_eq!(header.z_index, PINNED_Z_INDEX);

        // Pushed up by the end of its section.
        e.set_bounds(Rect::new(0.0, 125.0, 170.0, 225.0));
        e.prepare(&[6_usize, 3]);
        let header = e.attributes_for(&ElementKey::header(0)).unwrap();
        assert_eq!(header.frame, Rect::new(0.0, 110.0, 170.0, 130.0));
        let next = e.attributes_for(&ElementKey::header(1)).unwrap();
        assert_eq!(next.frame, Rect::new(0.0, 130.0, 170.0, 150.0));
    }

    #[test]
    fn pinned_footers_stick_to_the_trailing_edge() {
        let config = FlowLayoutConfig {
            footer_reference_size: Size::new(0.0, 10.0),
            pin_footers: true,
            ..FlowLayoutConfig::default()
        };
        // One section: three lines (0..170), footer at 170.
        let mut e = engine(config, 170.0, &[9]);
        let footer = e.attributes_for(&ElementKey::footer(0)).unwrap();
        assert_eq!(footer.frame, Rect::new(0.0, 90.0, 170.0, 100.0));
        e.set_bounds(Rect::new(0.0, 150.0, 170.0, 250.0));
        e.prepare(&[9_usize]);
        let footer = e.attributes_for(&ElementKey::footer(0)).unwrap();
        assert_eq!(footer.frame, Rect::new(0.0, 170.0, 170.0, 180.0));
    }

    #[test]
    fn bounds_policy() {
        let mut e = engine(FlowLayoutConfig::default(), 170.0, &[10]);
        // Scrolling without pinning does not invalidate.
        assert!(!e.set_bounds(Rect::new(0.0, 40.0, 170.0, 140.0)));
        // A width change reflows.
        assert!(e.set_bounds(Rect::new(0.0, 40.0, 110.0, 140.0)));
        e.prepare(&[10_usize]);
        assert_eq!(e.layout().line_count(0), 5);
    }

    struct Counting {
        calls: Cell<usize>,
    }

    impl FlowDelegate for Counting {
        fn minimum_line_spacing(&self, _section: usize) -> Option<f64> {
            self.calls.set(self.calls.get() + 1);
            None
        }
    }

    #[test]
    fn delegate_metrics_are_cached() {
        let layout = FlowLayout::with_delegate(
            FlowLayoutConfig::default(),
            Counting {
                calls: Cell::new(0),
            },
        );
        let mut e = CollectionLayoutEngine::new(layout, Rect::new(0.0, 0.0, 170.0, 100.0));
        e.prepare(&[3_usize, 3]);
        assert_eq!(e.layout().delegate().calls.get(), 2);

        e.invalidate_with(InvalidationContext::with_flags(
            InvalidationFlags::LAYOUT_ATTRIBUTES,
        ));
        e.prepare(&[3_usize, 3]);
        assert_eq!(e.layout().delegate().calls.get(), 2);

        e.invalidate_with(InvalidationContext::with_flags(
            InvalidationFlags::DELEGATE_METRICS,
        ));
        e.prepare(&[3_usize, 3]);
        assert_eq!(e.layout().delegate().calls.get(), 4);
    }

    fn self_sizing() -> FlowLayoutConfig {
        FlowLayoutConfig {
            estimated_item_size: Some(Size::new(50.0, 50.0)),
            ..FlowLayoutConfig::default()
        }
    }

    #[test]
    fn self_sizing_replaces_estimates() {
        let mut e = engine(self_sizing(), 170.0, &[6]);
        assert_eq!(e.content_extent().unwrap().height, 110.0);

        let mut preferred = e.attributes_for(&ElementKey::cell(0, 1)).unwrap();
        preferred.frame = Rect::new(0.0, 0.0, 50.0, 90.0);
        assert_eq!(e.apply_preferred_attributes(&preferred), Ok(true));
        let applied = e.prepare(&[6_usize]).unwrap();
        assert_eq!(applied.content_size_adjustment, Size::new(0.0, 40.0));
        assert_eq!(applied.content_offset_adjustment, Vec2::ZERO);
        assert_eq!(e.content_extent().unwrap().height, 150.0);
        // Line 0 is now 90 deep; its 50 deep items are centered.
        assert_eq!(frame(&mut e, 0, 0), Rect::new(0.0, 20.0, 50.0, 70.0));
        assert_eq!(frame(&mut e, 0, 1), Rect::new(60.0, 0.0, 110.0, 90.0));

        // Same size again: nothing to do.
        let same = e.attributes_for(&ElementKey::cell(0, 1)).unwrap();
        assert_eq!(e.apply_preferred_attributes(&same), Ok(false));
    }

    #[test]
    fn growth_above_the_viewport_adjusts_the_offset() {
        let mut e = engine(self_sizing(), 170.0, &[9]);
        e.set_bounds(Rect::new(0.0, 100.0, 170.0, 200.0));
        let mut preferred = e.attributes_for(&ElementKey::cell(0, 0)).unwrap();
        preferred.frame = Rect::new(0.0, 0.0, 50.0, 60.0);
        e.apply_preferred_attributes(&preferred).unwrap();
        let applied = e.prepare(&[9_usize]).unwrap();
        assert_eq!(applied.content_offset_adjustment, Vec2::new(0.0, 10.0));
    }

    #[test]
    fn measured_sizes_follow_batch_updates() {
        let mut e = engine(self_sizing(), 170.0, &[3]);
        let mut preferred = e.attributes_for(&ElementKey::cell(0, 2)).unwrap();
        preferred.frame = Rect::new(0.0, 0.0, 50.0, 70.0);
        e.apply_preferred_attributes(&preferred).unwrap();
        e.prepare(&[3_usize]);

        e.prepare_for_updates(&[UpdateItem::delete(IndexPath::new(0, 0))], &[2_usize])
            .unwrap();
        assert_eq!(e.layout().measured_size(IndexPath::new(0, 1)), Some(Size::new(50.0, 70.0)));
        assert_eq!(e.layout().measured_size(IndexPath::new(0, 2)), None);
        e.finalize_updates().unwrap();
        assert_eq!(frame(&mut e, 0, 1).height(), 70.0);
    }

    fn with_headers() -> FlowLayoutConfig {
        FlowLayoutConfig {
            header_reference_size: Size::new(0.0, 24.0),
            ..FlowLayoutConfig::default()
        }
    }

    #[test]
    fn deleted_section_takes_its_header_along() {
        // Each section is a 24 deep header over one 50 deep line.
        let mut e = engine(with_headers(), 170.0, &[1, 1, 1]);
        e.prepare_for_updates(&[UpdateItem::delete_section(0)], &[1_usize, 1])
            .unwrap();
        assert_eq!(
            e.disappearing_keys().unwrap(),
            [ElementKey::cell(0, 0), ElementKey::header(0)]
        );
        assert!(e.appearing_keys().unwrap().is_empty());

        let gone = e.final_attributes_for_disappearing(&ElementKey::header(0)).unwrap();
        assert_eq!(gone.alpha, 0.0);
        assert_eq!(gone.frame.y0, 0.0);
        let slide = e.final_attributes_for_disappearing(&ElementKey::header(1)).unwrap();
        assert_eq!(slide.alpha, 1.0);
        assert_eq!(slide.key, ElementKey::header(1));
        assert_eq!(slide.frame.y0, 0.0);
        let start = e.initial_attributes_for_appearing(&ElementKey::header(1)).unwrap();
        assert_eq!(start.frame.y0, 148.0);
        assert_eq!(start.alpha, 1.0);
        e.finalize_updates().unwrap();
    }

    #[test]
    fn moved_section_views_slide_with_it() {
        let mut e = engine(with_headers(), 170.0, &[1, 2]);
        e.prepare_for_updates(&[UpdateItem::move_section(1, 0)], &[2_usize, 1])
            .unwrap();
        assert!(e.disappearing_keys().unwrap().is_empty());
        assert!(e.appearing_keys().unwrap().is_empty());

        let start = e.initial_attributes_for_appearing(&ElementKey::header(0)).unwrap();
        assert_eq!(start.frame.y0, 74.0);
        assert_eq!(start.alpha, 1.0);
        let end = e.final_attributes_for_disappearing(&ElementKey::header(0)).unwrap();
        assert_eq!(end.frame.y0, 74.0);
        let cell = e.final_attributes_for_disappearing(&ElementKey::cell(1, 1)).unwrap();
        assert_eq!(cell.frame, Rect::new(60.0, 24.0, 110.0, 74.0));
        e.finalize_updates().unwrap();
    }

    #[test]
    fn inserted_section_fades_in() {
        let mut e = engine(with_headers(), 170.0, &[1]);
        e.prepare_for_updates(&[UpdateItem::insert_section(0)], &[1_usize, 1])
            .unwrap();
        assert_eq!(
            e.appearing_keys().unwrap(),
            [ElementKey::cell(0, 0), ElementKey::header(0)]
        );
        let fresh = e.initial_attributes_for_appearing(&ElementKey::header(0)).unwrap();
        assert_eq!(fresh.alpha, 0.0);
        assert_eq!(fresh.frame.y0, 0.0);
        let pushed = e.initial_attributes_for_appearing(&ElementKey::header(1)).unwrap();
        assert_eq!(pushed.frame.y0, 0.0);
        assert_eq!(pushed.alpha, 1.0);
        e.finalize_updates().unwrap();
    }

    #[test]
    fn line_start_snapping() {
        let config = FlowLayoutConfig {
            snap: SnapMode::LineStart,
            ..FlowLayoutConfig::default()
        };
        let e = engine(config, 170.0, &[30]);
        // Line starts: 0, 60, 120, ...
        let at_rest = e.target_content_offset(Point::new(0.0, 80.0), Vec2::ZERO).unwrap();
        assert_eq!(at_rest, Point::new(0.0, 60.0));
        let forward = e.target_content_offset(Point::new(0.0, 70.0), Vec2::new(0.0, 2.0)).unwrap();
        assert_eq!(forward, Point::new(0.0, 120.0));
        let back = e.target_content_offset(Point::new(0.0, 110.0), Vec2::new(0.0, -2.0)).unwrap();
        assert_eq!(back, Point::new(0.0, 60.0));
        // Clamped to the end of the content: 10 lines, 590 deep, 100 tall viewport.
        let end = e.target_content_offset(Point::new(0.0, 575.0), Vec2::new(0.0, 1.0)).unwrap();
        assert_eq!(end, Point::new(0.0, 490.0));

        let plain = engine(FlowLayoutConfig::default(), 170.0, &[30]);
        let p = Point::new(0.0, 77.0);
        assert_eq!(plain.target_content_offset(p, Vec2::ZERO), Ok(p));
    }
}
