// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visual format strings.
//!
//! A compact ASCII notation for rows and columns of views:
//!
//! ```text
//! format      := (orientation ':')? ('|' connection)? view (connection view)* (connection '|')?
//! orientation := 'H' | 'V'
//! connection  := '' | '-' | '-' spacing '-'
//! spacing     := number | metric | '(' predicate (',' predicate)* ')'
//! view        := '[' name ('(' predicate (',' predicate)* ')')? ']'
//! predicate   := ('==' | '<=' | '>=')? (number | metric | view) ('@' (number | metric))?
//! ```
//!
//! Whitespace between tokens is ignored. `-` alone is the standard spacing;
//! no connection at all means the views touch. A `@priority` applies to the
//! predicate right before it, and a predicate takes at most one.

use alloc::vec::Vec;
use core::ops::Range;

use hashbrown::HashMap;

use crate::constraint::Constraint;
use crate::error::{FormatErrorKind, FormatParseError};
use crate::types::{Axis, ItemId, LayoutAttribute, Priority, Relation};

bitflags::bitflags! {
    /// Options for [`ConstraintLayout::constraints_with_visual_format`](crate::ConstraintLayout::constraints_with_visual_format).
    ///
    /// Alignment flags add `next.attr == previous.attr` for each pair of
    /// adjacent views and must be perpendicular to the orientation. The
    /// direction flags pick which horizontal edges the format walks; with
    /// neither set it walks leading to trailing.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FormatOptions: u32 {
        /// Align left edges.
        const ALIGN_ALL_LEFT = 1 << 1;
        /// Align right edges.
        const ALIGN_ALL_RIGHT = 1 << 2;
        /// Align top edges.
        const ALIGN_ALL_TOP = 1 << 3;
        /// Align bottom edges.
        const ALIGN_ALL_BOTTOM = 1 << 4;
        /// Align leading edges.
        const ALIGN_ALL_LEADING = 1 << 5;
        /// Align trailing edges.
        const ALIGN_ALL_TRAILING = 1 << 6;
        /// Align horizontal centers.
        const ALIGN_ALL_CENTER_X = 1 << 9;
        /// Align vertical centers.
        const ALIGN_ALL_CENTER_Y = 1 << 10;
        /// Align baselines.
        const ALIGN_ALL_BASELINE = 1 << 11;
        /// Walk horizontal formats from left to right regardless of layout direction.
        const DIRECTION_LEFT_TO_RIGHT = 1 << 16;
        /// Walk horizontal formats from right to left regardless of layout direction.
        const DIRECTION_RIGHT_TO_LEFT = 2 << 16;
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self::empty()
    }
}

const ALIGNMENTS: [(FormatOptions, LayoutAttribute); 9] = [
    (FormatOptions::ALIGN_ALL_LEFT, LayoutAttribute::Left),
    (FormatOptions::ALIGN_ALL_RIGHT, LayoutAttribute::Right),
    (FormatOptions::ALIGN_ALL_TOP, LayoutAttribute::Top),
    (FormatOptions::ALIGN_ALL_BOTTOM, LayoutAttribute::Bottom),
    (FormatOptions::ALIGN_ALL_LEADING, LayoutAttribute::Leading),
    (FormatOptions::ALIGN_ALL_TRAILING, LayoutAttribute::Trailing),
    (FormatOptions::ALIGN_ALL_CENTER_X, LayoutAttribute::CenterX),
    (FormatOptions::ALIGN_ALL_CENTER_Y, LayoutAttribute::CenterY),
    (FormatOptions::ALIGN_ALL_BASELINE, LayoutAttribute::Baseline),
];

/// Names available to a visual format string.
///
/// Metric names shadow view names.
///
/// ```rust
/// use understory_constraint::{ConstraintLayout, FormatBindings, FormatOptions, ItemProps};
///
/// let mut layout = ConstraintLayout::new();
/// let root = layout.insert_item(None, ItemProps::default());
/// let icon = layout.insert_item(Some(root), ItemProps::default());
/// let title = layout.insert_item(Some(root), ItemProps::default());
///
/// let bindings = FormatBindings::new()
///     .view("icon", icon)
///     .view("title", title)
///     .metric("pad", 12.0);
/// let constraints = layout
///     .constraints_with_visual_format(
///         "H:|-pad-[icon(32)]-[title(>=100@750)]-|",
///         FormatOptions::ALIGN_ALL_CENTER_Y,
///         &bindings,
///     )
///     .unwrap();
/// assert_eq!(constraints.len(), 6);
/// ```
#[derive(Clone, Debug, Default)]
pub struct FormatBindings<'a> {
    views: HashMap<&'a str, ItemId>,
    metrics: HashMap<&'a str, f64>,
}

impl<'a> FormatBindings<'a> {
    /// Empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: bind a view name.
    pub fn view(mut self, name: &'a str, item: ItemId) -> Self {
        self.views.insert(name, item);
        self
    }

    /// Builder: bind a metric name.
    pub fn metric(mut self, name: &'a str, value: f64) -> Self {
        self.metrics.insert(name, value);
        self
    }

    /// Bind a view name in place.
    pub fn insert_view(&mut self, name: &'a str, item: ItemId) {
        self.views.insert(name, item);
    }

    /// Bind a metric name in place.
    pub fn insert_metric(&mut self, name: &'a str, value: f64) {
        self.metrics.insert(name, value);
    }
}

/// What the lowering step needs from the layout.
pub(crate) struct FormatContext<'a> {
    pub(crate) parent_of: &'a dyn Fn(ItemId) -> Option<ItemId>,
    pub(crate) sibling_spacing: f64,
    pub(crate) superview_spacing: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Object {
    Constant(f64),
    View(ItemId),
}

#[derive(Clone, Debug, PartialEq)]
struct Predicate {
    relation: Relation,
    object: Object,
    priority: Priority,
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Spacing {
    relation: Relation,
    value: f64,
    priority: Priority,
}

#[derive(Clone, Debug, PartialEq)]
enum Connection {
    Flush,
    Standard,
    Explicit(Vec<Spacing>),
}

impl Connection {
    fn spacings(&self, standard: f64) -> Vec<Spacing> {
        let fixed = |value| Spacing {
            relation: Relation::Equal,
            value,
            priority: Priority::REQUIRED,
        };
        match self {
            Self::Flush => alloc::vec![fixed(0.0)],
            Self::Standard => alloc::vec![fixed(standard)],
            Self::Explicit(s) => s.clone(),
        }
    }
}

#[derive(Clone, Debug)]
struct ViewSpec {
    item: ItemId,
    predicates: Vec<Predicate>,
    span: Range<usize>,
}

#[derive(Clone, Debug)]
struct Parsed {
    axis: Axis,
    leading: Option<Connection>,
    views: Vec<ViewSpec>,
    gaps: Vec<Connection>,
    trailing: Option<Connection>,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    bindings: &'a FormatBindings<'a>,
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_number_start(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+')
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, bindings: &'a FormatBindings<'a>) -> Self {
        Self {
            src,
            pos: 0,
            bindings,
        }
    }

    fn error(&self, kind: FormatErrorKind, span: Range<usize>) -> FormatParseError {
        FormatParseError::new(kind, self.src, span)
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> FormatParseError {
        match self.src[self.pos..].chars().next() {
            Some(c) => self.error(
                FormatErrorKind::UnexpectedCharacter(c),
                self.pos..self.pos + c.len_utf8(),
            ),
            None => self.error(FormatErrorKind::UnexpectedEnd, self.pos..self.pos),
        }
    }

    fn expect(&mut self, b: u8) -> Result<(), FormatParseError> {
        if self.eat(b) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse(mut self) -> Result<Parsed, FormatParseError> {
        self.skip_ws();
        let axis = self.orientation()?;
        self.skip_ws();
        if self.peek().is_none() {
            return Err(self.error(FormatErrorKind::NoViews, 0..self.src.len()));
        }
        let leading = if self.eat(b'|') {
            Some(self.connection()?)
        } else {
            None
        };

        let mut views = Vec::new();
        let mut gaps = Vec::new();
        let mut trailing = None;
        loop {
            self.skip_ws();
            if views.is_empty() && self.peek().is_none() {
                return Err(self.error(FormatErrorKind::NoViews, 0..self.src.len()));
            }
            views.push(self.view()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(b'|') => {
                    self.pos += 1;
                    trailing = Some(Connection::Flush);
                    break;
                }
                Some(b'-') => {
                    let c = self.connection()?;
                    self.skip_ws();
                    if self.eat(b'|') {
                        trailing = Some(c);
                        break;
                    }
                    gaps.push(c);
                }
                Some(b'[') => gaps.push(Connection::Flush),
                Some(_) => return Err(self.unexpected()),
            }
        }
        self.skip_ws();
        if self.peek().is_some() {
            return Err(self.unexpected());
        }
        Ok(Parsed {
            axis,
            leading,
            views,
            gaps,
            trailing,
        })
    }

    fn orientation(&mut self) -> Result<Axis, FormatParseError> {
        let axis = match self.peek() {
            Some(b'H') => Axis::Horizontal,
            Some(b'V') => Axis::Vertical,
            _ => return Ok(Axis::Horizontal),
        };
        self.pos += 1;
        self.skip_ws();
        self.expect(b':')?;
        Ok(axis)
    }

    fn connection(&mut self) -> Result<Connection, FormatParseError> {
        self.skip_ws();
        if !self.eat(b'-') {
            return Ok(Connection::Flush);
        }
        self.skip_ws();
        let spacings = match self.peek() {
            Some(b'(') => {
                // Views were already rejected by `predicate`.
                self.predicate_list(true)?
                    .into_iter()
                    .filter_map(|p| match p.object {
                        Object::Constant(value) => Some(Spacing {
                            relation: p.relation,
                            value,
                            priority: p.priority,
                        }),
                        Object::View(_) => None,
                    })
                    .collect()
            }
            Some(b) if b.is_ascii_digit() || b == b'.' => {
                let value = self.number()?;
                alloc::vec![Spacing {
                    relation: Relation::Equal,
                    value,
                    priority: Priority::REQUIRED,
                }]
            }
            Some(b) if is_name_start(b) => {
                let start = self.pos;
                let name = self.name();
                let value = self.metric_value(name, start, true)?;
                alloc::vec![Spacing {
                    relation: Relation::Equal,
                    value,
                    priority: Priority::REQUIRED,
                }]
            }
            _ => return Ok(Connection::Standard),
        };
        self.skip_ws();
        self.expect(b'-')?;
        Ok(Connection::Explicit(spacings))
    }

    fn view(&mut self) -> Result<ViewSpec, FormatParseError> {
        let start = self.pos;
        self.expect(b'[')?;
        self.skip_ws();
        let name_start = self.pos;
        if !self.peek().is_some_and(is_name_start) {
            return Err(self.unexpected());
        }
        let name = self.name();
        let Some(&item) = self.bindings.views.get(name) else {
            return Err(self.error(FormatErrorKind::UnknownName, name_start..self.pos));
        };
        self.skip_ws();
        let predicates = if self.peek() == Some(b'(') {
            self.predicate_list(false)?
        } else {
            Vec::new()
        };
        self.skip_ws();
        self.expect(b']')?;
        Ok(ViewSpec {
            item,
            predicates,
            span: start..self.pos,
        })
    }

    fn predicate_list(
        &mut self,
        in_connection: bool,
    ) -> Result<Vec<Predicate>, FormatParseError> {
        self.expect(b'(')?;
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            out.push(self.predicate(in_connection)?);
            self.skip_ws();
            if self.eat(b',') {
                continue;
            }
            self.expect(b')')?;
            return Ok(out);
        }
    }

    fn predicate(
        &mut self,
        in_connection: bool,
    ) -> Result<Predicate, FormatParseError> {
        let start = self.pos;
        let rest = &self.src.as_bytes()[self.pos..];
        let relation = match rest {
            [b'=', b'=', ..] => Some(Relation::Equal),
            [b'<', b'=', ..] => Some(Relation::LessOrEqual),
            [b'>', b'=', ..] => Some(Relation::GreaterOrEqual),
            _ => None,
        };
        if relation.is_some() {
            self.pos += 2;
        }
        self.skip_ws();
        let object = match self.peek() {
            Some(b) if is_number_start(b) => Object::Constant(self.number()?),
            Some(b) if is_name_start(b) => {
                let name_start = self.pos;
                let name = self.name();
                if let Some(&value) = self.bindings.metrics.get(name) {
                    Object::Constant(value)
                } else if let Some(&item) = self.bindings.views.get(name) {
                    if in_connection {
                        return Err(
                            self.error(FormatErrorKind::ViewInConnection, name_start..self.pos)
                        );
                    }
                    Object::View(item)
                } else {
                    return Err(self.error(FormatErrorKind::UnknownName, name_start..self.pos));
                }
            }
            Some(b'@' | b')' | b',') | None => {
                let end = (self.pos + 1).min(self.src.len());
                return Err(self.error(FormatErrorKind::MissingObject, start..end));
            }
            Some(_) => return Err(self.unexpected()),
        };
        self.skip_ws();
        let priority = if self.eat(b'@') {
            self.skip_ws();
            let p_start = self.pos;
            let value = match self.peek() {
                Some(b) if is_number_start(b) => self.number()?,
                Some(b) if is_name_start(b) => {
                    let name = self.name();
                    self.metric_value(name, p_start, false)?
                }
                _ => return Err(self.unexpected()),
            };
            if !(value > 0.0 && value <= 1000.0) {
                return Err(self.error(FormatErrorKind::InvalidPriority, p_start..self.pos));
            }
            #[allow(
                clippy::cast_possible_truncation,
                reason = "priorities live in [0, 1000] and are stored as f32."
            )]
            let p = Priority::new(value as f32);
            self.skip_ws();
            if self.peek() == Some(b'@') {
                return Err(self.error(FormatErrorKind::DuplicatePriority, self.pos..self.pos + 1));
            }
            p
        } else {
            Priority::REQUIRED
        };
        Ok(Predicate {
            relation: relation.unwrap_or(Relation::Equal),
            object,
            priority,
        })
    }

    fn name(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_name_continue) {
            self.pos += 1;
        }
        let src = self.src;
        &src[start..self.pos]
    }

    fn number(&mut self) -> Result<f64, FormatParseError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        while self.peek().is_some_and(|b| b.is_ascii_digit() || b == b'.') {
            self.pos += 1;
        }
        self.src[start..self.pos]
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.error(FormatErrorKind::InvalidNumber, start..self.pos))
    }

    fn metric_value(
        &self,
        name: &str,
        start: usize,
        in_connection: bool,
    ) -> Result<f64, FormatParseError> {
        if let Some(&v) = self.bindings.metrics.get(name) {
            return Ok(v);
        }
        let kind = if in_connection && self.bindings.views.contains_key(name) {
            FormatErrorKind::ViewInConnection
        } else {
            FormatErrorKind::UnknownName
        };
        Err(self.error(kind, start..self.pos))
    }
}

/// Build the constraint for one spacing between `before` and `after`.
///
/// Forward formats read `after.after_attr REL before.before_attr + value`;
/// reversed ones swap the sides so positive spacing still points along the format.
fn spacing_constraint(
    before: (ItemId, LayoutAttribute),
    after: (ItemId, LayoutAttribute),
    spacing: Spacing,
    reversed: bool,
) -> Constraint {
    let (first, second) = if reversed {
        (before, after)
    } else {
        (after, before)
    };
    Constraint::new(
        first.0,
        first.1,
        spacing.relation,
        second.0,
        second.1,
        1.0,
        spacing.value,
    )
    .with_priority(spacing.priority)
}

pub(crate) fn constraints_from_format(
    format: &str,
    options: FormatOptions,
    bindings: &FormatBindings<'_>,
    cx: &FormatContext<'_>,
) -> Result<Vec<Constraint>, FormatParseError> {
    let parsed = Parser::new(format, bindings).parse()?;
    let whole = 0..format.len();

    let (start_attr, end_attr, size_attr, reversed) = match parsed.axis {
        Axis::Vertical => (
            LayoutAttribute::Top,
            LayoutAttribute::Bottom,
            LayoutAttribute::Height,
            false,
        ),
        Axis::Horizontal => match (
            options.contains(FormatOptions::DIRECTION_LEFT_TO_RIGHT),
            options.contains(FormatOptions::DIRECTION_RIGHT_TO_LEFT),
        ) {
            (true, true) => {
                return Err(FormatParseError::new(
                    FormatErrorKind::InvalidOptions,
                    format,
                    whole,
                ));
            }
            (true, false) => (
                LayoutAttribute::Left,
                LayoutAttribute::Right,
                LayoutAttribute::Width,
                false,
            ),
            (false, true) => (
                LayoutAttribute::Right,
                LayoutAttribute::Left,
                LayoutAttribute::Width,
                true,
            ),
            (false, false) => (
                LayoutAttribute::Leading,
                LayoutAttribute::Trailing,
                LayoutAttribute::Width,
                false,
            ),
        },
    };

    let mut alignments = Vec::new();
    for (flag, attribute) in ALIGNMENTS {
        if options.contains(flag) {
            if attribute.axis() == Some(parsed.axis) {
                return Err(FormatParseError::new(
                    FormatErrorKind::InvalidOptions,
                    format,
                    whole,
                ));
            }
            alignments.push(attribute);
        }
    }

    let mut out = Vec::new();
    let (Some(first), Some(last)) = (parsed.views.first(), parsed.views.last()) else {
        return Err(FormatParseError::new(FormatErrorKind::NoViews, format, whole));
    };

    if let Some(conn) = &parsed.leading {
        let Some(superview) = (cx.parent_of)(first.item) else {
            return Err(FormatParseError::new(
                FormatErrorKind::MissingSuperview,
                format,
                first.span.clone(),
            ));
        };
        for s in conn.spacings(cx.superview_spacing) {
            out.push(spacing_constraint(
                (superview, start_attr),
                (first.item, start_attr),
                s,
                reversed,
            ));
        }
    }

    for (i, view) in parsed.views.iter().enumerate() {
        for p in &view.predicates {
            let c = match p.object {
                Object::Constant(value) => {
                    Constraint::constant(view.item, size_attr, p.relation, value)
                }
                Object::View(other) => Constraint::new(
                    view.item,
                    size_attr,
                    p.relation,
                    other,
                    size_attr,
                    1.0,
                    0.0,
                ),
            };
            out.push(c.with_priority(p.priority));
        }
        if let (Some(gap), Some(next)) = (parsed.gaps.get(i), parsed.views.get(i + 1)) {
            for s in gap.spacings(cx.sibling_spacing) {
                out.push(spacing_constraint(
                    (view.item, end_attr),
                    (next.item, start_attr),
                    s,
                    reversed,
                ));
            }
        }
    }

    if let Some(conn) = &parsed.trailing {
        let Some(superview) = (cx.parent_of)(last.item) else {
            return Err(FormatParseError::new(
                FormatErrorKind::MissingSuperview,
                format,
                last.span.clone(),
            ));
        };
        for s in conn.spacings(cx.superview_spacing) {
            out.push(spacing_constraint(
                (last.item, end_attr),
                (superview, end_attr),
                s,
                reversed,
            ));
        }
    }

    for pair in parsed.views.windows(2) {
        for &attribute in &alignments {
            out.push(Constraint::equal(pair[1].item, pair[0].item, attribute, 0.0));
        }
    }

    Ok(out)
}
