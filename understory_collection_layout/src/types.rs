// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element identity and data-source counts.

use alloc::borrow::Cow;
use alloc::vec::Vec;
use core::fmt;

/// Position of an item: section first, then item within the section.
///
/// Ordering is by section, then by item.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexPath {
    /// Section index.
    pub section: usize,
    /// Item index within the section.
    pub item: usize,
}

impl IndexPath {
    /// Creates an index path.
    #[must_use]
    pub const fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.item)
    }
}

/// Kind of element an attributes record describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementCategory {
    /// A data item.
    Cell,
    /// A data-backed view that is not an item, such as a section header.
    SupplementaryView,
    /// A purely visual element owned by the layout.
    DecorationView,
}

/// String kind of a supplementary or decoration element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKind(Cow<'static, str>);

impl ElementKind {
    /// Section header supplementary view.
    pub const SECTION_HEADER: Self = Self(Cow::Borrowed("section-header"));
    /// Section footer supplementary view.
    pub const SECTION_FOOTER: Self = Self(Cow::Borrowed("section-footer"));
    /// Section background decoration.
    pub const SECTION_BACKGROUND: Self = Self(Cow::Borrowed("section-background"));

    /// A custom kind.
    pub fn new(kind: impl Into<Cow<'static, str>>) -> Self {
        Self(kind.into())
    }

    /// The kind as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one element in one layout pass.
///
/// The variant fixes the [`ElementCategory`], so a key is unique across categories.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementKey {
    /// A cell.
    Cell(IndexPath),
    /// A supplementary view of the given kind.
    Supplementary(ElementKind, IndexPath),
    /// A decoration view of the given kind.
    Decoration(ElementKind, IndexPath),
}

impl ElementKey {
    /// Key of the cell at `(section, item)`.
    #[must_use]
    pub const fn cell(section: usize, item: usize) -> Self {
        Self::Cell(IndexPath::new(section, item))
    }

    /// Key of the header of `section`.
    #[must_use]
    pub const fn header(section: usize) -> Self {
        Self::Supplementary(ElementKind::SECTION_HEADER, IndexPath::new(section, 0))
    }

    /// Key of the footer of `section`.
    #[must_use]
    pub const fn footer(section: usize) -> Self {
        Self::Supplementary(ElementKind::SECTION_FOOTER, IndexPath::new(section, 0))
    }

    /// Key of the background decoration of `section`.
    #[must_use]
    pub const fn background(section: usize) -> Self {
        Self::Decoration(ElementKind::SECTION_BACKGROUND, IndexPath::new(section, 0))
    }

    /// Category implied by the variant.
    #[must_use]
    pub const fn category(&self) -> ElementCategory {
        match self {
            Self::Cell(_) => ElementCategory::Cell,
            Self::Supplementary(..) => ElementCategory::SupplementaryView,
            Self::Decoration(..) => ElementCategory::DecorationView,
        }
    }

    /// Index path component.
    #[must_use]
    pub const fn index_path(&self) -> IndexPath {
        match self {
            Self::Cell(p) | Self::Supplementary(_, p) | Self::Decoration(_, p) => *p,
        }
    }

    /// Kind component, `None` for cells.
    #[must_use]
    pub const fn kind(&self) -> Option<&ElementKind> {
        match self {
            Self::Cell(_) => None,
            Self::Supplementary(k, _) | Self::Decoration(k, _) => Some(k),
        }
    }

    /// The same element kind at another index path.
    #[must_use]
    pub fn with_index_path(&self, path: IndexPath) -> Self {
        match self {
            Self::Cell(_) => Self::Cell(path),
            Self::Supplementary(k, _) => Self::Supplementary(k.clone(), path),
            Self::Decoration(k, _) => Self::Decoration(k.clone(), path),
        }
    }
}

/// Source of section and item counts.
///
/// Implemented for slices and vectors of per-section item counts.
pub trait DataSource {
    /// Number of sections.
    fn number_of_sections(&self) -> usize;

    /// Number of items in `section`.
    fn number_of_items(&self, section: usize) -> usize;
}

impl DataSource for [usize] {
    fn number_of_sections(&self) -> usize {
        self.len()
    }

    fn number_of_items(&self, section: usize) -> usize {
        self.get(section).copied().unwrap_or(0)
    }
}

impl DataSource for Vec<usize> {
    fn number_of_sections(&self) -> usize {
        self.len()
    }

    fn number_of_items(&self, section: usize) -> usize {
        self.as_slice().number_of_items(section)
    }
}

impl<const N: usize> DataSource for [usize; N] {
    fn number_of_sections(&self) -> usize {
        N
    }

    fn number_of_items(&self, section: usize) -> usize {
        self.as_slice().number_of_items(section)
    }
}

/// Snapshot of data-source counts taken at prepare time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionCounts {
    items: Vec<usize>,
}

impl SectionCounts {
    /// Query every section of `source`.
    pub fn from_source<D: DataSource + ?Sized>(source: &D) -> Self {
        let items = (0..source.number_of_sections())
            .map(|s| source.number_of_items(s))
            .collect();
        Self { items }
    }

    /// Number of sections.
    #[must_use]
    pub fn sections(&self) -> usize {
        self.items.len()
    }

    /// Number of items in `section`, zero past the end.
    #[must_use]
    pub fn items_in(&self, section: usize) -> usize {
        self.items.get(section).copied().unwrap_or(0)
    }

    /// Total number of items across sections.
    #[must_use]
    pub fn total(&self) -> usize {
        self.items.iter().sum()
    }

    /// Whether `path` names an existing item.
    #[must_use]
    pub fn contains(&self, path: IndexPath) -> bool {
        path.item < self.items_in(path.section)
    }

    /// Whether `key` is in range: cells need an existing item, other elements an existing section.
    #[must_use]
    pub fn contains_key(&self, key: &ElementKey) -> bool {
        match key {
            ElementKey::Cell(p) => self.contains(*p),
            ElementKey::Supplementary(_, p) | ElementKey::Decoration(_, p) => {
                p.section < self.sections()
            }
        }
    }

    /// Every item index path in order.
    pub fn index_paths(&self) -> impl Iterator<Item = IndexPath> + '_ {
        self.items
            .iter()
            .enumerate()
            .flat_map(|(s, &n)| (0..n).map(move |i| IndexPath::new(s, i)))
    }
}

impl DataSource for SectionCounts {
    fn number_of_sections(&self) -> usize {
        self.sections()
    }

    fn number_of_items(&self, section: usize) -> usize {
        self.items_in(section)
    }
}
