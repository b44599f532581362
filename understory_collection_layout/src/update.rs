// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batch updates and their resolution into an index-path mapping.

use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};

use crate::error::CollectionError;
use crate::types::{ElementKey, IndexPath, SectionCounts};

/// Kind of mutation in a batch update.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UpdateAction {
    /// An element appears at `after`.
    Insert,
    /// The element at `before` goes away.
    Delete,
    /// The element at `before` is replaced by fresh content at the same logical position.
    Reload,
    /// The element at `before` ends up at `after`.
    Move,
    /// No change; ignored.
    None,
}

/// What an [`UpdateItem`] addresses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum UpdateScope {
    /// One item.
    #[default]
    Item,
    /// A whole section, with its items and its supplementary and decoration
    /// views. Only the `section` of the paths is read.
    Section,
}

/// One mutation in a batch update.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UpdateItem {
    /// What happens.
    pub action: UpdateAction,
    /// Whether an item or a section is affected.
    pub scope: UpdateScope,
    /// Pre-update path; absent for inserts.
    pub before: Option<IndexPath>,
    /// Post-update path; absent for deletes.
    pub after: Option<IndexPath>,
}

impl UpdateItem {
    const fn new(
        action: UpdateAction,
        scope: UpdateScope,
        before: Option<IndexPath>,
        after: Option<IndexPath>,
    ) -> Self {
        Self {
            action,
            scope,
            before,
            after,
        }
    }

    const fn section_path(section: usize) -> Option<IndexPath> {
        Some(IndexPath::new(section, 0))
    }

    /// Insert at post-update `path`.
    #[must_use]
    pub const fn insert(path: IndexPath) -> Self {
        Self::new(UpdateAction::Insert, UpdateScope::Item, None, Some(path))
    }

    /// Delete pre-update `path`.
    #[must_use]
    pub const fn delete(path: IndexPath) -> Self {
        Self::new(UpdateAction::Delete, UpdateScope::Item, Some(path), None)
    }

    /// Reload pre-update `path`.
    #[must_use]
    pub const fn reload(path: IndexPath) -> Self {
        Self::new(UpdateAction::Reload, UpdateScope::Item, Some(path), None)
    }

    /// Move pre-update `from` to post-update `to`.
    #[must_use]
    pub const fn move_item(from: IndexPath, to: IndexPath) -> Self {
        Self::new(UpdateAction::Move, UpdateScope::Item, Some(from), Some(to))
    }

    /// Insert a whole section at post-update index `section`.
    #[must_use]
    pub const fn insert_section(section: usize) -> Self {
        Self::new(
            UpdateAction::Insert,
            UpdateScope::Section,
            None,
            Self::section_path(section),
        )
    }

    /// Delete pre-update section `section` and everything in it.
    #[must_use]
    pub const fn delete_section(section: usize) -> Self {
        Self::new(
            UpdateAction::Delete,
            UpdateScope::Section,
            Self::section_path(section),
            None,
        )
    }

    /// Reload pre-update section `section`: every element in it is replaced.
    #[must_use]
    pub const fn reload_section(section: usize) -> Self {
        Self::new(
            UpdateAction::Reload,
            UpdateScope::Section,
            Self::section_path(section),
            None,
        )
    }

    /// Move pre-update section `from`, items included, to post-update index `to`.
    #[must_use]
    pub const fn move_section(from: usize, to: usize) -> Self {
        Self::new(
            UpdateAction::Move,
            UpdateScope::Section,
            Self::section_path(from),
            Self::section_path(to),
        )
    }
}

/// Validated operations of one scope, before they are mapped.
#[derive(Debug)]
struct Ops<T> {
    deletes: HashSet<T>,
    inserts: HashSet<T>,
    moves: Vec<(T, T)>,
    reloads: Vec<T>,
}

impl<T: Copy + Eq + core::hash::Hash> Ops<T> {
    /// Sort `items` into deletes, inserts, moves and reloads.
    ///
    /// `old_ok` and `new_ok` reject targets outside the pre- and post-update
    /// ranges. Moves count as both a delete and an insert.
    fn collect<'a>(
        items: impl IntoIterator<Item = &'a UpdateItem>,
        target: impl Fn(IndexPath) -> T,
        old_ok: impl Fn(T) -> Result<(), CollectionError>,
        new_ok: impl Fn(T) -> Result<(), CollectionError>,
    ) -> Result<Self, CollectionError> {
        let mut ops = Self {
            deletes: HashSet::new(),
            inserts: HashSet::new(),
            moves: Vec::new(),
            reloads: Vec::new(),
        };
        for item in items {
            let before = item.before.map(&target);
            let after = item.after.map(&target);
            match (item.action, before, after) {
                (UpdateAction::None, ..) => {}
                (UpdateAction::Insert, None, Some(after)) => ops.insert(after, &new_ok, item)?,
                (UpdateAction::Delete, Some(before), None) => ops.delete(before, &old_ok, item)?,
                (UpdateAction::Reload, Some(before), _) => {
                    old_ok(before)?;
                    ops.reloads.push(before);
                }
                (UpdateAction::Move, Some(before), Some(after)) => {
                    ops.delete(before, &old_ok, item)?;
                    ops.insert(after, &new_ok, item)?;
                    ops.moves.push((before, after));
                }
                _ => {
                    return Err(CollectionError::InvalidUpdate {
                        reason: "update item is missing a path",
                        path: item.before.or(item.after),
                    });
                }
            }
        }
        Ok(ops)
    }

    fn delete(
        &mut self,
        t: T,
        ok: impl Fn(T) -> Result<(), CollectionError>,
        item: &UpdateItem,
    ) -> Result<(), CollectionError> {
        ok(t)?;
        if !self.deletes.insert(t) {
            return Err(CollectionError::InvalidUpdate {
                reason: "pre-update path used twice",
                path: item.before,
            });
        }
        Ok(())
    }

    fn insert(
        &mut self,
        t: T,
        ok: impl Fn(T) -> Result<(), CollectionError>,
        item: &UpdateItem,
    ) -> Result<(), CollectionError> {
        ok(t)?;
        if !self.inserts.insert(t) {
            return Err(CollectionError::InvalidUpdate {
                reason: "post-update path used twice",
                path: item.after,
            });
        }
        Ok(())
    }

    /// Moved sources are still in `deletes` when this runs.
    fn reloaded_and_removed(&self) -> Option<T> {
        self.reloads.iter().copied().find(|t| self.deletes.contains(t))
    }
}

/// A resolved batch update.
///
/// Deletes are resolved against pre-update paths and inserts against
/// post-update paths, so the order of items within the batch does not
/// matter. Sections are resolved first: surviving sections keep their
/// relative order and fill the post-update section slots that are not
/// inserted. Within each surviving section, surviving items keep their
/// relative order and fill the post-update slots that are not inserted.
/// Every item of a deleted or reloaded section disappears, and every item
/// of an inserted or reloaded section appears.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateMap {
    forward: HashMap<IndexPath, IndexPath>,
    backward: HashMap<IndexPath, IndexPath>,
    deleted: Vec<IndexPath>,
    inserted: Vec<IndexPath>,
    reloaded: Vec<IndexPath>,
    section_forward: Vec<Option<usize>>,
    section_backward: Vec<Option<usize>>,
    deleted_sections: Vec<usize>,
    inserted_sections: Vec<usize>,
    reloaded_sections: Vec<usize>,
}

impl UpdateMap {
    /// Resolve `items` between two count snapshots.
    pub fn resolve(
        old: &SectionCounts,
        new: &SectionCounts,
        items: &[UpdateItem],
    ) -> Result<Self, CollectionError> {
        let mut map = Self::default();
        map.resolve_sections(old, new, items)?;
        map.resolve_items(old, new, items)?;
        Ok(map)
    }

    fn resolve_sections(
        &mut self,
        old: &SectionCounts,
        new: &SectionCounts,
        items: &[UpdateItem],
    ) -> Result<(), CollectionError> {
        let range = |reason: &'static str, limit: usize| {
            move |s: usize| {
                if s < limit {
                    Ok(())
                } else {
                    Err(CollectionError::InvalidUpdate {
                        reason,
                        path: Some(IndexPath::new(s, 0)),
                    })
                }
            }
        };
        let mut ops = Ops::collect(
            items.iter().filter(|u| u.scope == UpdateScope::Section),
            |p| p.section,
            range("pre-update section out of range", old.sections()),
            range("post-update section out of range", new.sections()),
        )?;

        self.section_forward = alloc::vec![None; old.sections()];
        self.section_backward = alloc::vec![None; new.sections()];
        let survivors = (0..old.sections()).filter(|s| !ops.deletes.contains(s));
        let slots = (0..new.sections()).filter(|s| !ops.inserts.contains(s));
        let mut pairs = 0_usize;
        for (from, to) in survivors.zip(slots) {
            self.section_forward[from] = Some(to);
            self.section_backward[to] = Some(from);
            pairs += 1;
        }
        if old.sections() - ops.deletes.len() != pairs
            || new.sections() - ops.inserts.len() != pairs
        {
            return Err(CollectionError::InvalidUpdate {
                reason: "section counts do not match the batch",
                path: None,
            });
        }
        if let Some(section) = ops.reloaded_and_removed() {
            return Err(CollectionError::InvalidUpdate {
                reason: "reloaded section is also deleted or moved",
                path: Some(IndexPath::new(section, 0)),
            });
        }
        for &(from, to) in &ops.moves {
            self.section_forward[from] = Some(to);
            self.section_backward[to] = Some(from);
            ops.deletes.remove(&from);
            ops.inserts.remove(&to);
        }
        for &before in &ops.reloads {
            if let Some(after) = self.section_forward[before].take() {
                self.section_backward[after] = None;
                ops.deletes.insert(before);
                ops.inserts.insert(after);
                self.reloaded_sections.push(before);
            }
        }

        self.deleted_sections = ops.deletes.into_iter().collect();
        self.deleted_sections.sort_unstable();
        self.inserted_sections = ops.inserts.into_iter().collect();
        self.inserted_sections.sort_unstable();
        self.reloaded_sections.sort_unstable();
        Ok(())
    }

    fn resolve_items(
        &mut self,
        old: &SectionCounts,
        new: &SectionCounts,
        items: &[UpdateItem],
    ) -> Result<(), CollectionError> {
        let old_ok = |path: IndexPath| {
            if !old.contains(path) {
                return Err(CollectionError::InvalidUpdate {
                    reason: "pre-update path out of range",
                    path: Some(path),
                });
            }
            if self.map_section_forward(path.section).is_none() {
                return Err(CollectionError::InvalidUpdate {
                    reason: "item update inside a deleted or reloaded section",
                    path: Some(path),
                });
            }
            Ok(())
        };
        let new_ok = |path: IndexPath| {
            if !new.contains(path) {
                return Err(CollectionError::InvalidUpdate {
                    reason: "post-update path out of range",
                    path: Some(path),
                });
            }
            if self.map_section_backward(path.section).is_none() {
                return Err(CollectionError::InvalidUpdate {
                    reason: "item update inside an inserted or reloaded section",
                    path: Some(path),
                });
            }
            Ok(())
        };
        let mut ops = Ops::collect(
            items.iter().filter(|u| u.scope == UpdateScope::Item),
            |p| p,
            old_ok,
            new_ok,
        )?;

        let mut forward = HashMap::new();
        let mut backward = HashMap::new();
        for section in 0..old.sections() {
            let all_old = (0..old.items_in(section)).map(|i| IndexPath::new(section, i));
            let Some(target) = self.map_section_forward(section) else {
                ops.deletes.extend(all_old);
                continue;
            };
            let survivors = all_old.filter(|p| !ops.deletes.contains(p));
            let slots = (0..new.items_in(target))
                .map(|i| IndexPath::new(target, i))
                .filter(|p| !ops.inserts.contains(p));
            let mut pairs = 0_usize;
            for (from, to) in survivors.zip(slots) {
                forward.insert(from, to);
                backward.insert(to, from);
                pairs += 1;
            }
            let deleted_here = ops.deletes.iter().filter(|p| p.section == section).count();
            let inserted_here = ops.inserts.iter().filter(|p| p.section == target).count();
            if old.items_in(section) - deleted_here != pairs
                || new.items_in(target) - inserted_here != pairs
            {
                return Err(CollectionError::InvalidUpdate {
                    reason: "item counts do not match the batch",
                    path: Some(IndexPath::new(section, 0)),
                });
            }
        }
        for &section in &self.inserted_sections {
            ops.inserts
                .extend((0..new.items_in(section)).map(|i| IndexPath::new(section, i)));
        }
        if let Some(before) = ops.reloaded_and_removed() {
            return Err(CollectionError::InvalidUpdate {
                reason: "reloaded item is also deleted or moved",
                path: Some(before),
            });
        }
        for &(from, to) in &ops.moves {
            forward.insert(from, to);
            backward.insert(to, from);
            ops.deletes.remove(&from);
            ops.inserts.remove(&to);
        }
        for &before in &ops.reloads {
            if let Some(after) = forward.remove(&before) {
                backward.remove(&after);
                ops.deletes.insert(before);
                ops.inserts.insert(after);
                self.reloaded.push(before);
            }
        }

        self.forward = forward;
        self.backward = backward;
        self.deleted = ops.deletes.into_iter().collect();
        self.deleted.sort_unstable();
        self.inserted = ops.inserts.into_iter().collect();
        self.inserted.sort_unstable();
        self.reloaded.sort_unstable();
        Ok(())
    }

    /// Post-update path of the item at pre-update `path`; `None` if it was deleted.
    #[must_use]
    pub fn map_forward(&self, path: IndexPath) -> Option<IndexPath> {
        self.forward.get(&path).copied()
    }

    /// Pre-update path of the item at post-update `path`; `None` if it was inserted.
    #[must_use]
    pub fn map_backward(&self, path: IndexPath) -> Option<IndexPath> {
        self.backward.get(&path).copied()
    }

    /// Post-update index of pre-update section `section`; `None` if it was deleted or reloaded.
    #[must_use]
    pub fn map_section_forward(&self, section: usize) -> Option<usize> {
        self.section_forward.get(section).copied().flatten()
    }

    /// Pre-update index of post-update section `section`; `None` if it was inserted or reloaded.
    #[must_use]
    pub fn map_section_backward(&self, section: usize) -> Option<usize> {
        self.section_backward.get(section).copied().flatten()
    }

    /// Post-update identity of a pre-update element.
    ///
    /// Cells follow the item mapping. Supplementary and decoration views
    /// follow their section and keep their item index.
    #[must_use]
    pub fn map_key_forward(&self, key: &ElementKey) -> Option<ElementKey> {
        match key {
            ElementKey::Cell(path) => self.map_forward(*path).map(ElementKey::Cell),
            other => {
                let path = other.index_path();
                self.map_section_forward(path.section)
                    .map(|s| other.with_index_path(IndexPath::new(s, path.item)))
            }
        }
    }

    /// Pre-update identity of a post-update element.
    #[must_use]
    pub fn map_key_backward(&self, key: &ElementKey) -> Option<ElementKey> {
        match key {
            ElementKey::Cell(path) => self.map_backward(*path).map(ElementKey::Cell),
            other => {
                let path = other.index_path();
                self.map_section_backward(path.section)
                    .map(|s| other.with_index_path(IndexPath::new(s, path.item)))
            }
        }
    }

    /// Pre-update paths that disappear, reloaded items included, sorted.
    #[must_use]
    pub fn deleted(&self) -> &[IndexPath] {
        &self.deleted
    }

    /// Post-update paths that appear, reloaded items included, sorted.
    #[must_use]
    pub fn inserted(&self) -> &[IndexPath] {
        &self.inserted
    }

    /// Pre-update paths of reloaded items, sorted.
    #[must_use]
    pub fn reloaded(&self) -> &[IndexPath] {
        &self.reloaded
    }

    /// Pre-update sections that disappear, reloaded sections included, sorted.
    #[must_use]
    pub fn deleted_sections(&self) -> &[usize] {
        &self.deleted_sections
    }

    /// Post-update sections that appear, reloaded sections included, sorted.
    #[must_use]
    pub fn inserted_sections(&self) -> &[usize] {
        &self.inserted_sections
    }

    /// Pre-update indices of reloaded sections, sorted.
    #[must_use]
    pub fn reloaded_sections(&self) -> &[usize] {
        &self.reloaded_sections
    }

    /// Whether pre-update `path` disappears.
    #[must_use]
    pub fn is_deleted(&self, path: IndexPath) -> bool {
        self.deleted.binary_search(&path).is_ok()
    }

    /// Whether post-update `path` appears.
    #[must_use]
    pub fn is_inserted(&self, path: IndexPath) -> bool {
        self.inserted.binary_search(&path).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn p(section: usize, item: usize) -> IndexPath {
        IndexPath::new(section, item)
    }

    fn counts(items: &[usize]) -> SectionCounts {
        SectionCounts::from_source(items)
    }

    #[test]
    fn delete_then_insert_at_same_index() {
        let old = counts(&[5]);
        let new = counts(&[5]);
        let delete = UpdateItem::delete(p(0, 2));
        let insert = UpdateItem::insert(p(0, 2));
        let a = UpdateMap::resolve(&old, &new, &[delete, insert]).unwrap();
        let b = UpdateMap::resolve(&old, &new, &[insert, delete]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.deleted(), [p(0, 2)]);
        assert_eq!(a.inserted(), [p(0, 2)]);
        assert_eq!(a.map_forward(p(0, 2)), None);
        assert_eq!(a.map_forward(p(0, 3)), Some(p(0, 3)));
        assert_eq!(a.map_backward(p(0, 2)), None);
    }

    #[test]
    fn deletes_use_old_paths_and_inserts_new_paths() {
        // Old: A B C D. Delete B and C, insert X at 0 → X A D.
        let map = UpdateMap::resolve(
            &counts(&[4]),
            &counts(&[3]),
            &[
                UpdateItem::insert(p(0, 0)),
                UpdateItem::delete(p(0, 1)),
                UpdateItem::delete(p(0, 2)),
            ],
        )
        .unwrap();
        assert_eq!(map.map_forward(p(0, 0)), Some(p(0, 1)));
        assert_eq!(map.map_forward(p(0, 3)), Some(p(0, 2)));
        assert!(map.is_deleted(p(0, 1)));
        assert!(map.is_inserted(p(0, 0)));
        assert_eq!(map.map_backward(p(0, 2)), Some(p(0, 3)));
    }

    #[test]
    fn moves_cross_sections() {
        let map = UpdateMap::resolve(
            &counts(&[2, 1]),
            &counts(&[1, 2]),
            &[UpdateItem::move_item(p(0, 0), p(1, 1))],
        )
        .unwrap();
        assert_eq!(map.map_forward(p(0, 0)), Some(p(1, 1)));
        assert_eq!(map.map_forward(p(0, 1)), Some(p(0, 0)));
        assert_eq!(map.map_forward(p(1, 0)), Some(p(1, 0)));
        assert!(map.deleted().is_empty());
        assert!(map.inserted().is_empty());
    }

    #[test]
    fn reload_replaces_in_place() {
        let map = UpdateMap::resolve(
            &counts(&[3]),
            &counts(&[2]),
            &[UpdateItem::delete(p(0, 0)), UpdateItem::reload(p(0, 2))],
        )
        .unwrap();
        assert_eq!(map.reloaded(), [p(0, 2)]);
        assert_eq!(map.deleted(), [p(0, 0), p(0, 2)]);
        assert_eq!(map.inserted(), [p(0, 1)]);
        assert_eq!(map.map_forward(p(0, 1)), Some(p(0, 0)));
    }

    #[test]
    fn inconsistent_batches_are_rejected() {
        let err = UpdateMap::resolve(&counts(&[3]), &counts(&[3]), &[UpdateItem::delete(p(0, 0))])
            .unwrap_err();
        assert!(matches!(err, CollectionError::InvalidUpdate { .. }));

        let err = UpdateMap::resolve(&counts(&[3]), &counts(&[2]), &[UpdateItem::delete(p(0, 7))])
            .unwrap_err();
        assert_eq!(
            err,
            CollectionError::InvalidUpdate {
                reason: "pre-update path out of range",
                path: Some(p(0, 7)),
            }
        );

        let twice = vec![UpdateItem::delete(p(0, 1)), UpdateItem::delete(p(0, 1))];
        assert!(UpdateMap::resolve(&counts(&[3]), &counts(&[1]), &twice).is_err());

        assert!(UpdateMap::resolve(&counts(&[3]), &counts(&[3, 0]), &[]).is_err());

        let missing = UpdateItem {
            action: UpdateAction::Insert,
            scope: UpdateScope::Item,
            before: None,
            after: None,
        };
        assert!(UpdateMap::resolve(&counts(&[1]), &counts(&[1]), &[missing]).is_err());

        let moved_and_reloaded = [
            UpdateItem::move_item(p(0, 0), p(0, 2)),
            UpdateItem::reload(p(0, 0)),
        ];
        let err = UpdateMap::resolve(&counts(&[3]), &counts(&[3]), &moved_and_reloaded)
            .unwrap_err();
        assert_eq!(
            err,
            CollectionError::InvalidUpdate {
                reason: "reloaded item is also deleted or moved",
                path: Some(p(0, 0)),
            }
        );
    }

    #[test]
    fn section_deletes_and_inserts_shift_surviving_sections() {
        // Old: A(2) B(3) C(1). Delete A, insert X(4) at 1 → B X C.
        let old = counts(&[2, 3, 1]);
        let new = counts(&[3, 4, 1]);
        let batch = [
            UpdateItem::delete_section(0),
            UpdateItem::insert_section(1),
            UpdateItem::delete(p(1, 0)),
            UpdateItem::insert(p(0, 2)),
        ];
        let map = UpdateMap::resolve(&old, &new, &batch).unwrap();
        let mut reversed = batch;
        reversed.reverse();
        assert_eq!(map, UpdateMap::resolve(&old, &new, &reversed).unwrap());
        let rotated = [batch[2], batch[0], batch[3], batch[1]];
        assert_eq!(map, UpdateMap::resolve(&old, &new, &rotated).unwrap());

        assert_eq!(map.map_section_forward(0), None);
        assert_eq!(map.map_section_forward(1), Some(0));
        assert_eq!(map.map_section_forward(2), Some(2));
        assert_eq!(map.map_section_backward(1), None);
        assert_eq!(map.deleted_sections(), [0]);
        assert_eq!(map.inserted_sections(), [1]);

        assert_eq!(map.map_forward(p(1, 1)), Some(p(0, 0)));
        assert_eq!(map.map_forward(p(1, 2)), Some(p(0, 1)));
        assert_eq!(map.map_forward(p(2, 0)), Some(p(2, 0)));
        assert_eq!(map.deleted(), [p(0, 0), p(0, 1), p(1, 0)]);
        assert_eq!(map.inserted(), [p(0, 2), p(1, 0), p(1, 1), p(1, 2), p(1, 3)]);
    }

    #[test]
    fn moved_section_carries_its_items_and_views() {
        // Old: A(1) B(2) C(3). Move A to the end and insert into it → B C A'.
        let map = UpdateMap::resolve(
            &counts(&[1, 2, 3]),
            &counts(&[2, 3, 2]),
            &[UpdateItem::insert(p(2, 1)), UpdateItem::move_section(0, 2)],
        )
        .unwrap();
        assert_eq!(map.map_section_forward(0), Some(2));
        assert_eq!(map.map_section_forward(1), Some(0));
        assert_eq!(map.map_section_forward(2), Some(1));
        assert!(map.deleted_sections().is_empty());
        assert!(map.inserted_sections().is_empty());
        assert_eq!(map.map_forward(p(0, 0)), Some(p(2, 0)));
        assert_eq!(map.map_forward(p(2, 2)), Some(p(1, 2)));
        assert_eq!(map.inserted(), [p(2, 1)]);

        assert_eq!(
            map.map_key_forward(&ElementKey::header(0)),
            Some(ElementKey::header(2))
        );
        assert_eq!(
            map.map_key_backward(&ElementKey::background(0)),
            Some(ElementKey::background(1))
        );
        assert_eq!(
            map.map_key_forward(&ElementKey::cell(1, 1)),
            Some(ElementKey::cell(0, 1))
        );
    }

    #[test]
    fn reloaded_section_replaces_every_element() {
        let map = UpdateMap::resolve(
            &counts(&[2, 2]),
            &counts(&[2, 3]),
            &[UpdateItem::reload_section(1)],
        )
        .unwrap();
        assert_eq!(map.reloaded_sections(), [1]);
        assert_eq!(map.deleted_sections(), [1]);
        assert_eq!(map.inserted_sections(), [1]);
        assert_eq!(map.map_section_forward(1), None);
        assert_eq!(map.map_key_forward(&ElementKey::footer(1)), None);
        assert_eq!(map.map_forward(p(0, 1)), Some(p(0, 1)));
        assert_eq!(map.deleted(), [p(1, 0), p(1, 1)]);
        assert_eq!(map.inserted(), [p(1, 0), p(1, 1), p(1, 2)]);
    }

    #[test]
    fn inconsistent_section_batches_are_rejected() {
        let reject = |old: &[usize], new: &[usize], batch: &[UpdateItem]| {
            match UpdateMap::resolve(&counts(old), &counts(new), batch) {
                Err(CollectionError::InvalidUpdate { reason, .. }) => reason,
                other => panic!("expected an invalid update, got {other:?}"),
            }
        };
        assert_eq!(
            reject(&[1, 1], &[1], &[]),
            "section counts do not match the batch"
        );
        assert_eq!(
            reject(&[1], &[1], &[UpdateItem::delete_section(3)]),
            "pre-update section out of range"
        );
        assert_eq!(
            reject(&[2, 1], &[1], &[UpdateItem::delete_section(0), UpdateItem::delete(p(0, 1))]),
            "item update inside a deleted or reloaded section"
        );
        assert_eq!(
            reject(&[1], &[1, 2], &[UpdateItem::insert_section(1), UpdateItem::insert(p(1, 0))]),
            "item update inside an inserted or reloaded section"
        );
        assert_eq!(
            reject(
                &[1, 1],
                &[1, 1],
                &[UpdateItem::move_section(0, 1), UpdateItem::reload_section(0)]
            ),
            "reloaded section is also deleted or moved"
        );
        assert_eq!(
            reject(&[1, 1], &[1], &[UpdateItem::delete_section(0), UpdateItem::delete_section(0)]),
            "pre-update path used twice"
        );
    }
}
