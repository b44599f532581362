// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Item storage: generational slots, hierarchy links and per-item solver variables.

use alloc::vec::Vec;

use kurbo::Rect;
use smallvec::SmallVec;

use crate::constraint::ConstraintId;
use crate::expr::{ItemVariables, Variable};
use crate::types::{ItemId, PerAxis, Priority};

/// Per-item sizing hints.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemProps {
    /// Natural content size per axis, `None` when the item has no intrinsic metric on that axis.
    pub intrinsic_size: PerAxis<Option<f64>>,
    /// Priority of "do not grow beyond the intrinsic size".
    pub content_hugging: PerAxis<Priority>,
    /// Priority of "do not shrink below the intrinsic size".
    pub compression_resistance: PerAxis<Priority>,
    /// Distance of the text baseline below the top edge; `None` puts it on the bottom edge.
    pub baseline_offset: Option<f64>,
}

impl Default for ItemProps {
    fn default() -> Self {
        Self {
            intrinsic_size: PerAxis::splat(None),
            content_hugging: PerAxis::splat(Priority::DEFAULT_LOW),
            compression_resistance: PerAxis::splat(Priority::DEFAULT_HIGH),
            baseline_offset: None,
        }
    }
}

impl ItemProps {
    /// Props with an intrinsic size on both axes.
    pub fn with_intrinsic_size(width: f64, height: f64) -> Self {
        Self {
            intrinsic_size: PerAxis {
                horizontal: Some(width),
                vertical: Some(height),
            },
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ItemSlot {
    pub(crate) generation: u32,
    pub(crate) parent: Option<ItemId>,
    pub(crate) children: Vec<ItemId>,
    pub(crate) props: ItemProps,
    pub(crate) variables: ItemVariables,
    /// Frame as of the last solve.
    pub(crate) frame: Rect,
    /// Every attached constraint that mentions this item, implicit ones included.
    pub(crate) constraints: SmallVec<[ConstraintId; 8]>,
    /// Implicit intrinsic-size constraints owned by this item.
    pub(crate) intrinsic: SmallVec<[ConstraintId; 4]>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ItemTable {
    slots: Vec<Option<ItemSlot>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    next_variable: u32,
}

impl ItemTable {
    pub(crate) fn insert(&mut self, parent: Option<ItemId>, props: ItemProps) -> ItemId {
        let variables = self.fresh_variables();
        let make = |generation| ItemSlot {
            generation,
            parent: None,
            children: Vec::new(),
            props,
            variables,
            frame: Rect::ZERO,
            constraints: SmallVec::new(),
            intrinsic: SmallVec::new(),
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = Some(make(generation));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.slots.push(Some(make(generation)));
            self.generations.push(generation);
            (self.slots.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "ItemId uses 32-bit indices by design."
        )]
        let id = ItemId::new(idx as u32, generation);
        if let Some(p) = parent.filter(|p| self.is_alive(*p)) {
            if let Some(slot) = self.get_mut(id) {
                slot.parent = Some(p);
            }
            if let Some(parent_slot) = self.get_mut(p) {
                parent_slot.children.push(id);
            }
        }
        id
    }

    /// Free one slot. Hierarchy links of other items are left to the caller.
    pub(crate) fn free(&mut self, id: ItemId) -> Option<ItemSlot> {
        if !self.is_alive(id) {
            return None;
        }
        let slot = self.slots[id.idx()].take();
        self.free_list.push(id.idx());
        slot
    }

    pub(crate) fn is_alive(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn get(&self, id: ItemId) -> Option<&ItemSlot> {
        self.slots
            .get(id.idx())
            .and_then(|s| s.as_ref())
            .filter(|s| s.generation == id.1)
    }

    pub(crate) fn get_mut(&mut self, id: ItemId) -> Option<&mut ItemSlot> {
        self.slots
            .get_mut(id.idx())
            .and_then(|s| s.as_mut())
            .filter(|s| s.generation == id.1)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ItemId, &mut ItemSlot)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            slot.as_mut().map(|s| {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "ItemId uses 32-bit indices by design."
                )]
                let id = ItemId::new(idx as u32, s.generation);
                (id, s)
            })
        })
    }

    /// `id` followed by all of its descendants, depth first.
    pub(crate) fn subtree(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = alloc::vec![id];
        while let Some(next) = stack.pop() {
            if let Some(slot) = self.get(next) {
                out.push(next);
                stack.extend(slot.children.iter().rev().copied());
            }
        }
        out
    }

    fn fresh_variables(&mut self) -> ItemVariables {
        let base = self.next_variable;
        self.next_variable = self.next_variable.wrapping_add(4);
        ItemVariables {
            x: Variable(base),
            y: Variable(base.wrapping_add(1)),
            width: Variable(base.wrapping_add(2)),
            height: Variable(base.wrapping_add(3)),
        }
    }
}
