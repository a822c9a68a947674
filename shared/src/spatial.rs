//! Per-cell intrusive doubly linked lists over a slot array.
//!
//! Every grid cell has a head slot; the entities themselves carry the
//! `prev`/`next` links, so moving an entity between cells is O(1) no matter
//! how crowded either cell is. Links are slot indices, never references.

use crate::GRID_SIZE;

/// The link fields an indexed entity carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellLink {
    pub ix: i32,
    pub iz: i32,
    pub linked: bool,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// Anything that can live in a [`SpatialIndex`] cell list.
pub trait Linked {
    fn link(&self) -> &CellLink;
    fn link_mut(&mut self) -> &mut CellLink;
}

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    heads: Vec<Option<usize>>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn slot(ix: i32, iz: i32) -> Option<usize> {
    if ix >= 0 && iz >= 0 && (ix as usize) < GRID_SIZE && (iz as usize) < GRID_SIZE {
        Some(iz as usize * GRID_SIZE + ix as usize)
    } else {
        None
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            heads: vec![None; GRID_SIZE * GRID_SIZE],
        }
    }

    /// First entity in a cell's list, if any.
    #[inline]
    pub fn head(&self, ix: i32, iz: i32) -> Option<usize> {
        slot(ix, iz).and_then(|s| self.heads[s])
    }

    /// Links `id` as the new head of cell `(ix, iz)`. An entity that is
    /// already linked elsewhere is moved. Cells outside the grid are
    /// clamped to the border.
    pub fn insert<T: Linked>(&mut self, items: &mut [T], id: usize, ix: i32, iz: i32) {
        if items[id].link().linked {
            self.remove(items, id);
        }
        let max = GRID_SIZE as i32 - 1;
        let (ix, iz) = (ix.clamp(0, max), iz.clamp(0, max));
        let cell = iz as usize * GRID_SIZE + ix as usize;

        let old_head = self.heads[cell];
        if let Some(head) = old_head {
            items[head].link_mut().prev = Some(id);
        }
        *items[id].link_mut() = CellLink {
            ix,
            iz,
            linked: true,
            prev: None,
            next: old_head,
        };
        self.heads[cell] = Some(id);
    }

    /// Unlinks `id` from whichever cell it is in. Returns false if it was
    /// not linked.
    pub fn remove<T: Linked>(&mut self, items: &mut [T], id: usize) -> bool {
        let link = *items[id].link();
        if !link.linked {
            return false;
        }

        if let Some(next) = link.next {
            items[next].link_mut().prev = link.prev;
        }
        match link.prev {
            Some(prev) => items[prev].link_mut().next = link.next,
            None => {
                if let Some(cell) = slot(link.ix, link.iz) {
                    self.heads[cell] = link.next;
                }
            }
        }

        let own = items[id].link_mut();
        own.linked = false;
        own.prev = None;
        own.next = None;
        true
    }

    /// Moves `id` to cell `(ix, iz)` if it is not already there. Returns
    /// true when the entity changed lists.
    pub fn rebucket<T: Linked>(&mut self, items: &mut [T], id: usize, ix: i32, iz: i32) -> bool {
        let link = items[id].link();
        if link.linked && link.ix == ix && link.iz == iz {
            return false;
        }
        self.insert(items, id, ix, iz);
        true
    }

    /// Walks one cell's list.
    pub fn iter<'a, T: Linked>(&self, items: &'a [T], ix: i32, iz: i32) -> CellIter<'a, T> {
        CellIter {
            items,
            cursor: self.head(ix, iz),
        }
    }

    pub fn clear<T: Linked>(&mut self, items: &mut [T]) {
        self.heads.iter_mut().for_each(|h| *h = None);
        for item in items.iter_mut() {
            *item.link_mut() = CellLink::default();
        }
    }

    /// Checks that every list is a well-formed doubly linked list whose
    /// members all record that cell, and that every linked entity is
    /// reachable from exactly one list.
    pub fn is_consistent<T: Linked>(&self, items: &[T]) -> bool {
        let mut seen = vec![false; items.len()];

        for iz in 0..GRID_SIZE as i32 {
            for ix in 0..GRID_SIZE as i32 {
                let mut prev = None;
                let mut cursor = self.head(ix, iz);
                while let Some(id) = cursor {
                    if id >= items.len() || seen[id] {
                        return false;
                    }
                    seen[id] = true;
                    let link = items[id].link();
                    if !link.linked || link.ix != ix || link.iz != iz || link.prev != prev {
                        return false;
                    }
                    prev = Some(id);
                    cursor = link.next;
                }
            }
        }

        items
            .iter()
            .zip(seen)
            .all(|(item, reached)| item.link().linked == reached)
    }
}

pub struct CellIter<'a, T> {
    items: &'a [T],
    cursor: Option<usize>,
}

impl<'a, T: Linked> Iterator for CellIter<'a, T> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let id = self.cursor?;
        self.cursor = self.items[id].link().next;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    #[derive(Debug, Default, Clone)]
    struct Dummy {
        link: CellLink,
    }

    impl Linked for Dummy {
        fn link(&self) -> &CellLink {
            &self.link
        }
        fn link_mut(&mut self) -> &mut CellLink {
            &mut self.link
        }
    }

    fn members(index: &SpatialIndex, items: &[Dummy], ix: i32, iz: i32) -> Vec<usize> {
        index.iter(items, ix, iz).collect()
    }

    #[test]
    fn test_insert_becomes_head() {
        let mut items = vec![Dummy::default(); 3];
        let mut index = SpatialIndex::new();

        index.insert(&mut items, 0, 4, 4);
        index.insert(&mut items, 1, 4, 4);
        index.insert(&mut items, 2, 4, 4);

        assert_eq!(members(&index, &items, 4, 4), vec![2, 1, 0]);
        assert_eq!(items[1].link.prev, Some(2));
        assert_eq!(items[1].link.next, Some(0));
        assert!(index.is_consistent(&items));
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let mut items = vec![Dummy::default(); 4];
        let mut index = SpatialIndex::new();
        for id in 0..4 {
            index.insert(&mut items, id, 2, 7);
        }

        assert!(index.remove(&mut items, 3)); // head
        assert!(index.remove(&mut items, 1)); // middle
        assert!(index.remove(&mut items, 0)); // tail
        assert!(!index.remove(&mut items, 0));

        assert_eq!(members(&index, &items, 2, 7), vec![2]);
        assert_eq!(items[2].link.prev, None);
        assert_eq!(items[2].link.next, None);
        assert!(index.is_consistent(&items));
    }

    #[test]
    fn test_rebucket_moves_only_on_change() {
        let mut items = vec![Dummy::default(); 2];
        let mut index = SpatialIndex::new();
        index.insert(&mut items, 0, 1, 1);
        index.insert(&mut items, 1, 1, 1);

        assert!(!index.rebucket(&mut items, 0, 1, 1));
        assert!(index.rebucket(&mut items, 0, 2, 1));

        assert_eq!(members(&index, &items, 1, 1), vec![1]);
        assert_eq!(members(&index, &items, 2, 1), vec![0]);
        assert!(index.is_consistent(&items));
    }

    #[test]
    fn test_random_operations_stay_consistent() {
        const COUNT: usize = 64;
        let mut rng = StdRng::seed_from_u64(7);
        let mut items = vec![Dummy::default(); COUNT];
        let mut index = SpatialIndex::new();

        for _ in 0..5000 {
            let id = rng.gen_range(0..COUNT);
            let ix = rng.gen_range(0..4);
            let iz = rng.gen_range(0..4);
            match rng.gen_range(0..3) {
                0 => index.insert(&mut items, id, ix, iz),
                1 => {
                    index.remove(&mut items, id);
                }
                _ => {
                    index.rebucket(&mut items, id, ix, iz);
                }
            }
        }

        assert!(index.is_consistent(&items));

        for iz in 0..4 {
            for ix in 0..4 {
                let listed: HashSet<usize> = members(&index, &items, ix, iz).into_iter().collect();
                let recorded: HashSet<usize> = (0..COUNT)
                    .filter(|&id| {
                        let l = items[id].link;
                        l.linked && l.ix == ix && l.iz == iz
                    })
                    .collect();
                assert_eq!(listed, recorded);
            }
        }
    }

    #[test]
    fn test_clear_unlinks_everything() {
        let mut items = vec![Dummy::default(); 3];
        let mut index = SpatialIndex::new();
        for id in 0..3 {
            index.insert(&mut items, id, id as i32, 0);
        }

        index.clear(&mut items);

        assert!(items.iter().all(|d| !d.link.linked));
        assert_eq!(index.head(0, 0), None);
        assert!(index.is_consistent(&items));
    }
}
