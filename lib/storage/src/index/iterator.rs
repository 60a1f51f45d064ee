use crate::index::mask::LevelMask;
use crate::index::IndexOrder;
use crate::manager::{BlockId, StorageManager};
use crate::structures::map::{MapCursor, SortedMap};
use hexastore_model::{Triple, TriplePosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IteratorState {
    Unprimed,
    Positioned,
    Exhausted,
}

/// Iterates over the triples of one index that match a set of masks.
///
/// The iterator walks the head, vector, and terminal of the index like an odometer. Each level
/// keeps a cursor into its map. Bound levels seek to their key. Free levels step through all
/// keys. A level whose mask refers to an outer level seeks to the key that the outer level
/// currently holds, so the constraint is re-applied every time the outer level moves.
///
/// Triples are returned in SPO order but sorted by the index order (see
/// [Self::is_sorted_by_position]).
pub struct TripleIndexIterator<'index> {
    storage: &'index StorageManager,
    order: IndexOrder,
    masks: [LevelMask; 3],
    head: SortedMap,
    cursors: [MapCursor; 3],
    /// The key of each level that the cursors are positioned on.
    keys: [i64; 3],
    /// The value stored with each key, which is the id of the child map for the outer levels.
    values: [u64; 3],
    state: IteratorState,
}

impl<'index> TripleIndexIterator<'index> {
    pub(crate) fn new(
        storage: &'index StorageManager,
        order: IndexOrder,
        head: SortedMap,
        masks: [LevelMask; 3],
    ) -> Self {
        Self {
            storage,
            order,
            masks,
            head,
            cursors: [MapCursor::End; 3],
            keys: [0; 3],
            values: [0; 3],
            state: IteratorState::Unprimed,
        }
    }

    /// The order of the index that is iterated.
    pub fn order(&self) -> IndexOrder {
        self.order
    }

    /// Returns whether consecutive triples are non-decreasing at `position`.
    ///
    /// The first level is always sorted. An inner level is sorted if all levels outside of it are
    /// fixed to a single key. A level that must equal an outer level is sorted like that level.
    pub fn is_sorted_by_position(&self, position: TriplePosition) -> bool {
        self.is_sorted_level(self.order.level_of(position))
    }

    fn is_sorted_level(&self, level: usize) -> bool {
        match self.masks[level] {
            LevelMask::Bound(_) => true,
            LevelMask::SameAs(outer) => self.is_sorted_level(outer),
            LevelMask::Free => (0..level).all(|outer| self.is_fixed_level(outer)),
        }
    }

    fn is_fixed_level(&self, level: usize) -> bool {
        match self.masks[level] {
            LevelMask::Bound(_) => true,
            LevelMask::SameAs(outer) => self.is_fixed_level(outer),
            LevelMask::Free => false,
        }
    }

    /// The triple the iterator is positioned on.
    pub fn current(&self) -> Option<Triple> {
        (self.state == IteratorState::Positioned).then(|| self.order.unpermute(self.keys))
    }

    /// The map that holds the keys of `level` for the current keys of the outer levels.
    fn map_of(&self, level: usize) -> SortedMap {
        if level == 0 {
            return self.head;
        }
        let id = BlockId::from_raw(self.values[level - 1])
            .unwrap_or_else(|| panic!("The {} index holds a null child.", self.order));
        SortedMap::from_id(id)
    }

    /// The key `level` must have, if it is restricted to one.
    fn required_key(&self, level: usize) -> Option<i64> {
        match self.masks[level] {
            LevelMask::Bound(key) => Some(key),
            LevelMask::SameAs(outer) => Some(self.keys[outer]),
            LevelMask::Free => None,
        }
    }

    /// Positions `level` on its first matching key.
    fn enter_level(&mut self, level: usize) -> bool {
        let map = self.map_of(level);
        self.cursors[level] = match self.required_key(level) {
            Some(key) => map.seek(self.storage, key),
            None => map.first(self.storage),
        };
        self.settle(level)
    }

    /// Moves `level` to its next matching key.
    fn advance_level(&mut self, level: usize) -> bool {
        if self.required_key(level).is_some() {
            // A restricted level has a single matching key.
            return false;
        }
        self.cursors[level].advance(self.storage);
        self.settle(level)
    }

    /// Checks the entry at the cursor of `level` against the mask and records it.
    fn settle(&mut self, level: usize) -> bool {
        let Some((key, value)) = self.cursors[level].entry(self.storage) else {
            return false;
        };
        if self.required_key(level).is_some_and(|required| required != key) {
            return false;
        }
        self.keys[level] = key;
        self.values[level] = value;
        true
    }

    /// Finds the next triple, starting at `level`. If `enter` is set, `level` is positioned
    /// freshly, otherwise it is advanced. Running out of keys on a level carries over to the next
    /// outer level.
    fn seek_from(&mut self, mut level: usize, mut enter: bool) -> bool {
        loop {
            let found = if enter {
                self.enter_level(level)
            } else {
                self.advance_level(level)
            };

            if found {
                if level == 2 {
                    return true;
                }
                level += 1;
                enter = true;
            } else {
                if level == 0 {
                    return false;
                }
                level -= 1;
                enter = false;
            }
        }
    }
}

impl Iterator for TripleIndexIterator<'_> {
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        let found = match self.state {
            IteratorState::Unprimed => self.seek_from(0, true),
            IteratorState::Positioned => self.seek_from(2, false),
            IteratorState::Exhausted => return None,
        };

        if found {
            self.state = IteratorState::Positioned;
            Some(self.order.unpermute(self.keys))
        } else {
            self.state = IteratorState::Exhausted;
            None
        }
    }
}
