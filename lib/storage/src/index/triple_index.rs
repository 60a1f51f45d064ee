use crate::config::LevelLayout;
use crate::index::mask::{level_masks, PositionMask};
use crate::index::{IndexOrder, TripleIndexIterator};
use crate::manager::StorageManager;
use crate::structures::level::{Head, Vector};
use crate::structures::terminal::{SharedTerminal, Terminal};
use hexastore_common::StorageResult;
use hexastore_model::Triple;

/// How the dual index gets hold of the terminal of a triple.
#[derive(Debug)]
pub(crate) enum TerminalLink {
    /// The terminal already existed, so the dual index already refers to it.
    Existing(Terminal),
    /// The terminal was created by the primary index and must be stored by the dual index.
    New(SharedTerminal),
}

impl TerminalLink {
    fn terminal(&self) -> Terminal {
        match self {
            TerminalLink::Existing(terminal) => *terminal,
            TerminalLink::New(shared) => shared.terminal(),
        }
    }
}

/// All triples nested in one [IndexOrder]: a head maps the first key to a vector that maps the
/// second key to a terminal that holds the third keys.
///
/// Two indexes whose orders are each other's [dual](IndexOrder::dual) share their terminals. The
/// primary index creates a terminal and hands it to the dual index as a [TerminalLink]. Only the
/// [Hexastore](crate::Hexastore) mutates indexes, always in pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TripleIndex {
    order: IndexOrder,
    head: Head,
    vector_layout: LevelLayout,
    terminal_layout: LevelLayout,
}

impl TripleIndex {
    pub(crate) fn create(
        storage: &mut StorageManager,
        order: IndexOrder,
        head_layout: LevelLayout,
        vector_layout: LevelLayout,
        terminal_layout: LevelLayout,
    ) -> StorageResult<Self> {
        let head = Head::create(storage, head_layout)?;
        Ok(Self::from_head(order, head, vector_layout, terminal_layout))
    }

    pub(crate) fn from_head(
        order: IndexOrder,
        head: Head,
        vector_layout: LevelLayout,
        terminal_layout: LevelLayout,
    ) -> Self {
        Self {
            order,
            head,
            vector_layout: vector_layout.normalized(),
            terminal_layout: terminal_layout.normalized(),
        }
    }

    pub(crate) fn order(&self) -> IndexOrder {
        self.order
    }

    pub(crate) fn head(&self) -> Head {
        self.head
    }

    /// The number of triples, read from the cached count of the head.
    pub(crate) fn len(&self, storage: &StorageManager) -> u64 {
        self.head.triples_count(storage)
    }

    pub(crate) fn contains(&self, storage: &StorageManager, triple: &Triple) -> bool {
        let [a, b, c] = self.order.permute(triple);
        self.terminal(storage, a, b)
            .is_some_and(|terminal| terminal.contains(storage, c))
    }

    fn terminal(&self, storage: &StorageManager, a: i64, b: i64) -> Option<Terminal> {
        self.head.get(storage, a)?.get(storage, b)
    }

    /// Counts the triples that start with `prefix` in the order of this index. Uses the cached
    /// counts of the levels, so no triple is visited.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` has more than three keys.
    pub(crate) fn count_prefix(&self, storage: &StorageManager, prefix: &[i64]) -> u64 {
        match *prefix {
            [] => self.head.triples_count(storage),
            [a] => self
                .head
                .get(storage, a)
                .map_or(0, |vector| vector.triples_count(storage)),
            [a, b] => self
                .terminal(storage, a, b)
                .map_or(0, |terminal| terminal.len(storage)),
            [a, b, c] => u64::from(
                self.terminal(storage, a, b)
                    .is_some_and(|terminal| terminal.contains(storage, c)),
            ),
            _ => panic!("A prefix has at most three keys, got {prefix:?}."),
        }
    }

    /// Iterates over the triples matching `masks` (in SPO order).
    pub(crate) fn iter<'index>(
        &self,
        storage: &'index StorageManager,
        masks: &[PositionMask; 3],
    ) -> TripleIndexIterator<'index> {
        TripleIndexIterator::new(
            storage,
            self.order,
            self.head.map(),
            level_masks(self.order, masks),
        )
    }

    /// The number of bytes adding `triple` may allocate. Only the primary index of a pair creates
    /// terminals.
    pub(crate) fn insert_bound(
        &self,
        storage: &StorageManager,
        triple: &Triple,
        primary: bool,
    ) -> u64 {
        let terminal_creation = if primary {
            Terminal::creation_bound(storage, self.terminal_layout)
        } else {
            0
        };
        let [a, b, _] = self.order.permute(triple);

        let Some(vector) = self.head.get(storage, a) else {
            return self.head.insert_bound(storage)
                + Vector::creation_bound(storage, self.vector_layout)
                + terminal_creation;
        };
        let Some(terminal) = vector.get(storage, b) else {
            return vector.insert_bound(storage) + terminal_creation;
        };
        if primary {
            terminal.insert_bound(storage)
        } else {
            0
        }
    }

    fn vector_or_create(&self, storage: &mut StorageManager, key: i64) -> StorageResult<Vector> {
        if let Some(vector) = self.head.get(storage, key) {
            return Ok(vector);
        }
        let vector = Vector::create(storage, self.vector_layout)?;
        self.head.add(storage, key, vector)?;
        Ok(vector)
    }

    /// Adds `triple` to the primary index of a pair.
    ///
    /// Returns [None] if the triple was already present. Otherwise, returns the link that must be
    /// passed to [Self::add_dual] of the dual index.
    pub(crate) fn add_primary(
        &self,
        storage: &mut StorageManager,
        triple: &Triple,
    ) -> StorageResult<Option<TerminalLink>> {
        let [a, b, c] = self.order.permute(triple);
        let vector = self.vector_or_create(storage, a)?;
        let link = match vector.get(storage, b) {
            Some(terminal) => TerminalLink::Existing(terminal),
            None => {
                let terminal = Terminal::create(storage, self.terminal_layout)?;
                vector.add(storage, b, terminal)?;
                TerminalLink::New(terminal.share(storage))
            }
        };

        if !link.terminal().add(storage, c)? {
            return Ok(None);
        }
        vector.increment_triples_count(storage);
        self.head.increment_triples_count(storage);
        Ok(Some(link))
    }

    /// Adds `triple` to the dual index of a pair, after [Self::add_primary] has added it to the
    /// shared terminal.
    ///
    /// # Panics
    ///
    /// Panics if the two indexes of the pair disagree on the terminal of the triple.
    pub(crate) fn add_dual(
        &self,
        storage: &mut StorageManager,
        triple: &Triple,
        link: TerminalLink,
    ) -> StorageResult<()> {
        let [a, b, _] = self.order.permute(triple);
        let vector = self.vector_or_create(storage, a)?;
        match (vector.get(storage, b), link) {
            (Some(existing), TerminalLink::Existing(terminal)) => assert_eq!(
                existing, terminal,
                "The {} index refers to another terminal for {triple}.",
                self.order
            ),
            (None, TerminalLink::New(shared)) => {
                vector.add(storage, b, shared.into_terminal())?;
            }
            (existing, link) => panic!(
                "The {} index is out of sync with its dual for {triple}: found {existing:?}, got {link:?}.",
                self.order
            ),
        }
        debug_assert!(self.contains(storage, triple));

        vector.increment_triples_count(storage);
        self.head.increment_triples_count(storage);
        Ok(())
    }

    /// Removes `triple` from the primary index of a pair. Returns `false` if it was not present.
    ///
    /// An emptied terminal is removed from its vector, which drops this index's reference to it.
    /// An emptied vector is removed from the head.
    pub(crate) fn remove_primary(&self, storage: &mut StorageManager, triple: &Triple) -> bool {
        let [a, b, c] = self.order.permute(triple);
        let Some(vector) = self.head.get(storage, a) else {
            return false;
        };
        let Some(terminal) = vector.get(storage, b) else {
            return false;
        };
        if !terminal.remove(storage, c) {
            return false;
        }

        self.finish_removal(storage, vector, terminal, a, b);
        true
    }

    /// Removes `triple` from the dual index of a pair, after [Self::remove_primary] has removed it
    /// from the shared terminal.
    ///
    /// # Panics
    ///
    /// Panics if the index does not refer to a terminal for the triple.
    pub(crate) fn remove_dual(&self, storage: &mut StorageManager, triple: &Triple) {
        let [a, b, _] = self.order.permute(triple);
        let (vector, terminal) = self
            .head
            .get(storage, a)
            .and_then(|vector| Some((vector, vector.get(storage, b)?)))
            .unwrap_or_else(|| {
                panic!(
                    "The {} index has no terminal for {triple} but its dual has.",
                    self.order
                )
            });
        self.finish_removal(storage, vector, terminal, a, b);
    }

    fn finish_removal(
        &self,
        storage: &mut StorageManager,
        vector: Vector,
        terminal: Terminal,
        a: i64,
        b: i64,
    ) {
        vector.decrement_triples_count(storage);
        self.head.decrement_triples_count(storage);
        if terminal.is_empty(storage) {
            vector.remove(storage, b);
            if vector.is_empty(storage) {
                self.head.remove(storage, a);
            }
        }
    }

    /// The bytes held by the index. Shared terminals are counted by both indexes of a pair.
    pub(crate) fn memory_size(&self, storage: &StorageManager) -> u64 {
        self.head.memory_size(storage)
    }
}
