use crate::block::{read_u32, read_u64, write_u32, write_u64};
use crate::config::{IndexConfiguration, LevelLayout};
use crate::index::{IndexOrder, PositionMask, TripleIndex, TripleIndexIterator};
use crate::manager::{BlockId, StorageManager};
use crate::structures::level::Head;
use crate::structures::map::{SortedMap, StructureKind};
use hexastore_common::{CorruptionError, StorageResult};
use hexastore_model::{NodeId, Triple, TriplePosition};
use std::fmt::{Debug, Formatter};

/// Identifies the root block of a hexastore ("HXROOT01").
const ROOT_MAGIC: u64 = u64::from_le_bytes(*b"HXROOT01");

// Root block layout: magic (u64), six head ids (u64), three layouts (tag u32, parameter u32)
const HEADS_OFFSET: usize = 8;
const LAYOUTS_OFFSET: usize = HEADS_OFFSET + 6 * 8;
const ROOT_SIZE: usize = LAYOUTS_OFFSET + 3 * 8;

/// The primary orders of the three pairs of indexes that share terminals. The dual of each is
/// [IndexOrder::dual].
const PRIMARY_ORDERS: [IndexOrder; 3] = [IndexOrder::SPO, IndexOrder::SOP, IndexOrder::POS];

/// A set of triples indexed in all six orders of subject, predicate, and object.
///
/// Every pattern, no matter which positions are bound, can be answered by seeking in one index
/// (see [Hexastore::select_index]). The six indexes are kept in lockstep: all mutations go through
/// [Hexastore::add_triple] and [Hexastore::remove_triple].
///
/// The indexes form three pairs that share their terminals (SPO/PSO, SOP/OSP, POS/OPS). Adding a
/// triple thus allocates at most three terminals for six indexes.
///
/// # Example
///
/// ```
/// use hexastore_model::{NodeId, Triple, TriplePosition};
/// use hexastore_storage::{Hexastore, IndexConfiguration, StorageManager};
///
/// let mut hexastore =
///     Hexastore::new(StorageManager::memory(), IndexConfiguration::default()).unwrap();
/// hexastore.add_triple(Triple::from_raw(1, 2, 3)).unwrap();
/// hexastore.add_triple(Triple::from_raw(1, 2, 4)).unwrap();
///
/// let objects = hexastore
///     .get_statements(NodeId::new(1), NodeId::new(2), NodeId::WILDCARD, TriplePosition::Object)
///     .map(|triple| triple.object.as_i64())
///     .collect::<Vec<_>>();
/// assert_eq!(objects, vec![3, 4]);
/// ```
pub struct Hexastore {
    storage: StorageManager,
    config: IndexConfiguration,
    /// The indexes in the order of [IndexOrder::ALL].
    indexes: [TripleIndex; 6],
    next_variable: u32,
}

impl Hexastore {
    /// Creates an empty hexastore in `storage` and records it as the root of the storage.
    pub fn new(mut storage: StorageManager, config: IndexConfiguration) -> StorageResult<Self> {
        let config = config.normalized();
        if let Some(root) = storage.root() {
            tracing::warn!(%root, "Replacing the root of a non-empty storage");
        }

        let [spo, sop, pso, pos, osp, ops] = IndexOrder::ALL.map(|order| {
            TripleIndex::create(
                &mut storage,
                order,
                config.head,
                config.vector,
                config.terminal,
            )
        });
        let indexes = [spo?, sop?, pso?, pos?, osp?, ops?];

        let root = storage.new_block(ROOT_SIZE)?;
        let block = storage.block_mut(root);
        write_u64(block, 0, ROOT_MAGIC);
        for (i, index) in indexes.iter().enumerate() {
            write_u64(block, HEADS_OFFSET + i * 8, index.head().id().as_u64());
        }
        for (i, layout) in [config.head, config.vector, config.terminal]
            .into_iter()
            .enumerate()
        {
            let (tag, parameter) = layout.to_raw();
            write_u32(block, LAYOUTS_OFFSET + i * 8, tag);
            write_u32(block, LAYOUTS_OFFSET + i * 8 + 4, parameter);
        }
        storage.set_root(Some(root));
        tracing::debug!(%root, ?config, "Created hexastore");

        Ok(Self {
            storage,
            config,
            indexes,
            next_variable: 0,
        })
    }

    /// Reattaches to the hexastore recorded as the root of `storage` by [Hexastore::new].
    pub fn open(storage: StorageManager) -> StorageResult<Self> {
        let root = storage
            .root()
            .ok_or_else(|| CorruptionError::msg("The storage does not contain a hexastore."))?;
        if !storage.contains_block(root)
            || storage.block_size(root) < ROOT_SIZE
            || read_u64(storage.block(root), 0) != ROOT_MAGIC
        {
            return Err(CorruptionError::msg(format!(
                "The root block {root} does not describe a hexastore."
            ))
            .into());
        }

        let block = storage.block(root);
        let mut layouts = [LevelLayout::sorted_array(); 3];
        for (i, layout) in layouts.iter_mut().enumerate() {
            let tag = read_u32(block, LAYOUTS_OFFSET + i * 8);
            let parameter = read_u32(block, LAYOUTS_OFFSET + i * 8 + 4);
            *layout = LevelLayout::from_raw(tag, parameter).ok_or_else(|| {
                CorruptionError::msg(format!("Unknown level layout {tag} in the root block."))
            })?;
        }
        let [head, vector, terminal] = layouts;
        let config = IndexConfiguration {
            head,
            vector,
            terminal,
        };

        let mut indexes = Vec::with_capacity(6);
        for (i, order) in IndexOrder::ALL.into_iter().enumerate() {
            let id = BlockId::from_raw(read_u64(block, HEADS_OFFSET + i * 8))
                .filter(|id| SortedMap::has_kind(&storage, *id, StructureKind::Head))
                .ok_or_else(|| {
                    CorruptionError::msg(format!("The {order} index has no valid head."))
                })?;
            let head = Head::open(&storage, id);
            indexes.push(TripleIndex::from_head(order, head, vector, terminal));
        }
        let indexes: [TripleIndex; 6] = indexes
            .try_into()
            .map_err(|_| CorruptionError::msg("Expected six indexes."))?;

        let hexastore = Self {
            storage,
            config,
            indexes,
            next_variable: 0,
        };
        let lengths = hexastore
            .indexes
            .iter()
            .map(|index| index.len(&hexastore.storage))
            .collect::<Vec<_>>();
        if lengths.iter().any(|len| *len != lengths[0]) {
            return Err(CorruptionError::msg(format!(
                "The indexes hold different numbers of triples: {lengths:?}."
            ))
            .into());
        }
        tracing::debug!(%root, len = lengths[0], "Opened hexastore");
        Ok(hexastore)
    }

    /// The layouts of the index levels.
    pub fn config(&self) -> IndexConfiguration {
        self.config
    }

    /// The storage holding the indexes.
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Writes outstanding changes to a mapped file.
    pub fn flush(&self) -> StorageResult<()> {
        self.storage.flush()
    }

    /// Gives up the hexastore and returns its storage. The root of the storage still refers to the
    /// hexastore, so it can be reattached with [Hexastore::open].
    pub fn into_storage(self) -> StorageManager {
        self.storage
    }

    pub(crate) fn index_for(&self, order: IndexOrder) -> TripleIndex {
        let position = IndexOrder::ALL
            .iter()
            .position(|candidate| *candidate == order)
            .unwrap_or_else(|| panic!("Unknown index order {order}."));
        self.indexes[position]
    }

    /// Read-only access to the index with the given `order`.
    pub fn index(&self, order: IndexOrder) -> IndexView<'_> {
        IndexView {
            index: self.index_for(order),
            storage: &self.storage,
        }
    }

    /// The number of triples.
    pub fn len(&self) -> u64 {
        self.index_for(IndexOrder::SPO).len(&self.storage)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether `triple` is present. Triples with variables or wildcards are never present.
    pub fn contains(&self, triple: &Triple) -> bool {
        triple.is_ground()
            && self
                .index_for(IndexOrder::SPO)
                .contains(&self.storage, triple)
    }

    /// Adds `triple` to all six indexes. Returns `false` if it was already present.
    ///
    /// For a mapped storage, the space needed by the insertion is reserved up front, so an
    /// allocation failure leaves the hexastore unchanged.
    ///
    /// # Panics
    ///
    /// Panics if a position of `triple` is not a term (zero or negative).
    pub fn add_triple(&mut self, triple: Triple) -> StorageResult<bool> {
        assert!(
            triple.is_ground(),
            "Only triples of terms can be stored, got {triple}."
        );
        if self.contains(&triple) {
            return Ok(false);
        }

        if self.storage.is_mapped() {
            let bound = self.insert_bound(&triple);
            self.storage.reserve(bound)?;
        }

        for order in PRIMARY_ORDERS {
            let primary = self.index_for(order);
            let dual = self.index_for(order.dual());
            let link = primary
                .add_primary(&mut self.storage, &triple)?
                .unwrap_or_else(|| {
                    panic!("The {order} index already contains {triple}, the SPO index does not.")
                });
            dual.add_dual(&mut self.storage, &triple, link)?;
        }
        tracing::trace!(%triple, "Added triple");
        Ok(true)
    }

    /// The number of bytes adding `triple` may allocate.
    fn insert_bound(&self, triple: &Triple) -> u64 {
        PRIMARY_ORDERS
            .into_iter()
            .map(|order| {
                self.index_for(order)
                    .insert_bound(&self.storage, triple, true)
                    + self
                        .index_for(order.dual())
                        .insert_bound(&self.storage, triple, false)
            })
            .sum()
    }

    /// Adds many triples. The batch is sorted and deduplicated before it is inserted. Returns the
    /// number of triples that were not present before.
    pub fn add_triple_batch(
        &mut self,
        triples: impl IntoIterator<Item = Triple>,
    ) -> StorageResult<u64> {
        let mut triples = triples.into_iter().collect::<Vec<_>>();
        triples.sort_unstable();
        triples.dedup();

        let mut inserted = 0;
        for triple in &triples {
            if self.add_triple(*triple)? {
                inserted += 1;
            }
        }
        tracing::debug!(batch = triples.len(), inserted, "Added triple batch");
        Ok(inserted)
    }

    /// Removes `triple` from all six indexes. Returns `false` if it was not present.
    ///
    /// Emptied terminals, vectors, and heads entries are released.
    pub fn remove_triple(&mut self, triple: &Triple) -> bool {
        if !self.contains(triple) {
            return false;
        }

        for order in PRIMARY_ORDERS {
            let primary = self.index_for(order);
            let dual = self.index_for(order.dual());
            assert!(
                primary.remove_primary(&mut self.storage, triple),
                "The {order} index does not contain {triple}, the SPO index does."
            );
            dual.remove_dual(&mut self.storage, triple);
        }
        tracing::trace!(%triple, "Removed triple");
        true
    }

    /// Hands out a new variable id (-1, -2, ...). Variables are only used in patterns.
    pub fn new_variable(&mut self) -> NodeId {
        self.next_variable += 1;
        NodeId::variable(self.next_variable)
    }

    /// Chooses the index for the pattern described by `masks`.
    ///
    /// Every index gets a score: two points per leading bound position, as each of them is a
    /// lookup instead of a scan, and one point if the first unbound position is `tiebreak`, as the
    /// results are then sorted by it. Among indexes with the same score, the first in
    /// [IndexOrder::ALL] wins. The choice only depends on which positions are bound.
    pub fn select_index(masks: &[PositionMask; 3], tiebreak: TriplePosition) -> IndexOrder {
        IndexOrder::ALL
            .into_iter()
            .rev() // Prefer SPO (max by uses the last on equality)
            .max_by_key(|order| Self::scan_score(*order, masks, tiebreak))
            .unwrap_or(IndexOrder::SPO)
    }

    fn scan_score(order: IndexOrder, masks: &[PositionMask; 3], tiebreak: TriplePosition) -> usize {
        let leading = (0..3)
            .take_while(|level| masks[order.position(*level).spo_index()].is_bound())
            .count();
        let sorted_by_tiebreak = leading < 3 && order.position(leading) == tiebreak;
        2 * leading + usize::from(sorted_by_tiebreak)
    }

    /// Iterates over the triples matching the pattern `(subject, predicate, object)`.
    ///
    /// Terms are bound, [NodeId::WILDCARD] matches anything, and a variable matches anything but
    /// must take the same value at every position it occurs in. If possible, the results are
    /// sorted by `tiebreak` (see [TripleIndexIterator::is_sorted_by_position]).
    pub fn get_statements(
        &self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        tiebreak: TriplePosition,
    ) -> TripleIndexIterator<'_> {
        let masks = PositionMask::from_pattern([subject, predicate, object]);
        self.get_statements_masked(&masks, tiebreak)
    }

    /// Like [Self::get_statements], with explicit masks.
    pub fn get_statements_masked(
        &self,
        masks: &[PositionMask; 3],
        tiebreak: TriplePosition,
    ) -> TripleIndexIterator<'_> {
        let order = Self::select_index(masks, tiebreak);
        self.index_for(order).iter(&self.storage, masks)
    }

    /// Counts the triples matching the pattern `(subject, predicate, object)` (see
    /// [Self::get_statements]).
    ///
    /// The count is read from the cached counts of the selected index. Only patterns that repeat a
    /// variable are counted by iterating.
    pub fn count_statements(&self, subject: NodeId, predicate: NodeId, object: NodeId) -> u64 {
        let masks = PositionMask::from_pattern([subject, predicate, object]);
        if masks
            .iter()
            .any(|mask| matches!(mask, PositionMask::SameAs(_)))
        {
            return self
                .get_statements_masked(&masks, TriplePosition::Subject)
                .count() as u64;
        }

        let order = Self::select_index(&masks, TriplePosition::Subject);
        let prefix = (0..3)
            .map_while(|level| match masks[order.position(level).spo_index()] {
                PositionMask::Bound(node) => Some(node.as_i64()),
                _ => None,
            })
            .collect::<Vec<_>>();
        self.index_for(order).count_prefix(&self.storage, &prefix)
    }

    /// The bytes held by all six indexes. Shared terminals are counted twice.
    pub fn memory_size(&self) -> u64 {
        self.indexes
            .iter()
            .map(|index| index.memory_size(&self.storage))
            .sum()
    }
}

impl Debug for Hexastore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hexastore")
            .field("len", &self.len())
            .field("config", &self.config)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

/// Read-only access to one index of a [Hexastore].
#[derive(Clone, Copy)]
pub struct IndexView<'index> {
    index: TripleIndex,
    storage: &'index StorageManager,
}

impl<'index> IndexView<'index> {
    pub fn order(&self) -> IndexOrder {
        self.index.order()
    }

    /// The number of triples, read from the cached count of the head.
    pub fn len(&self) -> u64 {
        self.index.len(self.storage)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of distinct keys in the head.
    pub fn head_len(&self) -> u64 {
        self.index.head().len(self.storage)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.index.contains(self.storage, triple)
    }

    /// The bytes held by the index, including the terminals it shares with its dual.
    pub fn memory_size(&self) -> u64 {
        self.index.memory_size(self.storage)
    }

    /// Iterates over all triples in the order of this index.
    pub fn iter(&self) -> TripleIndexIterator<'index> {
        self.index
            .iter(self.storage, &[PositionMask::Wildcard; 3])
    }
}

impl Debug for IndexView<'_> {
    /// Lists the triples with their nodes arranged in the order of the index.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let order = self.order();
        write!(f, "{order} ")?;
        f.debug_list()
            .entries(self.iter().map(|triple| order.permute(&triple)))
            .finish()
    }
}
