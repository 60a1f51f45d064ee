use crate::manager::BlockId;

/// Blocks as individual heap allocations kept in a slab. A block id is the slot index plus one.
pub(super) struct HeapBlocks {
    slots: Vec<Option<Box<[u8]>>>,
    free_slots: Vec<usize>,
    root: Option<BlockId>,
    allocated_bytes: u64,
}

impl HeapBlocks {
    pub(super) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            root: None,
            allocated_bytes: 0,
        }
    }

    pub(super) fn allocation_size(size: usize) -> u64 {
        size as u64
    }

    pub(super) fn allocate(&mut self, size: usize) -> BlockId {
        let block = vec![0u8; size].into_boxed_slice();
        self.allocated_bytes += size as u64;
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot] = Some(block);
                slot
            }
            None => {
                self.slots.push(Some(block));
                self.slots.len() - 1
            }
        };
        BlockId(slot as u64 + 1)
    }

    pub(super) fn release(&mut self, id: BlockId) {
        let slot = Self::slot(id);
        match self.slots.get_mut(slot).and_then(Option::take) {
            Some(block) => {
                self.allocated_bytes -= block.len() as u64;
                self.free_slots.push(slot);
            }
            None => panic!("The block {id} does not exist."),
        }
    }

    pub(super) fn contains(&self, id: BlockId) -> bool {
        matches!(self.slots.get(Self::slot(id)), Some(Some(_)))
    }

    pub(super) fn block(&self, id: BlockId) -> &[u8] {
        match self.slots.get(Self::slot(id)) {
            Some(Some(block)) => block,
            _ => panic!("The block {id} does not exist."),
        }
    }

    pub(super) fn block_mut(&mut self, id: BlockId) -> &mut [u8] {
        match self.slots.get_mut(Self::slot(id)) {
            Some(Some(block)) => block,
            _ => panic!("The block {id} does not exist."),
        }
    }

    pub(super) fn root(&self) -> Option<BlockId> {
        self.root
    }

    pub(super) fn set_root(&mut self, root: Option<BlockId>) {
        self.root = root;
    }

    pub(super) fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    pub(super) fn block_count(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    fn slot(id: BlockId) -> usize {
        (id.0 - 1) as usize
    }
}
