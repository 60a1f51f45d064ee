use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// The default branching factor of B-tree backed structures.
pub const DEFAULT_BTREE_BRANCHING: u32 = 252;
/// The default initial capacity of sorted-array backed structures.
pub const DEFAULT_ARRAY_CAPACITY: u32 = 4;
/// The default initial size of a mapped file.
pub const DEFAULT_MAPPED_SIZE: u64 = 1024 * 1024;

/// How the entries of one level (head, vector, or terminal) are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelLayout {
    /// A single sorted array that grows and shrinks by doubling.
    SortedArray {
        /// The number of entries allocated for a new array.
        initial_capacity: u32,
    },
    /// A B+-tree with linked leaves.
    BTree {
        /// The maximum number of entries per node (at least 4).
        branching: u32,
    },
}

impl LevelLayout {
    /// A sorted array with the default initial capacity.
    pub const fn sorted_array() -> Self {
        LevelLayout::SortedArray {
            initial_capacity: DEFAULT_ARRAY_CAPACITY,
        }
    }

    /// A B-tree with the default branching factor.
    pub const fn btree() -> Self {
        LevelLayout::BTree {
            branching: DEFAULT_BTREE_BRANCHING,
        }
    }

    /// Returns the layout with its parameter clamped to a usable range.
    pub(crate) fn normalized(self) -> Self {
        match self {
            LevelLayout::SortedArray { initial_capacity } => LevelLayout::SortedArray {
                initial_capacity: initial_capacity.max(1),
            },
            LevelLayout::BTree { branching } => LevelLayout::BTree {
                branching: branching.max(4),
            },
        }
    }

    /// Encodes the layout as `(tag, parameter)` for persistence.
    pub(crate) fn to_raw(self) -> (u32, u32) {
        match self {
            LevelLayout::SortedArray { initial_capacity } => (0, initial_capacity),
            LevelLayout::BTree { branching } => (1, branching),
        }
    }

    /// Decodes a layout persisted with [Self::to_raw].
    pub(crate) fn from_raw(tag: u32, parameter: u32) -> Option<Self> {
        match tag {
            0 => Some(LevelLayout::SortedArray {
                initial_capacity: parameter,
            }),
            1 => Some(LevelLayout::BTree {
                branching: parameter,
            }),
            _ => None,
        }
    }
}

impl Display for LevelLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelLayout::SortedArray { initial_capacity } => {
                write!(f, "SortedArray({initial_capacity})")
            }
            LevelLayout::BTree { branching } => write!(f, "BTree({branching})"),
        }
    }
}

/// Holds the layouts of the three levels of every index in a hexastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexConfiguration {
    /// The layout of heads (first level).
    pub head: LevelLayout,
    /// The layout of vectors (second level).
    pub vector: LevelLayout,
    /// The layout of terminals (third level).
    pub terminal: LevelLayout,
}

impl IndexConfiguration {
    /// Returns a configuration that stores terminals in B-trees. Useful for datasets with a large
    /// fan-out (e.g., many objects for a single subject and predicate).
    #[must_use]
    pub fn with_btree_terminals(self) -> Self {
        Self {
            terminal: LevelLayout::btree(),
            ..self
        }
    }

    pub(crate) fn normalized(self) -> Self {
        Self {
            head: self.head.normalized(),
            vector: self.vector.normalized(),
            terminal: self.terminal.normalized(),
        }
    }
}

impl Default for IndexConfiguration {
    fn default() -> Self {
        Self {
            head: LevelLayout::btree(),
            vector: LevelLayout::sorted_array(),
            terminal: LevelLayout::sorted_array(),
        }
    }
}

/// Where the blocks of a hexastore live.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageConfig {
    /// Blocks are individual heap allocations. Nothing survives the process.
    #[default]
    Memory,
    /// Blocks are carved out of a memory-mapped file that doubles in size when full.
    MappedFile {
        /// The path of the file.
        path: PathBuf,
        /// The size of a newly created file.
        initial_size: u64,
    },
}

impl StorageConfig {
    /// A mapped file at `path` with the default initial size.
    pub fn mapped_file(path: impl Into<PathBuf>) -> Self {
        StorageConfig::MappedFile {
            path: path.into(),
            initial_size: DEFAULT_MAPPED_SIZE,
        }
    }
}
