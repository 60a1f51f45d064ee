//! The structures an index is built from.
//!
//! Every structure lives in blocks of the [StorageManager](crate::manager::StorageManager) and
//! refers to other structures only by block id. A [SortedMap](map::SortedMap) is backed by either
//! a sorted array or a B+-tree, and the three levels of an index ([Head](level::Head),
//! [Vector](level::Vector), [Terminal](terminal::Terminal)) are sorted maps.

pub(crate) mod btree;
pub(crate) mod level;
pub(crate) mod map;
pub(crate) mod sorted_array;
pub(crate) mod terminal;
