use crate::bindings::{
    column_index, ensure_sorted, BindingsIterator, BoxedBindingsIterator, Columns, RowMerger,
};
use crate::QueryError;
use hexastore_model::NodeId;
use std::cmp::Ordering;

/// Joins two inputs that are sorted by a common column.
///
/// Both inputs are consumed in lockstep. Whenever their join keys are equal, the runs of rows with
/// that key are collected from both sides (a batch per side) and their cross product is emitted.
/// Keys that only occur on one side are skipped. The output columns are the left columns followed
/// by the right columns that the left side does not have.
///
/// If the inputs share more columns than the join column, only pairs of rows that agree on all of
/// them are emitted.
pub struct MergeJoinIterator<'a> {
    left: BoxedBindingsIterator<'a>,
    right: BoxedBindingsIterator<'a>,
    column: String,
    left_key: usize,
    right_key: usize,
    merger: RowMerger,
    left_batch: Vec<Vec<NodeId>>,
    right_batch: Vec<Vec<NodeId>>,
    /// The pair of batch rows that is combined next.
    cursor: (usize, usize),
    current: Option<Vec<NodeId>>,
}

impl<'a> MergeJoinIterator<'a> {
    /// Joins `left` and `right` on `column`. Inputs that are not sorted by `column` are sorted
    /// first (see [ensure_sorted]).
    pub fn new(
        left: BoxedBindingsIterator<'a>,
        right: BoxedBindingsIterator<'a>,
        column: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let column = column.into();
        let left = ensure_sorted(left, &column)?;
        let right = ensure_sorted(right, &column)?;
        let unknown = || QueryError::UnknownVariable(column.clone());
        let left_key = column_index(left.columns(), &column).ok_or_else(unknown)?;
        let right_key = column_index(right.columns(), &column).ok_or_else(unknown)?;
        let merger = RowMerger::new(left.columns(), right.columns());

        let mut result = Self {
            left,
            right,
            column,
            left_key,
            right_key,
            merger,
            left_batch: Vec::new(),
            right_batch: Vec::new(),
            cursor: (0, 0),
            current: None,
        };
        result.advance();
        Ok(result)
    }

    /// The column the inputs are joined on.
    pub fn join_column(&self) -> &str {
        &self.column
    }

    fn next_row(&mut self) -> Option<Vec<NodeId>> {
        loop {
            while self.cursor.0 < self.left_batch.len() {
                let (l, r) = self.cursor;
                self.cursor = if r + 1 < self.right_batch.len() {
                    (l, r + 1)
                } else {
                    (l + 1, 0)
                };
                if let Some(row) = self.merger.merge(&self.left_batch[l], &self.right_batch[r]) {
                    return Some(row);
                }
            }

            if !self.next_batches() {
                return None;
            }
        }
    }

    /// Skips ahead to the next key present on both sides and collects its batches. Returns
    /// `false` if one side is exhausted.
    fn next_batches(&mut self) -> bool {
        self.left_batch.clear();
        self.right_batch.clear();
        self.cursor = (0, 0);

        loop {
            let (Some(left), Some(right)) = (self.left.current_row(), self.right.current_row())
            else {
                return false;
            };
            let left_key = left[self.left_key];
            let right_key = right[self.right_key];

            match left_key.cmp(&right_key) {
                Ordering::Less => self.left.advance(),
                Ordering::Greater => self.right.advance(),
                Ordering::Equal => {
                    collect_batch(&mut self.left, self.left_key, left_key, &mut self.left_batch);
                    collect_batch(
                        &mut self.right,
                        self.right_key,
                        right_key,
                        &mut self.right_batch,
                    );
                    return true;
                }
            }
        }
    }
}

/// Moves the rows of `source` into `batch` as long as their `key_index` column holds `key`.
fn collect_batch(
    source: &mut BoxedBindingsIterator<'_>,
    key_index: usize,
    key: NodeId,
    batch: &mut Vec<Vec<NodeId>>,
) {
    while let Some(row) = source
        .current_row()
        .filter(|row| row[key_index] == key)
        .map(<[NodeId]>::to_vec)
    {
        batch.push(row);
        source.advance();
    }
}

impl BindingsIterator for MergeJoinIterator<'_> {
    fn columns(&self) -> &Columns {
        &self.merger.columns
    }

    /// The output is sorted by the join column. Left columns keep the order of the left input, as
    /// every left row is repeated consecutively.
    fn is_sorted_by_column(&self, column: &str) -> bool {
        column == self.column
            || (column_index(self.left.columns(), column).is_some()
                && self.left.is_sorted_by_column(column))
    }

    fn current_row(&self) -> Option<&[NodeId]> {
        self.current.as_deref()
    }

    fn advance(&mut self) {
        self.current = self.next_row();
    }
}
