use crate::bindings::{
    column_index, BindingsIterator, BoxedBindingsIterator, Columns, MaterializedIterator,
    RowMerger,
};
use hexastore_model::NodeId;

/// Combines every row of the left input with every row of the right input.
///
/// The right input is materialized once, the left input is streamed. Only used for patterns that
/// share no variables, so the column sets are usually disjoint. Shared columns are handled like in
/// a join.
pub struct CrossJoinIterator<'a> {
    left: BoxedBindingsIterator<'a>,
    right: Vec<Vec<NodeId>>,
    merger: RowMerger,
    /// The right row that is combined with the current left row next.
    right_position: usize,
    current: Option<Vec<NodeId>>,
}

impl<'a> CrossJoinIterator<'a> {
    pub fn new(left: BoxedBindingsIterator<'a>, right: BoxedBindingsIterator<'a>) -> Self {
        let merger = RowMerger::new(left.columns(), right.columns());
        let right = MaterializedIterator::drain(right).into_rows_vec();
        tracing::debug!(right_rows = right.len(), "Materialized right side of cross join");

        let mut result = Self {
            left,
            right,
            merger,
            right_position: 0,
            current: None,
        };
        result.advance();
        result
    }

    fn next_row(&mut self) -> Option<Vec<NodeId>> {
        loop {
            let left = self.left.current_row()?;
            while self.right_position < self.right.len() {
                let right = &self.right[self.right_position];
                self.right_position += 1;
                if let Some(row) = self.merger.merge(left, right) {
                    return Some(row);
                }
            }

            self.right_position = 0;
            self.left.advance();
        }
    }
}

impl BindingsIterator for CrossJoinIterator<'_> {
    fn columns(&self) -> &Columns {
        &self.merger.columns
    }

    fn is_sorted_by_column(&self, column: &str) -> bool {
        column_index(self.left.columns(), column).is_some()
            && self.left.is_sorted_by_column(column)
    }

    fn current_row(&self) -> Option<&[NodeId]> {
        self.current.as_deref()
    }

    fn advance(&mut self) {
        self.current = self.next_row();
    }
}
