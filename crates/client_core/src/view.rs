use std::sync::Arc;

use shared::protocol::{ColumnSpec, DataTable};

/// Hook run over every fresh view before it is drawn.
pub type RowTransform = Arc<dyn Fn(&mut DataView) + Send + Sync>;

/// Projection over a shared [`DataTable`]: which columns and rows are
/// visible, in which order. The underlying table is never modified.
#[derive(Debug, Clone)]
pub struct DataView {
    table: Arc<DataTable>,
    columns: Vec<usize>,
    rows: Vec<usize>,
}

impl DataView {
    pub fn new(table: Arc<DataTable>) -> Self {
        let columns = (0..table.number_of_columns()).collect();
        let rows = (0..table.number_of_rows()).collect();
        Self {
            table,
            columns,
            rows,
        }
    }

    pub fn table(&self) -> &DataTable {
        &self.table
    }

    pub fn number_of_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn number_of_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, view_column: usize) -> Option<&ColumnSpec> {
        let index = *self.columns.get(view_column)?;
        self.table.columns.get(index)
    }

    pub fn table_row_index(&self, view_row: usize) -> Option<usize> {
        self.rows.get(view_row).copied()
    }

    pub fn display(&self, view_row: usize, view_column: usize) -> String {
        match (self.rows.get(view_row), self.columns.get(view_column)) {
            (Some(&row), Some(&column)) => self.table.display(row, column),
            _ => String::new(),
        }
    }

    /// Shows exactly `columns` (table indices) in the given order; indices
    /// past the end of the table are dropped.
    pub fn set_columns(&mut self, columns: impl IntoIterator<Item = usize>) {
        let limit = self.table.number_of_columns();
        self.columns = columns.into_iter().filter(|&c| c < limit).collect();
    }

    pub fn hide_columns(&mut self, columns: &[usize]) {
        self.columns.retain(|c| !columns.contains(c));
    }

    pub fn hide_column_ids<S: AsRef<str>>(&mut self, ids: &[S]) {
        let hidden: Vec<usize> = ids
            .iter()
            .filter_map(|id| self.table.column_index(id.as_ref()))
            .collect();
        self.hide_columns(&hidden);
    }

    pub fn set_rows(&mut self, rows: impl IntoIterator<Item = usize>) {
        let limit = self.table.number_of_rows();
        self.rows = rows.into_iter().filter(|&r| r < limit).collect();
    }
}
