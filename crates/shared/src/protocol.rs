//! Datasource wire envelope and the in-memory table it carries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DatasourceError, QueryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Datetime,
    Timeofday,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: ColumnType,
}

impl ColumnSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }

    /// Label shown in headers; falls back to the column id.
    pub fn title(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(rename = "v", default)]
    pub value: Value,
    #[serde(rename = "f", default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

impl Cell {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            formatted: None,
        }
    }

    pub fn display(&self) -> String {
        if let Some(formatted) = &self.formatted {
            return formatted.clone();
        }
        match &self.value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "c", default)]
    pub cells: Vec<Option<Cell>>,
}

/// Column-typed result rows of one query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataTable {
    #[serde(rename = "cols", default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl DataTable {
    pub fn with_columns(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, values: Vec<Value>) {
        self.rows.push(Row {
            cells: values.into_iter().map(|v| Some(Cell::new(v))).collect(),
        });
    }

    pub fn number_of_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn number_of_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row)?.cells.get(column)?.as_ref()
    }

    /// Text of a cell as a table would print it; missing cells are blank.
    pub fn display(&self, row: usize, column: usize) -> String {
        self.cell(row, column).map(Cell::display).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Warning,
    Error,
}

/// JSON body returned by a datasource endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasourceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "reqId", default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<DatasourceError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DatasourceError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<DataTable>,
}

impl DatasourceResponse {
    pub fn ok(table: DataTable) -> Self {
        Self {
            version: Some("0.6".into()),
            req_id: None,
            status: ResponseStatus::Ok,
            errors: Vec::new(),
            warnings: Vec::new(),
            table: Some(table),
        }
    }

    pub fn error(error: DatasourceError) -> Self {
        Self {
            version: Some("0.6".into()),
            req_id: None,
            status: ResponseStatus::Error,
            errors: vec![error],
            warnings: Vec::new(),
            table: None,
        }
    }

    pub fn into_result(self) -> QueryResult {
        match self.status {
            ResponseStatus::Error => {
                let error = self
                    .errors
                    .into_iter()
                    .next()
                    .map(QueryError::from)
                    .unwrap_or_else(|| {
                        QueryError::new("Query failed", "datasource reported an error")
                    });
                QueryResult::Error(error)
            }
            ResponseStatus::Ok | ResponseStatus::Warning => match self.table {
                Some(table) => QueryResult::Rows(table),
                None => QueryResult::error("Invalid response", "response carried no table"),
            },
        }
    }
}

/// Outcome of one query: the rows, or an error to show in place of them.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows(DataTable),
    Error(QueryError),
}

impl QueryResult {
    pub fn error(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Error(QueryError::new(message, detail))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error(err) => Some(&err.message),
            Self::Rows(_) => None,
        }
    }

    pub fn detailed_message(&self) -> Option<&str> {
        match self {
            Self::Error(err) => Some(&err.detail),
            Self::Rows(_) => None,
        }
    }

    pub fn data_table(&self) -> Option<&DataTable> {
        match self {
            Self::Rows(table) => Some(table),
            Self::Error(_) => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
