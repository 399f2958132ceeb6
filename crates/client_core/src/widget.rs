use shared::domain::PageEvent;
use tokio::sync::broadcast;

use crate::view::DataView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
    /// The widget pages through the rows it was given.
    Enable,
    /// The widget only emits page events; the owner supplies each page.
    Event,
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Enable,
    Event,
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingButtons {
    Both,
    Previous,
    Next,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawOptions {
    pub paging: PagingMode,
    pub sort: SortMode,
    pub paging_buttons: PagingButtons,
    pub page_size: usize,
    pub show_row_number: bool,
}

impl DrawOptions {
    /// Options for a table whose pages are fetched one query at a time.
    pub fn event_paged(page_size: usize) -> Self {
        Self {
            paging: PagingMode::Event,
            sort: SortMode::Disable,
            paging_buttons: PagingButtons::Both,
            page_size,
            show_row_number: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDisplayOptions {
    pub show_in_tooltip: bool,
}

impl ErrorDisplayOptions {
    pub fn inline() -> Self {
        Self {
            show_in_tooltip: false,
        }
    }
}

/// Destination a paged table is drawn into.
///
/// Methods are called while the controller holds its state lock, so an
/// implementation must not call back into the controller synchronously;
/// page requests go through [`TableWidget::subscribe_pages`].
pub trait TableWidget: Send + Sync {
    fn draw(&self, view: &DataView, options: &DrawOptions);
    fn set_selection(&self, rows: &[usize]);
    fn show_error(&self, message: &str, detail: &str, options: &ErrorDisplayOptions);
    fn subscribe_pages(&self) -> broadcast::Receiver<PageEvent>;
}
