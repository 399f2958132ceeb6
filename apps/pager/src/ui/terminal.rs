use std::{
    io::{self, Write},
    sync::Mutex,
};

use client_core::{
    DataView, DrawOptions, ErrorDisplayOptions, PagingButtons, PagingMode, TableWidget,
};
use shared::domain::PageEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::controller::events::{UiError, UiErrorContext};

const MAX_COLUMN_WIDTH: usize = 40;
const ELLIPSIS: char = '~';

/// Plain-text table written to a terminal (or any writer).
///
/// The paging buttons are the `next`/`prev`/`first` commands; pressing one
/// publishes a [`PageEvent`] to subscribers.
pub struct TerminalTable {
    out: Mutex<Box<dyn Write + Send>>,
    pages: broadcast::Sender<PageEvent>,
    selection: Mutex<Vec<usize>>,
}

impl TerminalTable {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        let (pages, _) = broadcast::channel(32);
        Self {
            out: Mutex::new(out),
            pages,
            selection: Mutex::new(Vec::new()),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Emits a page event; `false` when nothing is listening.
    pub fn press(&self, event: PageEvent) -> bool {
        self.pages.send(event).is_ok()
    }

    pub fn message(&self, text: &str) {
        self.write(&format!("{text}\n"));
    }

    pub fn report(&self, error: &UiError) {
        if !error.is_input_error() {
            debug!(
                category = ?error.category(),
                context = ?error.context(),
                "{}",
                error.message()
            );
        }
        self.write(&format!("[{}] {}\n", error.label(), error.message()));
    }

    fn write(&self, text: &str) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(err) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!("terminal write failed: {err}");
        }
    }
}

impl TableWidget for TerminalTable {
    fn draw(&self, view: &DataView, options: &DrawOptions) {
        let selection = self
            .selection
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default();
        self.write(&render(view, options, &selection));
    }

    fn set_selection(&self, rows: &[usize]) {
        if let Ok(mut selection) = self.selection.lock() {
            *selection = rows.to_vec();
        }
    }

    fn show_error(&self, message: &str, detail: &str, options: &ErrorDisplayOptions) {
        let error = UiError::from_message(UiErrorContext::Query, message);
        if options.show_in_tooltip || detail.is_empty() {
            self.report(&error);
        } else {
            self.write(&format!(
                "[{}] {}\n    {detail}\n",
                error.label(),
                error.message()
            ));
        }
    }

    fn subscribe_pages(&self) -> broadcast::Receiver<PageEvent> {
        self.pages.subscribe()
    }
}

/// Renders one page of `view`. Rows past `page_size` (the look-ahead row)
/// are not shown unless paging is disabled.
pub fn render(view: &DataView, options: &DrawOptions, selection: &[usize]) -> String {
    let row_count = match options.paging {
        PagingMode::Disable => view.number_of_rows(),
        PagingMode::Enable | PagingMode::Event => view.number_of_rows().min(options.page_size),
    };

    let mut grid: Vec<Vec<String>> = Vec::with_capacity(row_count + 1);
    let mut header: Vec<String> = (0..view.number_of_columns())
        .map(|c| {
            view.column(c)
                .map(|spec| spec.title().to_string())
                .unwrap_or_default()
        })
        .collect();
    if options.show_row_number {
        header.insert(0, "#".to_string());
    }
    grid.push(header);

    for row in 0..row_count {
        let mut cells: Vec<String> = (0..view.number_of_columns())
            .map(|c| view.display(row, c))
            .collect();
        if options.show_row_number {
            cells.insert(0, (row + 1).to_string());
        }
        grid.push(cells);
    }

    let widths = column_widths(&grid);
    let mut out = String::new();
    for (index, cells) in grid.iter().enumerate() {
        let marker = if index > 0 && selection.contains(&(index - 1)) {
            '>'
        } else {
            ' '
        };
        out.push(marker);
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| pad(cell, width))
            .collect();
        out.push_str(line.join(" | ").trim_end());
        out.push('\n');

        if index == 0 {
            let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
            out.push(' ');
            out.push_str(&rule.join("-+-"));
            out.push('\n');
        }
    }

    if row_count == 0 {
        out.push_str(" (no rows)\n");
    }

    let has_more = view.number_of_rows() > options.page_size;
    let buttons = match options.paging_buttons {
        PagingButtons::Both => "[p]rev  [n]ext",
        PagingButtons::Previous => "[p]rev",
        PagingButtons::Next => "[n]ext",
        PagingButtons::Auto if has_more => "[p]rev  [n]ext",
        PagingButtons::Auto => "[p]rev",
    };
    if options.paging != PagingMode::Disable {
        out.push_str(&format!(" {buttons}  [f]irst\n"));
    }

    out
}

fn column_widths(grid: &[Vec<String>]) -> Vec<usize> {
    let columns = grid.first().map(Vec::len).unwrap_or_default();
    (0..columns)
        .map(|c| {
            grid.iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or_default()
                .min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

fn pad(cell: &str, width: usize) -> String {
    let len = cell.chars().count();
    if len > width {
        let mut clipped: String = cell.chars().take(width.saturating_sub(1)).collect();
        clipped.push(ELLIPSIS);
        clipped
    } else {
        format!("{cell}{}", " ".repeat(width - len))
    }
}

#[cfg(test)]
#[path = "../tests/terminal_tests.rs"]
mod tests;
