//! Routes parsed terminal commands to the table controller.

use std::sync::Arc;

use client_core::{FormSubmitHandler, PagedTableController};
use tracing::debug;

use crate::{
    controller::events::{Command, UiError, UiErrorContext},
    ui::terminal::TerminalTable,
};

pub const HELP: &str = "\
commands:
  n, next                 next page
  p, prev                 previous page
  f, first                back to the first page
  r, reload               query the current page again
  filter name=value ...   filter rows (no fields clears the filter)
  h, help                 this text
  q, quit                 exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub async fn dispatch_command(
    controller: &Arc<PagedTableController>,
    table: &TerminalTable,
    forms: &FormSubmitHandler,
    cmd: Command,
) -> Result<Flow, UiError> {
    match cmd {
        Command::Page(event) => {
            debug!(delta = event.page, "page button pressed");
            if !table.press(event) {
                return Err(UiError::from_message(
                    UiErrorContext::Navigation,
                    "table controller is not listening for page events",
                ));
            }
        }
        Command::Reload => controller.send_and_draw().await,
        Command::Filter(form) => {
            forms
                .submit(&form)
                .await
                .map_err(|err| UiError::from_message(UiErrorContext::Filter, err.to_string()))?;
        }
        Command::Help => table.message(HELP),
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
#[path = "../tests/orchestration_tests.rs"]
mod tests;
