//! Terminal commands and error modeling for the pager controller.

use client_core::FormData;
use shared::domain::PageEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Page(PageEvent),
    Reload,
    Filter(FormData),
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, UiError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "n" | "next" => Command::Page(PageEvent::next()),
        "p" | "prev" | "previous" => Command::Page(PageEvent::previous()),
        "f" | "first" => Command::Page(PageEvent::first()),
        "r" | "reload" => Command::Reload,
        "filter" => Command::Filter(parse_assignments(words)?),
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => {
            return Err(UiError::from_message(
                UiErrorContext::Input,
                format!("unknown command '{other}'; type 'help' for the list"),
            ))
        }
    };
    Ok(Some(command))
}

fn parse_assignments<'a>(words: impl Iterator<Item = &'a str>) -> Result<FormData, UiError> {
    let mut form = FormData::new();
    for word in words {
        let Some((name, value)) = word.split_once('=') else {
            return Err(UiError::from_message(
                UiErrorContext::Filter,
                format!("invalid filter '{word}': expected name=value"),
            ));
        };
        if name.is_empty() {
            return Err(UiError::from_message(
                UiErrorContext::Filter,
                format!("invalid filter '{word}': missing field name"),
            ));
        }
        form.push(name, value);
    }
    Ok(form)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Transport,
    Query,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    Input,
    Filter,
    Query,
    Navigation,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("request failed")
            || message_lower.contains("connection")
            || message_lower.contains("timed out")
            || message_lower.contains("http 5")
            || message_lower.contains("unavailable")
        {
            UiErrorCategory::Transport
        } else if message_lower.contains("invalid query")
            || message_lower.contains("invalid response")
            || message_lower.contains("query failed")
            || message_lower.contains("http 4")
        {
            UiErrorCategory::Query
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("expected")
            || message_lower.contains("unknown command")
        {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    /// Errors the user can fix by retyping the command.
    pub fn is_input_error(&self) -> bool {
        self.category == UiErrorCategory::Validation
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn label(&self) -> &'static str {
        match self.category {
            UiErrorCategory::Transport => "network",
            UiErrorCategory::Query => "query",
            UiErrorCategory::Validation => "input",
            UiErrorCategory::Unknown => "error",
        }
    }
}
