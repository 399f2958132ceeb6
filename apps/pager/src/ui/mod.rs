//! Terminal rendering of the paged table.

pub mod terminal;
