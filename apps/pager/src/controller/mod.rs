//! Controller layer: terminal commands, UI errors and dispatch to the table controller.

pub mod events;
pub mod orchestration;
