//! Types shared between the table client library and the pager application.

pub mod domain;
pub mod error;
pub mod protocol;
