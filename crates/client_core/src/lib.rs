//! Client side of a paged, server-queried table: the page controller, the
//! query object and the collaborator traits it drives.

pub mod controller;
pub mod form;
pub mod http;
pub mod query;
pub mod view;
pub mod widget;

pub use controller::{ControllerError, FormSubmitHandler, PagedTableController};
pub use form::FormData;
pub use http::{HttpQueryError, HttpQueryService};
pub use query::{Query, QueryService};
pub use view::{DataView, RowTransform};
pub use widget::{
    DrawOptions, ErrorDisplayOptions, PagingButtons, PagingMode, SortMode, TableWidget,
};
