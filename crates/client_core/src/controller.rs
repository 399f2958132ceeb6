use std::sync::{Arc, OnceLock, Weak};

use shared::{
    domain::{PageEvent, PageWindow, DEFAULT_PAGE_SIZE},
    protocol::QueryResult,
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    form::FormData,
    query::{Query, QueryService},
    view::{DataView, RowTransform},
    widget::{DrawOptions, ErrorDisplayOptions, TableWidget},
};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("base path must be absolute (start with '/'): {0:?}")]
    RelativeBasePath(String),
    #[error("origin {0} cannot serve queries")]
    OpaqueOrigin(String),
    #[error("page size must be positive")]
    ZeroPageSize,
    #[error("page size {0} is too large to query")]
    PageSizeTooLarge(usize),
    #[error("invalid query url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

/// Pages through a query endpoint `page_size` rows at a time and draws each
/// page into a [`TableWidget`].
///
/// Every query asks for one row more than a page holds. Getting that extra
/// row back is what allows moving to the next page.
pub struct PagedTableController {
    origin: Url,
    base_path: String,
    page_size: usize,
    service: Arc<dyn QueryService>,
    widget: Arc<dyn TableWidget>,
    row_transform: Option<RowTransform>,
    state: Mutex<ControllerState>,
    page_listener: OnceLock<JoinHandle<()>>,
}

struct ControllerState {
    current_page: usize,
    last_row_count: Option<usize>,
    view: Option<DataView>,
    query: Query,
    /// Bumped per dispatched query; results carrying an older ticket are stale.
    ticket: u64,
}

impl PagedTableController {
    /// Binds a controller to `widget`. No query is sent until
    /// [`send_and_draw`](Self::send_and_draw) or a page event.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(
        origin: &Url,
        base_path: impl Into<String>,
        service: Arc<dyn QueryService>,
        widget: Arc<dyn TableWidget>,
        row_transform: Option<RowTransform>,
    ) -> Result<Arc<Self>, ControllerError> {
        Self::create_with_page_size(
            origin,
            base_path,
            service,
            widget,
            row_transform,
            DEFAULT_PAGE_SIZE,
        )
    }

    pub fn create_with_page_size(
        origin: &Url,
        base_path: impl Into<String>,
        service: Arc<dyn QueryService>,
        widget: Arc<dyn TableWidget>,
        row_transform: Option<RowTransform>,
        page_size: usize,
    ) -> Result<Arc<Self>, ControllerError> {
        if page_size == 0 {
            return Err(ControllerError::ZeroPageSize);
        }
        if PageWindow::for_page(page_size, 0).is_none() {
            return Err(ControllerError::PageSizeTooLarge(page_size));
        }

        let base_path = base_path.into();
        let url = endpoint_url(origin, &base_path, None)?;
        let pages = widget.subscribe_pages();

        let controller = Arc::new(Self {
            origin: origin.clone(),
            base_path,
            page_size,
            service: Arc::clone(&service),
            widget,
            row_transform,
            state: Mutex::new(ControllerState {
                current_page: 0,
                last_row_count: None,
                view: None,
                query: Query::new(service, url),
                ticket: 0,
            }),
            page_listener: OnceLock::new(),
        });

        let listener = tokio::spawn(forward_page_events(Arc::downgrade(&controller), pages));
        let _ = controller.page_listener.set(listener);

        Ok(controller)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub async fn current_page(&self) -> usize {
        self.state.lock().await.current_page
    }

    /// Rows drawn after the latest successful query, look-ahead row included.
    /// Counted after the row transform, so rows it filters out do not
    /// license a next page.
    pub async fn last_row_count(&self) -> Option<usize> {
        self.state.lock().await.last_row_count
    }

    pub async fn query_url(&self) -> Url {
        self.state.lock().await.query.url().clone()
    }

    pub async fn current_clause(&self) -> String {
        self.state.lock().await.query.clause().to_string()
    }

    /// Rows of the view currently drawn, if the last query succeeded.
    pub async fn visible_rows(&self) -> Option<usize> {
        self.state
            .lock()
            .await
            .view
            .as_ref()
            .map(DataView::number_of_rows)
    }

    /// Applies a finished query's result to the widget.
    pub async fn handle_result(&self, result: QueryResult) {
        let mut state = self.state.lock().await;
        self.apply_result(&mut state, result);
    }

    /// Clears the selection, supersedes any outstanding query and requests
    /// the current page.
    pub async fn send_and_draw(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        self.dispatch(&mut state);
    }

    /// Moves to the page `event` points at and queries it. Returns `false`
    /// when the move is refused: before the first page, past the largest
    /// representable offset, or forward from a page known to be the last one.
    pub async fn handle_page(self: &Arc<Self>, event: PageEvent) -> bool {
        let mut state = self.state.lock().await;
        let current_page = state.current_page;

        let Some(new_page) = event.target_page(current_page) else {
            debug!(delta = event.page, current_page, "page before first refused");
            return false;
        };

        if new_page > current_page {
            if let Some(row_count) = state.last_row_count {
                if !PageWindow::has_next(self.page_size, row_count) {
                    debug!(
                        delta = event.page,
                        current_page,
                        row_count,
                        page_size = self.page_size,
                        "next page refused, current page is the last"
                    );
                    return false;
                }
            }
        }

        if PageWindow::for_page(self.page_size, new_page).is_none() {
            debug!(delta = event.page, current_page, new_page, "page offset overflows, refused");
            return false;
        }

        debug!(delta = event.page, current_page, new_page, "page accepted");
        state.current_page = new_page;
        self.dispatch(&mut state);
        true
    }

    /// Handler for filter form submissions.
    pub fn bind_form_submit(self: &Arc<Self>) -> FormSubmitHandler {
        FormSubmitHandler {
            controller: Arc::clone(self),
        }
    }

    /// Points the controller at `base_path?<form>` and restarts from page 0.
    pub async fn submit_form(self: &Arc<Self>, form: &FormData) -> Result<(), ControllerError> {
        let url = endpoint_url(&self.origin, &self.base_path, Some(&form.serialize()))?;
        info!(url = %url, "filter submitted");
        {
            let mut state = self.state.lock().await;
            state.query = Query::new(Arc::clone(&self.service), url);
        }
        self.handle_page(PageEvent::first()).await;
        Ok(())
    }

    fn dispatch(self: &Arc<Self>, state: &mut ControllerState) {
        self.widget.set_selection(&[]);
        state.query.abort();

        // current_page only ever moves to pages whose window fits
        let Some(window) = PageWindow::for_page(self.page_size, state.current_page) else {
            warn!(current_page = state.current_page, "page window overflows, query not sent");
            return;
        };
        state.query.set_query(window.clause());
        state.ticket += 1;
        let ticket = state.ticket;

        info!(url = %state.query.url(), clause = %window, "sending page query");
        let controller = Arc::downgrade(self);
        state.query.send(move |result| async move {
            if let Some(controller) = controller.upgrade() {
                controller.handle_result_for(ticket, result).await;
            }
        });
    }

    async fn handle_result_for(&self, ticket: u64, result: QueryResult) {
        let mut state = self.state.lock().await;
        if state.ticket != ticket {
            debug!(ticket, current = state.ticket, "discarding superseded result");
            return;
        }
        self.apply_result(&mut state, result);
    }

    fn apply_result(&self, state: &mut ControllerState, result: QueryResult) {
        state.view = None;

        match result {
            QueryResult::Error(err) => {
                warn!(message = %err.message, detail = %err.detail, "page query failed");
                self.widget
                    .show_error(&err.message, &err.detail, &ErrorDisplayOptions::inline());
            }
            QueryResult::Rows(table) => {
                let mut view = DataView::new(Arc::new(table));
                if let Some(transform) = &self.row_transform {
                    transform(&mut view);
                }
                self.widget
                    .draw(&view, &DrawOptions::event_paged(self.page_size));
                state.last_row_count = Some(view.number_of_rows());
                state.view = Some(view);
            }
        }
    }
}

impl Drop for PagedTableController {
    fn drop(&mut self) {
        if let Some(listener) = self.page_listener.get() {
            listener.abort();
        }
    }
}

/// Submits filter forms to a controller; bound with
/// [`PagedTableController::bind_form_submit`].
#[derive(Clone)]
pub struct FormSubmitHandler {
    controller: Arc<PagedTableController>,
}

impl FormSubmitHandler {
    /// Replaces the controller's query with one for `form` and reloads page 0.
    /// The submission is fully handled here; nothing else should navigate.
    pub async fn submit(&self, form: &FormData) -> Result<(), ControllerError> {
        self.controller.submit_form(form).await
    }
}

async fn forward_page_events(
    controller: Weak<PagedTableController>,
    mut pages: broadcast::Receiver<PageEvent>,
) {
    loop {
        match pages.recv().await {
            Ok(event) => {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                controller.handle_page(event).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "page events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn endpoint_url(origin: &Url, base_path: &str, form: Option<&str>) -> Result<Url, ControllerError> {
    if !base_path.starts_with('/') {
        return Err(ControllerError::RelativeBasePath(base_path.to_string()));
    }

    let origin = origin.origin();
    if !origin.is_tuple() {
        return Err(ControllerError::OpaqueOrigin(origin.ascii_serialization()));
    }

    let mut raw = format!("{}{base_path}", origin.ascii_serialization());
    if let Some(form) = form {
        raw.push('?');
        raw.push_str(form);
    }

    Url::parse(&raw).map_err(|source| ControllerError::InvalidUrl { url: raw, source })
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
