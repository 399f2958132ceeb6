use std::collections::VecDeque;

use super::*;
use async_trait::async_trait;
use serde_json::json;
use shared::protocol::{ColumnSpec, ColumnType, DataTable};
use tokio::sync::mpsc;

use crate::widget::{PagingButtons, PagingMode, SortMode};

enum Reply {
    Result(QueryResult),
    Hang,
}

struct ScriptedService {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<(Url, String)>>,
}

impl ScriptedService {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    async fn calls(&self) -> Vec<(Url, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl QueryService for ScriptedService {
    async fn execute(&self, url: &Url, clause: &str) -> QueryResult {
        self.calls
            .lock()
            .await
            .push((url.clone(), clause.to_string()));
        let reply = self.replies.lock().await.pop_front();
        match reply {
            Some(Reply::Result(result)) => result,
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => QueryResult::error("script exhausted", clause),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum WidgetCall {
    Selection(Vec<usize>),
    Draw {
        rows: usize,
        columns: usize,
        options: DrawOptions,
    },
    Error {
        message: String,
        detail: String,
        tooltip: bool,
    },
}

struct RecordingWidget {
    calls: mpsc::UnboundedSender<WidgetCall>,
    pages: broadcast::Sender<PageEvent>,
}

impl RecordingWidget {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<WidgetCall>) {
        let (calls, rx) = mpsc::unbounded_channel();
        let (pages, _) = broadcast::channel(16);
        (Arc::new(Self { calls, pages }), rx)
    }

    fn click(&self, event: PageEvent) {
        let _ = self.pages.send(event);
    }
}

impl TableWidget for RecordingWidget {
    fn draw(&self, view: &DataView, options: &DrawOptions) {
        let _ = self.calls.send(WidgetCall::Draw {
            rows: view.number_of_rows(),
            columns: view.number_of_columns(),
            options: options.clone(),
        });
    }

    fn set_selection(&self, rows: &[usize]) {
        let _ = self.calls.send(WidgetCall::Selection(rows.to_vec()));
    }

    fn show_error(&self, message: &str, detail: &str, options: &ErrorDisplayOptions) {
        let _ = self.calls.send(WidgetCall::Error {
            message: message.to_string(),
            detail: detail.to_string(),
            tooltip: options.show_in_tooltip,
        });
    }

    fn subscribe_pages(&self) -> broadcast::Receiver<PageEvent> {
        self.pages.subscribe()
    }
}

fn rows(count: usize) -> QueryResult {
    let mut table = DataTable::with_columns(vec![
        ColumnSpec::new("number", "Number", ColumnType::Number),
        ColumnSpec::new("subject", "Subject", ColumnType::String),
    ]);
    for n in 0..count {
        table.push_row(vec![json!(n), json!(format!("article {n}"))]);
    }
    QueryResult::Rows(table)
}

fn origin() -> Url {
    Url::parse("http://indexer.local:8080/some/page.html").expect("origin")
}

fn controller(
    service: Arc<ScriptedService>,
    widget: Arc<RecordingWidget>,
) -> Arc<PagedTableController> {
    PagedTableController::create(&origin(), "/articles", service, widget, None)
        .expect("controller")
}

/// Next draw or error, skipping selection resets.
async fn next_render(rx: &mut mpsc::UnboundedReceiver<WidgetCall>) -> WidgetCall {
    loop {
        match rx.recv().await.expect("widget call") {
            WidgetCall::Selection(_) => continue,
            call => return call,
        }
    }
}

fn assert_no_dispatch(rx: &mut mpsc::UnboundedReceiver<WidgetCall>) {
    assert!(rx.try_recv().is_err(), "no query should have been sent");
}

/// Sends the first page and waits until it is drawn.
async fn load_first_page(
    controller: &Arc<PagedTableController>,
    rx: &mut mpsc::UnboundedReceiver<WidgetCall>,
) -> WidgetCall {
    controller.send_and_draw().await;
    next_render(rx).await
}

#[tokio::test]
async fn create_does_not_query() {
    let service = ScriptedService::new(vec![]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);

    assert_eq!(controller.page_size(), 100);
    assert_eq!(controller.current_page().await, 0);
    assert_eq!(controller.last_row_count().await, None);
    assert_eq!(
        controller.query_url().await.as_str(),
        "http://indexer.local:8080/articles"
    );
    tokio::task::yield_now().await;
    assert_no_dispatch(&mut rx);
    assert!(service.calls().await.is_empty());
}

#[tokio::test]
async fn send_and_draw_clears_selection_and_requests_look_ahead_window() {
    let service = ScriptedService::new(vec![Reply::Result(rows(101))]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);

    controller.send_and_draw().await;
    assert_eq!(rx.recv().await, Some(WidgetCall::Selection(vec![])));

    let WidgetCall::Draw { rows, options, .. } = next_render(&mut rx).await else {
        panic!("expected draw");
    };
    assert_eq!(rows, 101);
    assert_eq!(options.paging, PagingMode::Event);
    assert_eq!(options.sort, SortMode::Disable);
    assert_eq!(options.paging_buttons, PagingButtons::Both);
    assert_eq!(options.page_size, 100);
    assert!(!options.show_row_number);

    let calls = service.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "limit 101 offset 0");
    assert_eq!(controller.last_row_count().await, Some(101));
}

#[tokio::test]
async fn next_after_full_page_is_accepted() {
    let service = ScriptedService::new(vec![
        Reply::Result(rows(101)),
        Reply::Result(rows(30)),
    ]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);
    load_first_page(&controller, &mut rx).await;

    assert!(controller.handle_page(PageEvent::next()).await);
    assert_eq!(controller.current_page().await, 1);
    assert_eq!(controller.current_clause().await, "limit 101 offset 100");

    let WidgetCall::Draw { rows, .. } = next_render(&mut rx).await else {
        panic!("expected draw");
    };
    assert_eq!(rows, 30);
    assert_eq!(service.calls().await[1].1, "limit 101 offset 100");
}

#[tokio::test]
async fn next_after_short_page_is_rejected() {
    let service = ScriptedService::new(vec![Reply::Result(rows(50))]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);
    load_first_page(&controller, &mut rx).await;

    assert!(!controller.handle_page(PageEvent::next()).await);
    assert_eq!(controller.current_page().await, 0);
    assert_no_dispatch(&mut rx);
    assert_eq!(service.calls().await.len(), 1);
}

#[tokio::test]
async fn next_after_exactly_one_page_is_rejected() {
    let service = ScriptedService::new(vec![Reply::Result(rows(100))]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service, widget);
    load_first_page(&controller, &mut rx).await;

    assert!(!controller.handle_page(PageEvent::next()).await);
    assert_eq!(controller.current_page().await, 0);
}

#[tokio::test]
async fn previous_from_first_page_is_rejected() {
    let service = ScriptedService::new(vec![]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service, widget);

    assert!(!controller.handle_page(PageEvent::previous()).await);
    assert!(!controller.handle_page(PageEvent::new(-5)).await);
    assert_eq!(controller.current_page().await, 0);
    assert_no_dispatch(&mut rx);
}

#[tokio::test]
async fn accepted_next_moves_exactly_one_page() {
    let replies = (0..6).map(|_| Reply::Result(rows(101))).collect();
    let service = ScriptedService::new(replies);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);
    load_first_page(&controller, &mut rx).await;

    for expected in 1..=5 {
        assert!(controller.handle_page(PageEvent::next()).await);
        assert_eq!(controller.current_page().await, expected);
        next_render(&mut rx).await;
    }

    let offsets: Vec<String> = service.calls().await.into_iter().map(|(_, c)| c).collect();
    assert_eq!(offsets[5], "limit 101 offset 500");
}

#[tokio::test]
async fn previous_moves_back_without_row_count_check() {
    let service = ScriptedService::new(vec![
        Reply::Result(rows(101)),
        Reply::Result(rows(7)),
        Reply::Result(rows(101)),
    ]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);
    load_first_page(&controller, &mut rx).await;
    assert!(controller.handle_page(PageEvent::next()).await);
    next_render(&mut rx).await;

    assert!(controller.handle_page(PageEvent::previous()).await);
    assert_eq!(controller.current_page().await, 0);
    assert_eq!(controller.current_clause().await, "limit 101 offset 0");
}

#[tokio::test]
async fn zero_delta_resets_to_first_page_and_queries() {
    let service = ScriptedService::new(vec![
        Reply::Result(rows(101)),
        Reply::Result(rows(101)),
        Reply::Result(rows(12)),
        Reply::Result(rows(101)),
    ]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);
    load_first_page(&controller, &mut rx).await;
    for _ in 0..2 {
        assert!(controller.handle_page(PageEvent::next()).await);
        next_render(&mut rx).await;
    }
    assert_eq!(controller.current_page().await, 2);
    assert_eq!(service.calls().await[2].1, "limit 101 offset 200");

    assert!(controller.handle_page(PageEvent::first()).await);
    assert_eq!(controller.current_page().await, 0);
    next_render(&mut rx).await;
    assert_eq!(service.calls().await[3].1, "limit 101 offset 0");
}

#[tokio::test]
async fn zero_delta_queries_even_on_last_page() {
    let service = ScriptedService::new(vec![Reply::Result(rows(3)), Reply::Result(rows(3))]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);
    load_first_page(&controller, &mut rx).await;

    assert!(controller.handle_page(PageEvent::first()).await);
    next_render(&mut rx).await;
    assert_eq!(service.calls().await.len(), 2);
}

#[tokio::test]
async fn error_is_shown_inline_and_keeps_page_state() {
    let service = ScriptedService::new(vec![
        Reply::Result(rows(101)),
        Reply::Result(QueryResult::error("Invalid query", "bad offset")),
    ]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service, widget);
    load_first_page(&controller, &mut rx).await;

    controller.send_and_draw().await;
    assert_eq!(
        next_render(&mut rx).await,
        WidgetCall::Error {
            message: "Invalid query".into(),
            detail: "bad offset".into(),
            tooltip: false,
        }
    );
    assert_eq!(controller.current_page().await, 0);
    assert_eq!(controller.visible_rows().await, None);
    assert_eq!(controller.last_row_count().await, Some(101));

    assert!(controller.handle_page(PageEvent::next()).await);
    assert_eq!(controller.current_page().await, 1);
}

#[tokio::test]
async fn error_after_short_page_still_blocks_next() {
    let service = ScriptedService::new(vec![
        Reply::Result(rows(50)),
        Reply::Result(QueryResult::error("Request failed", "connection reset")),
    ]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service, widget);
    load_first_page(&controller, &mut rx).await;
    controller.send_and_draw().await;
    assert!(matches!(next_render(&mut rx).await, WidgetCall::Error { .. }));

    assert!(!controller.handle_page(PageEvent::next()).await);
    assert_eq!(controller.current_page().await, 0);
    assert_no_dispatch(&mut rx);
}

#[tokio::test]
async fn error_before_any_rows_leaves_next_unrestricted() {
    let service = ScriptedService::new(vec![
        Reply::Result(QueryResult::error("Request failed", "timeout")),
        Reply::Result(rows(1)),
    ]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service, widget);
    load_first_page(&controller, &mut rx).await;

    assert_eq!(controller.last_row_count().await, None);
    assert!(controller.handle_page(PageEvent::next()).await);
}

#[tokio::test]
async fn form_submit_resets_page_and_targets_form_url() {
    let service = ScriptedService::new(vec![
        Reply::Result(rows(101)),
        Reply::Result(rows(101)),
        Reply::Result(rows(4)),
    ]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);
    load_first_page(&controller, &mut rx).await;
    assert!(controller.handle_page(PageEvent::next()).await);
    next_render(&mut rx).await;

    let handler = controller.bind_form_submit();
    let form = FormData::new()
        .field("group", "alt.binaries.test")
        .field("subject", "linux iso");
    handler.submit(&form).await.expect("submit");

    assert_eq!(controller.current_page().await, 0);
    let WidgetCall::Draw { rows, .. } = next_render(&mut rx).await else {
        panic!("expected draw");
    };
    assert_eq!(rows, 4);

    let calls = service.calls().await;
    let (url, clause) = &calls[2];
    assert_eq!(
        url.as_str(),
        "http://indexer.local:8080/articles?group=alt.binaries.test&subject=linux+iso"
    );
    assert_eq!(clause, "limit 101 offset 0");
    assert_eq!(controller.query_url().await, *url);
}

#[tokio::test]
async fn superseded_query_never_reaches_widget() {
    let service = ScriptedService::new(vec![Reply::Hang, Reply::Result(rows(9))]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget);

    controller.send_and_draw().await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(controller.handle_page(PageEvent::first()).await);

    let WidgetCall::Draw { rows, .. } = next_render(&mut rx).await else {
        panic!("expected draw");
    };
    assert_eq!(rows, 9);
    assert_eq!(service.calls().await.len(), 2);
}

#[tokio::test]
async fn stale_ticket_result_is_discarded() {
    let service = ScriptedService::new(vec![Reply::Result(rows(101))]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service, widget);
    load_first_page(&controller, &mut rx).await;

    controller.handle_result_for(0, rows(2)).await;
    assert_no_dispatch(&mut rx);
    assert_eq!(controller.last_row_count().await, Some(101));
}

#[tokio::test]
async fn handle_result_applies_row_transform_to_fresh_view() {
    let service = ScriptedService::new(vec![]);
    let (widget, mut rx) = RecordingWidget::new();
    let transform: RowTransform = Arc::new(|view: &mut DataView| {
        view.hide_column_ids(&["number"]);
        view.set_rows(0..2);
    });
    let controller =
        PagedTableController::create(&origin(), "/articles", service, widget, Some(transform))
            .expect("controller");

    controller.handle_result(rows(101)).await;
    assert_eq!(
        next_render(&mut rx).await,
        WidgetCall::Draw {
            rows: 2,
            columns: 1,
            options: DrawOptions::event_paged(100),
        }
    );
    assert_eq!(controller.visible_rows().await, Some(2));
    assert_eq!(controller.last_row_count().await, Some(2));
}

#[tokio::test]
async fn rows_filtered_by_transform_do_not_license_next() {
    let service = ScriptedService::new(vec![Reply::Result(rows(101))]);
    let (widget, mut rx) = RecordingWidget::new();
    let transform: RowTransform = Arc::new(|view: &mut DataView| view.set_rows(0..50));
    let controller = PagedTableController::create(
        &origin(),
        "/articles",
        service.clone(),
        widget,
        Some(transform),
    )
    .expect("controller");
    load_first_page(&controller, &mut rx).await;

    assert_eq!(controller.visible_rows().await, Some(50));
    assert_eq!(controller.last_row_count().await, Some(50));
    assert!(!controller.handle_page(PageEvent::next()).await);
    assert_eq!(controller.current_page().await, 0);
    assert_no_dispatch(&mut rx);
    assert_eq!(service.calls().await.len(), 1);
}

#[tokio::test]
async fn widget_page_events_drive_navigation() {
    let service = ScriptedService::new(vec![
        Reply::Result(rows(101)),
        Reply::Result(rows(101)),
    ]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = controller(service.clone(), widget.clone());
    load_first_page(&controller, &mut rx).await;

    widget.click(PageEvent::next());
    next_render(&mut rx).await;

    assert_eq!(controller.current_page().await, 1);
    assert_eq!(service.calls().await[1].1, "limit 101 offset 100");
}

#[tokio::test]
async fn custom_page_size_shapes_window() {
    let service = ScriptedService::new(vec![Reply::Result(rows(11)), Reply::Result(rows(11))]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = PagedTableController::create_with_page_size(
        &origin(),
        "/articles",
        service.clone(),
        widget,
        None,
        10,
    )
    .expect("controller");
    load_first_page(&controller, &mut rx).await;

    assert!(controller.handle_page(PageEvent::next()).await);
    next_render(&mut rx).await;
    assert_eq!(service.calls().await[1].1, "limit 11 offset 10");
}

#[tokio::test]
async fn page_past_largest_offset_is_rejected() {
    let page_size = usize::MAX / 2;
    let service = ScriptedService::new(vec![Reply::Hang, Reply::Hang]);
    let (widget, mut rx) = RecordingWidget::new();
    let controller = PagedTableController::create_with_page_size(
        &origin(),
        "/articles",
        service.clone(),
        widget,
        None,
        page_size,
    )
    .expect("controller");

    assert!(controller.handle_page(PageEvent::next()).await);
    assert!(controller.handle_page(PageEvent::next()).await);
    assert_eq!(
        controller.current_clause().await,
        format!("limit {} offset {}", page_size + 1, page_size * 2)
    );
    while rx.try_recv().is_ok() {}

    assert!(!controller.handle_page(PageEvent::next()).await);
    assert_eq!(controller.current_page().await, 2);
    assert_no_dispatch(&mut rx);
}

#[tokio::test]
async fn rejects_invalid_construction() {
    let (widget, _rx) = RecordingWidget::new();

    let err = PagedTableController::create(
        &origin(),
        "articles",
        ScriptedService::new(vec![]),
        widget.clone(),
        None,
    )
    .err()
    .expect("relative path");
    assert!(matches!(err, ControllerError::RelativeBasePath(_)));

    let err = PagedTableController::create(
        &Url::parse("data:text/plain,hello").expect("url"),
        "/articles",
        ScriptedService::new(vec![]),
        widget.clone(),
        None,
    )
    .err()
    .expect("opaque origin");
    assert!(matches!(err, ControllerError::OpaqueOrigin(_)));

    let err = PagedTableController::create_with_page_size(
        &origin(),
        "/articles",
        ScriptedService::new(vec![]),
        widget.clone(),
        None,
        0,
    )
    .err()
    .expect("zero page size");
    assert!(matches!(err, ControllerError::ZeroPageSize));

    let err = PagedTableController::create_with_page_size(
        &origin(),
        "/articles",
        ScriptedService::new(vec![]),
        widget,
        None,
        usize::MAX,
    )
    .err()
    .expect("oversized page");
    assert!(matches!(err, ControllerError::PageSizeTooLarge(size) if size == usize::MAX));
}
