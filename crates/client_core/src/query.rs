use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use shared::protocol::QueryResult;
use tokio::task::JoinHandle;
use url::Url;

/// Executes a query clause against an endpoint.
///
/// Implementations report every failure through [`QueryResult::Error`]; the
/// caller never sees a transport error directly.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn execute(&self, url: &Url, clause: &str) -> QueryResult;
}

/// A query bound to one endpoint URL.
///
/// At most one request is outstanding: [`Query::send`] aborts whatever the
/// previous call started, and dropping the query aborts it as well.
pub struct Query {
    service: Arc<dyn QueryService>,
    url: Url,
    clause: String,
    in_flight: Option<JoinHandle<()>>,
}

impl Query {
    pub fn new(service: Arc<dyn QueryService>, url: Url) -> Self {
        Self {
            service,
            url,
            clause: String::new(),
            in_flight: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn set_query(&mut self, clause: impl Into<String>) {
        self.clause = clause.into();
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn abort(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    /// Runs the current clause in the background and hands the result to
    /// `on_result`. Must be called from within a tokio runtime.
    pub fn send<F, Fut>(&mut self, on_result: F)
    where
        F: FnOnce(QueryResult) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.abort();

        let service = Arc::clone(&self.service);
        let url = self.url.clone();
        let clause = self.clause.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let result = service.execute(&url, &clause).await;
            on_result(result).await;
        }));
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::{mpsc, Mutex};

    use super::*;

    struct RecordingService {
        clauses: Mutex<Vec<String>>,
        hang_first: bool,
    }

    #[async_trait]
    impl QueryService for RecordingService {
        async fn execute(&self, _url: &Url, clause: &str) -> QueryResult {
            let first = {
                let mut clauses = self.clauses.lock().await;
                clauses.push(clause.to_string());
                clauses.len() == 1
            };
            if first && self.hang_first {
                std::future::pending::<()>().await;
            }
            QueryResult::error("done", clause)
        }
    }

    fn endpoint() -> Url {
        Url::parse("http://localhost:8080/articles").expect("url")
    }

    #[tokio::test]
    async fn send_delivers_result_for_current_clause() {
        let service = Arc::new(RecordingService {
            clauses: Mutex::new(Vec::new()),
            hang_first: false,
        });
        let mut query = Query::new(service.clone(), endpoint());
        query.set_query("limit 11 offset 0");

        let (tx, mut rx) = mpsc::unbounded_channel();
        query.send(move |result| async move {
            let _ = tx.send(result);
        });

        let result = rx.recv().await.expect("result");
        assert_eq!(result.detailed_message(), Some("limit 11 offset 0"));
        assert_eq!(query.clause(), "limit 11 offset 0");
    }

    #[tokio::test]
    async fn resending_aborts_previous_request() {
        let service = Arc::new(RecordingService {
            clauses: Mutex::new(Vec::new()),
            hang_first: true,
        });
        let mut query = Query::new(service.clone(), endpoint());
        let (tx, mut rx) = mpsc::unbounded_channel();

        query.set_query("first");
        let first_tx = tx.clone();
        query.send(move |result| async move {
            let _ = first_tx.send(result);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(query.is_in_flight());

        query.set_query("second");
        query.send(move |result| async move {
            let _ = tx.send(result);
        });

        let result = rx.recv().await.expect("result");
        assert_eq!(result.detailed_message(), Some("second"));
        assert!(rx.recv().await.is_none(), "aborted request must not report");
        assert_eq!(*service.clauses.lock().await, vec!["first", "second"]);
    }
}
