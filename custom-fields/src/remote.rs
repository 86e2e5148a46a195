//! Remote option source: debounced, superseding option queries.
//!
//! A field asks for options with [`OptionSource::query`]. Each call restarts
//! the debounce window; only the call still standing when the window elapses
//! is sent. Every sent query gets a session token from a monotonically
//! increasing counter, and a completed query is applied only if its token is
//! still the newest one initiated. Arrival order is irrelevant.
//!
//! Failures never leave this module: they are logged and applied as an empty
//! option list.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::config::ApiConfig;
use crate::error::{FieldsError, Result};
use crate::normalizer::lock;
use crate::types::FieldOption;

/// Header carrying the host-supplied request token
pub const NONCE_HEADER: &str = "X-WP-Nonce";

/// One option query: where it goes, the field configuration, the search text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionQuery {
    pub endpoint: String,
    pub config: Map<String, Value>,
    pub search: String,
}

impl OptionQuery {
    pub fn new(endpoint: impl Into<String>, config: Map<String, Value>, search: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            search: search.into(),
        }
    }

    /// Request body: the field configuration plus `search`.
    pub fn payload(&self) -> Value {
        let mut body = self.config.clone();
        body.insert("search".to_string(), Value::String(self.search.clone()));
        Value::Object(body)
    }
}

/// Fetches options for a query.
#[async_trait]
pub trait OptionFetcher: Send + Sync {
    async fn fetch(&self, query: &OptionQuery) -> Result<Vec<FieldOption>>;
}

/// Fetcher that POSTs queries to `{api.url}/{endpoint}`.
#[derive(Debug, Clone)]
pub struct HttpOptionFetcher {
    client: Client,
    api: ApiConfig,
}

impl HttpOptionFetcher {
    pub fn new(api: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            api,
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.api.url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl OptionFetcher for HttpOptionFetcher {
    #[instrument(skip(self, query), fields(endpoint = %query.endpoint, search = %query.search))]
    async fn fetch(&self, query: &OptionQuery) -> Result<Vec<FieldOption>> {
        let url = self.endpoint_url(&query.endpoint);
        let response = self
            .client
            .post(&url)
            .header(NONCE_HEADER, &self.api.nonce)
            .json(&query.payload())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FieldsError::remote_fetch(
                &query.endpoint,
                format!("status {}", status.as_u16()),
            ));
        }

        let options: Vec<FieldOption> = response.json().await?;
        debug!(count = options.len(), "fetched options");
        Ok(options)
    }
}

/// Latest applied fetch result.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    /// Token of the newest initiated session
    pub initiated: u64,
    /// Token of the session whose result is shown, 0 before any result
    pub applied: u64,
    pub options: Vec<FieldOption>,
    /// The query that produced `options`
    pub query: Option<OptionQuery>,
}

struct Shared {
    state: Mutex<FetchState>,
    applied_tx: watch::Sender<u64>,
}

impl Shared {
    fn next_session(&self) -> u64 {
        let mut state = lock(&self.state);
        state.initiated += 1;
        state.initiated
    }

    fn apply(&self, token: u64, query: OptionQuery, options: Vec<FieldOption>) {
        let mut state = lock(&self.state);
        if token != state.initiated {
            debug!(
                token,
                newest = state.initiated,
                "dropping result of superseded option query"
            );
            return;
        }
        state.applied = token;
        state.options = options;
        state.query = Some(query);
        drop(state);
        self.applied_tx.send_replace(token);
    }
}

/// Debounced option source owned by one field instance.
///
/// Needs a tokio runtime to send queries; without one, queries are skipped
/// and the option list stays as it is.
pub struct OptionSource {
    fetcher: Arc<dyn OptionFetcher>,
    debounce: Duration,
    shared: Arc<Shared>,
    timer: Option<JoinHandle<()>>,
    last_query: Option<OptionQuery>,
}

impl OptionSource {
    pub fn new(fetcher: Arc<dyn OptionFetcher>, debounce: Duration) -> Self {
        let (applied_tx, _) = watch::channel(0);
        Self {
            fetcher,
            debounce,
            shared: Arc::new(Shared {
                state: Mutex::new(FetchState::default()),
                applied_tx,
            }),
            timer: None,
            last_query: None,
        }
    }

    /// Schedule `query` after the debounce window, discarding any query still
    /// waiting in the window.
    pub fn query(&mut self, query: OptionQuery) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if tokio::runtime::Handle::try_current().is_err() {
            debug!(endpoint = %query.endpoint, "no runtime, skipping option query");
            return;
        }
        self.last_query = Some(query.clone());

        let fetcher = self.fetcher.clone();
        let shared = self.shared.clone();
        let debounce = self.debounce;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            start_session(&shared, fetcher, query);
        }));
    }

    /// Schedule `query` only if it differs from the last scheduled one.
    pub fn query_if_changed(&mut self, query: OptionQuery) {
        if self.last_query.as_ref() != Some(&query) {
            self.query(query);
        }
    }

    /// Send `query` right away, bypassing the debounce window.
    ///
    /// The returned handle completes once the result has been applied or
    /// dropped as superseded. `None` when there is no runtime to send from.
    pub fn query_now(&mut self, query: OptionQuery) -> Option<JoinHandle<()>> {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if tokio::runtime::Handle::try_current().is_err() {
            debug!(endpoint = %query.endpoint, "no runtime, skipping option query");
            return None;
        }
        self.last_query = Some(query.clone());
        Some(start_session(&self.shared, self.fetcher.clone(), query))
    }

    pub fn options(&self) -> Vec<FieldOption> {
        lock(&self.shared.state).options.clone()
    }

    pub fn state(&self) -> FetchState {
        lock(&self.shared.state).clone()
    }

    /// Receiver that observes the token of each applied session.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.applied_tx.subscribe()
    }
}

impl Drop for OptionSource {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

fn start_session(
    shared: &Arc<Shared>,
    fetcher: Arc<dyn OptionFetcher>,
    query: OptionQuery,
) -> JoinHandle<()> {
    let token = shared.next_session();
    debug!(token, endpoint = %query.endpoint, search = %query.search, "option query started");
    let shared = shared.clone();
    tokio::spawn(async move {
        let options = match fetcher.fetch(&query).await {
            Ok(options) => options,
            Err(e) => {
                warn!(token, endpoint = %query.endpoint, error = %e, "option query failed, showing no options");
                Vec::new()
            }
        };
        shared.apply(token, query, options);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::oneshot;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query(search: &str) -> OptionQuery {
        let mut config = Map::new();
        config.insert("post_type".into(), Value::from("page"));
        OptionQuery::new("posts", config, search)
    }

    /// Records every query and answers with one option named after the search.
    #[derive(Default)]
    struct RecordingFetcher {
        calls: Mutex<Vec<OptionQuery>>,
    }

    #[async_trait]
    impl OptionFetcher for RecordingFetcher {
        async fn fetch(&self, query: &OptionQuery) -> Result<Vec<FieldOption>> {
            self.calls.lock().unwrap().push(query.clone());
            Ok(vec![FieldOption::new(query.search.clone(), query.search.clone())])
        }
    }

    /// Holds each query until the test releases it.
    #[derive(Default)]
    struct GatedFetcher {
        gates: Mutex<HashMap<String, oneshot::Receiver<Vec<FieldOption>>>>,
    }

    impl GatedFetcher {
        fn gate(&self, search: &str) -> oneshot::Sender<Vec<FieldOption>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(search.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl OptionFetcher for GatedFetcher {
        async fn fetch(&self, query: &OptionQuery) -> Result<Vec<FieldOption>> {
            let gate = self.gates.lock().unwrap().remove(&query.search);
            match gate {
                Some(rx) => rx
                    .await
                    .map_err(|_| FieldsError::remote_fetch(&query.endpoint, "gate dropped")),
                None => Ok(Vec::new()),
            }
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl OptionFetcher for FailingFetcher {
        async fn fetch(&self, query: &OptionQuery) -> Result<Vec<FieldOption>> {
            Err(FieldsError::remote_fetch(&query.endpoint, "connection refused"))
        }
    }

    #[test]
    fn test_payload_merges_search_into_config() {
        let payload = query("hello").payload();
        assert_eq!(payload["post_type"], "page");
        assert_eq!(payload["search"], "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_inside_window_sends_one_query_with_last_arguments() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let mut source = OptionSource::new(fetcher.clone(), Duration::from_millis(400));

        for search in ["h", "he", "hel", "hell", "hello"] {
            source.query(query(search));
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        assert!(fetcher.calls.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;

        let calls = fetcher.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].search, "hello");
        assert_eq!(source.options()[0].key(), "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_windows_each_send() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let mut source = OptionSource::new(fetcher.clone(), Duration::from_millis(400));

        source.query(query("a"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        source.query(query("b"));
        tokio::time::sleep(Duration::from_millis(500)).await;

        let searches: Vec<_> = fetcher
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.search.clone())
            .collect();
        assert_eq!(searches, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_last_initiated_wins_over_last_completed() {
        let fetcher = Arc::new(GatedFetcher::default());
        let release_a = fetcher.gate("a");
        let release_b = fetcher.gate("b");
        let mut source = OptionSource::new(fetcher.clone(), Duration::from_millis(400));

        let a = source.query_now(query("a")).unwrap();
        let b = source.query_now(query("b")).unwrap();

        release_b.send(vec![FieldOption::new("b1", "B")]).unwrap();
        b.await.unwrap();
        release_a.send(vec![FieldOption::new("a1", "A")]).unwrap();
        a.await.unwrap();

        let state = source.state();
        assert_eq!(state.initiated, 2);
        assert_eq!(state.applied, 2);
        assert_eq!(state.options, vec![FieldOption::new("b1", "B")]);
        assert_eq!(state.query.unwrap().search, "b");
    }

    #[tokio::test]
    async fn test_failure_collapses_to_empty_options() {
        let mut source = OptionSource::new(Arc::new(RecordingFetcher::default()), Duration::ZERO);
        source.query_now(query("x")).unwrap().await.unwrap();
        assert_eq!(source.options().len(), 1);

        source.fetcher = Arc::new(FailingFetcher);
        let mut applied = source.subscribe();
        source.query_now(query("y")).unwrap().await.unwrap();
        assert!(source.options().is_empty());
        assert_eq!(*applied.borrow_and_update(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_source_discards_pending_query() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let mut source = OptionSource::new(fetcher.clone(), Duration::from_millis(400));
        source.query(query("gone"));
        drop(source);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_query_without_runtime_is_skipped() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let mut source = OptionSource::new(fetcher.clone(), Duration::from_millis(10));
        source.query(query("offline"));
        assert!(source.options().is_empty());
        assert!(source.query_now(query("offline")).is_none());
        assert_eq!(source.state().initiated, 0);
    }

    #[test]
    fn test_query_skipped_without_runtime_is_sent_once_one_exists() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let mut source = OptionSource::new(fetcher.clone(), Duration::from_millis(10));
        source.query(query("later"));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();
        runtime.block_on(async {
            source.query_if_changed(query("later"));
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        let calls = fetcher.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].search, "later");
        assert_eq!(source.options()[0].key(), "later");
    }

    #[tokio::test]
    async fn test_http_fetcher_posts_config_and_nonce() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wcf/v1/posts"))
            .and(header(NONCE_HEADER, "abc123"))
            .and(body_partial_json(serde_json::json!({
                "post_type": "page",
                "search": "news",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"value": 12, "label": "<b>News</b>", "excerpt": "Latest"},
                {"value": "13", "label": "Archive"},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpOptionFetcher::new(ApiConfig {
            url: format!("{}/wcf/v1/", server.uri()),
            nonce: "abc123".into(),
        });
        let options = fetcher.fetch(&query("news")).await.unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].key(), "12");
        assert_eq!(options[0].excerpt.as_ref().unwrap().as_str(), "Latest");
        assert_eq!(options[1].excerpt, None);
    }

    #[tokio::test]
    async fn test_http_fetcher_non_success_is_error_and_source_shows_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let fetcher = Arc::new(HttpOptionFetcher::new(ApiConfig {
            url: server.uri(),
            nonce: "stale".into(),
        }));
        let err = fetcher.fetch(&query("x")).await.unwrap_err();
        assert!(err.to_string().contains("403"));

        let mut source = OptionSource::new(fetcher, Duration::ZERO);
        source.query_now(query("x")).unwrap().await.unwrap();
        assert!(source.options().is_empty());
    }
}
