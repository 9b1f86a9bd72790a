//! Full monitoring cycles over scripted sources and recording channels.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bidwatch::adapters::AdapterRegistry;
use bidwatch::matcher::KeywordMatcher;
use bidwatch::models::{
    AccessMode, BidItem, ContentId, DelayRange, FailurePolicy, FetchStrategy, HttpMethod,
    JsonApiParams, KeywordPolicy, SourceDescriptor, StoredRecord,
};
use bidwatch::notify::{BatchSummary, ChannelError, NotificationChannel, NotificationDispatcher};
use bidwatch::pipeline::{
    CycleEvent, CycleObserver, CycleState, Monitor, NoopObserver, RelevanceError, RelevanceFilter,
    SourceFailure, Verdict,
};
use bidwatch::services::{BlockDetector, BlockSignal, FetchError, FetchExecutor, RawPayload, Target, Transport};
use bidwatch::storage::{BidStore, MemoryStore};
use bidwatch::{AppError, Result};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Transport answering from per-URL scripts; unscripted URLs fail.
#[derive(Default)]
struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<RawPayload, FetchError>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    fn page(self: &Arc<Self>, url: &str, body: &str) -> Arc<Self> {
        self.push(url, Ok(RawPayload::ok(url, body)))
    }

    fn push(
        self: &Arc<Self>,
        url: &str,
        response: std::result::Result<RawPayload, FetchError>,
    ) -> Arc<Self> {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        Arc::clone(self)
    }

    fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        target: &Target,
        _timeout: Duration,
    ) -> std::result::Result<RawPayload, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(target.url.clone())
            .or_default() += 1;

        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.entry(target.url.clone()).or_default();
        match queue.len() {
            0 => Err(FetchError::Transport("connection refused".into())),
            // The last scripted response repeats.
            1 => queue.front().cloned().unwrap(),
            _ => queue.pop_front().unwrap(),
        }
    }
}

/// Channel that records every summary it receives.
struct RecordingChannel {
    name: String,
    fail: bool,
    received: Arc<Mutex<Vec<BatchSummary>>>,
}

impl RecordingChannel {
    fn new(name: &str, fail: bool) -> (Box<dyn NotificationChannel>, Arc<Mutex<Vec<BatchSummary>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let channel = Box::new(Self {
            name: name.to_string(),
            fail,
            received: Arc::clone(&received),
        });
        (channel, received)
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, summary: &BatchSummary) -> std::result::Result<(), ChannelError> {
        self.received.lock().unwrap().push(summary.clone());
        if self.fail {
            return Err(ChannelError::Rejected {
                code: "999".into(),
                message: "rate limited".into(),
            });
        }
        Ok(())
    }
}

fn source(name: &str, url: &str) -> SourceDescriptor {
    let mut source = SourceDescriptor::new(name, url);
    source.max_retries = 2;
    source.delay = DelayRange::ZERO;
    source.backoff_base_ms = 10;
    source
}

fn listing(titles: &[&str]) -> String {
    let links: String = titles
        .iter()
        .enumerate()
        .map(|(i, t)| format!("<li><a href='/notice/{i}-{}.html'>{t}</a></li>", t.len()))
        .collect();
    format!("<html><body><ul>{links}</ul></body></html>")
}

fn policy() -> KeywordPolicy {
    KeywordPolicy::new(["photovoltaic", "solar", "光伏"], Vec::<String>::new(), ["cancelled"])
}

struct Harness {
    monitor: Monitor,
    store: Arc<MemoryStore>,
}

fn harness(
    transport: Arc<ScriptedTransport>,
    sources: Vec<SourceDescriptor>,
    channels: Vec<Box<dyn NotificationChannel>>,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let monitor = Monitor::new(
        sources.clone(),
        AdapterRegistry::from_sources(&sources),
        FetchExecutor::new(transport, BlockDetector::default()),
        KeywordMatcher::new(&policy()),
        store.clone(),
        NotificationDispatcher::new(channels, 10),
    );
    Harness { monitor, store }
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_failing_source_does_not_abort_cycle() {
    let transport = Arc::new(ScriptedTransport::default())
        .page(
            "https://b.example/list",
            &listing(&["Solar farm EPC tender", "Office furniture purchase"]),
        )
        .page("https://c.example/list", &listing(&["光伏电站运维招标公告"]));
    let (channel, received) = RecordingChannel::new("wecom", false);

    let mut h = harness(
        transport.clone(),
        vec![
            source("A", "https://a.example/list"),
            source("B", "https://b.example/list"),
            source("C", "https://c.example/list"),
        ],
        vec![channel],
    );

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(outcome.state, CycleState::Completed);
    assert_eq!(outcome.total_sources, 3);
    assert_eq!(outcome.attempted_sources, 3);
    assert_eq!(outcome.failed_sources.len(), 1);
    assert!(matches!(outcome.failed("A"), Some(SourceFailure::Error(FetchError::Transport(_)))));
    assert_eq!(transport.calls("https://a.example/list"), 2);

    assert_eq!(outcome.new_count, 2);
    assert_eq!(outcome.notified_count, 2);
    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(h.monitor.state(), CycleState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_one_summary_per_channel_per_cycle() {
    let transport = Arc::new(ScriptedTransport::default())
        .page(
            "https://a.example/list",
            &listing(&["Solar tender lot 1", "Solar tender lot 2", "Solar tender lot 3"]),
        )
        .page(
            "https://b.example/list",
            &listing(&["Photovoltaic inverter supply", "Photovoltaic cable supply"]),
        );
    let (pushplus, pushplus_seen) = RecordingChannel::new("pushplus", false);
    let (wecom, wecom_seen) = RecordingChannel::new("wecom", false);

    let mut h = harness(
        transport,
        vec![source("A", "https://a.example/list"), source("B", "https://b.example/list")],
        vec![pushplus, wecom],
    );

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(outcome.new_count, 5);
    for seen in [&pushplus_seen, &wecom_seen] {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].count, 5);
        assert_eq!(seen[0].sources, vec!["A", "B"]);
    }
    assert!(h.store.pending().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_seen_items_are_not_sent_twice() {
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://a.example/list", &listing(&["Solar tender lot 1"]));
    let (channel, received) = RecordingChannel::new("wecom", false);
    let mut h = harness(transport, vec![source("A", "https://a.example/list")], vec![channel]);
    let cancel = CancellationToken::new();

    let first = h.monitor.run_cycle(&cancel, &NoopObserver).await.unwrap();
    let second = h.monitor.run_cycle(&cancel, &NoopObserver).await.unwrap();

    assert_eq!(first.new_count, 1);
    assert_eq!(second.new_count, 0);
    assert_eq!(second.batch_size(), 0);
    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(h.store.len().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_all_channels_failing_keeps_items_pending() {
    let transport = Arc::new(ScriptedTransport::default()).page(
        "https://a.example/list",
        &listing(&["Solar tender lot 1", "Solar tender lot 2"]),
    );
    let (down_a, _) = RecordingChannel::new("pushplus", true);
    let (down_b, _) = RecordingChannel::new("sms", true);
    let mut h = harness(
        transport.clone(),
        vec![source("A", "https://a.example/list")],
        vec![down_a, down_b],
    );

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();
    assert_eq!(outcome.new_count, 2);
    assert_eq!(outcome.notified_count, 0);
    assert!(!outcome.dispatch.any_success());
    assert_eq!(h.store.pending().await.unwrap().len(), 2);

    // Same store, a working channel: the pending items go out again.
    let (up, received) = RecordingChannel::new("wecom", false);
    let sources = vec![source("A", "https://a.example/list")];
    let mut retry = Monitor::new(
        sources.clone(),
        AdapterRegistry::from_sources(&sources),
        FetchExecutor::new(transport, BlockDetector::default()),
        KeywordMatcher::new(&policy()),
        h.store.clone(),
        NotificationDispatcher::new(vec![up], 10),
    );

    let outcome = retry
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();
    assert_eq!(outcome.new_count, 0);
    assert_eq!(outcome.retried_count, 2);
    assert_eq!(outcome.notified_count, 2);
    assert_eq!(received.lock().unwrap()[0].count, 2);
    assert!(h.store.pending().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_first_source() {
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://a.example/list", &listing(&["Solar tender lot 1"]));
    let (channel, received) = RecordingChannel::new("wecom", false);
    let mut h = harness(transport.clone(), vec![source("A", "https://a.example/list")], vec![channel]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = h.monitor.run_cycle(&cancel, &NoopObserver).await.unwrap();

    assert_eq!(outcome.state, CycleState::Cancelled);
    assert_eq!(outcome.attempted_sources, 0);
    assert_eq!(outcome.total_sources, 1);
    assert_eq!(transport.total_calls(), 0);
    assert!(received.lock().unwrap().is_empty());
    assert_eq!(h.monitor.state(), CycleState::Cancelled);
}

/// Cancels the token once the named source has been handled.
struct CancelAfter {
    source: String,
    token: CancellationToken,
    progress: Mutex<Vec<(usize, usize, String)>>,
}

impl CycleObserver for CancelAfter {
    fn on_progress(&self, index: usize, total: usize, name: &str) {
        self.progress
            .lock()
            .unwrap()
            .push((index, total, name.to_string()));
    }

    fn on_event(&self, event: &CycleEvent<'_>) {
        if let CycleEvent::SourceFinished { name, .. } = event {
            if *name == self.source {
                self.token.cancel();
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_cycle_keeps_committed_work() {
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://a.example/list", &listing(&["Solar tender lot 1"]))
        .page("https://b.example/list", &listing(&["Solar tender lot 2"]));
    let (channel, received) = RecordingChannel::new("wecom", false);
    let mut h = harness(
        transport.clone(),
        vec![source("A", "https://a.example/list"), source("B", "https://b.example/list")],
        vec![channel],
    );

    let cancel = CancellationToken::new();
    let observer = CancelAfter {
        source: "A".into(),
        token: cancel.clone(),
        progress: Mutex::new(Vec::new()),
    };
    let outcome = h.monitor.run_cycle(&cancel, &observer).await.unwrap();

    assert_eq!(outcome.state, CycleState::Cancelled);
    assert_eq!(outcome.attempted_sources, 1);
    assert_eq!(outcome.new_count, 1);
    assert_eq!(outcome.notified_count, 1);
    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(transport.calls("https://b.example/list"), 0);
    assert_eq!(
        *observer.progress.lock().unwrap(),
        vec![(1, 2, "A".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_blocked_source_is_not_retried() {
    let challenge = "<html><body>Please complete the CAPTCHA <a href='/solar-1'>Solar tender lot 1</a></body></html>";
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://a.example/list", challenge)
        .page("https://b.example/list", challenge);

    let mut exempt = source("B", "https://b.example/list");
    exempt.block_exempt = vec![AccessMode::Html];
    let (channel, _) = RecordingChannel::new("wecom", false);
    let mut h = harness(
        transport.clone(),
        vec![source("A", "https://a.example/list"), exempt],
        vec![channel],
    );

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(
        outcome.failed("A"),
        Some(&SourceFailure::Blocked(BlockSignal::Marker("captcha".into())))
    );
    assert_eq!(transport.calls("https://a.example/list"), 1);

    assert!(outcome.failed("B").is_none());
    assert_eq!(outcome.new_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_excluded_items_never_reach_the_store() {
    let transport = Arc::new(ScriptedTransport::default()).page(
        "https://a.example/list",
        &listing(&["Solar tender lot 1 (cancelled)", "Wind turbine blade repair"]),
    );
    let (channel, received) = RecordingChannel::new("wecom", false);
    let mut h = harness(transport, vec![source("A", "https://a.example/list")], vec![channel]);

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(outcome.new_count, 0);
    assert_eq!(h.store.len().await.unwrap(), 0);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_source_list() {
    let (channel, received) = RecordingChannel::new("wecom", false);
    let mut h = harness(Arc::new(ScriptedTransport::default()), Vec::new(), vec![channel]);

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(outcome.total_sources, 0);
    assert_eq!(outcome.state, CycleState::Completed);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_parallel_fetch_keeps_configuration_order() {
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://a.example/list", &listing(&["Solar tender lot 1"]))
        .page("https://b.example/list", &listing(&["Solar tender lot 2"]))
        .page("https://c.example/list", &listing(&["Solar tender lot 3"]));
    let (channel, received) = RecordingChannel::new("wecom", false);
    let h = harness(
        transport,
        vec![
            source("A", "https://a.example/list"),
            source("B", "https://b.example/list"),
            source("C", "https://c.example/list"),
        ],
        vec![channel],
    );
    let mut monitor = h.monitor.with_concurrency(3);

    let outcome = monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(outcome.new_count, 3);
    let seen = received.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].sources, vec!["A", "B", "C"]);
}

fn json_source(name: &str, url: &str, items_pointer: &str) -> SourceDescriptor {
    let mut source = source(name, url);
    source.strategy = FetchStrategy::JsonApi(JsonApiParams {
        endpoint: None,
        method: HttpMethod::Get,
        form: Default::default(),
        headers: Default::default(),
        items_pointer: items_pointer.into(),
        success_pointer: Some("/success".into()),
        title_field: "title".into(),
        url_template: "/detail/{id}".into(),
        date_field: Some("publishTime".into()),
        content_field: Some("summary".into()),
    });
    source
}

const JSON_LISTING: &str = r#"{
    "success": true,
    "data": {
        "rows": [
            {"id": 17, "title": "光伏组件采购项目公告", "publishTime": "2026-03-02", "summary": ""},
            {"id": 18, "title": "Canteen renovation", "publishTime": "2026-03-02", "summary": "solar water heater"},
            {"id": 19, "title": "Garden maintenance", "publishTime": "2026-03-03"}
        ]
    }
}"#;

#[tokio::test(start_paused = true)]
async fn test_json_api_source_full_cycle() {
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://api.example/list.do", JSON_LISTING);
    let (channel, received) = RecordingChannel::new("wecom", false);
    let mut h = harness(
        transport,
        vec![json_source("Province", "https://api.example/list.do", "/data/rows")],
        vec![channel],
    );

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert!(outcome.failed_sources.is_empty());
    assert_eq!(outcome.new_count, 2);
    let urls: Vec<_> = received.lock().unwrap()[0]
        .samples
        .iter()
        .map(|s| s.url.clone())
        .collect();
    assert_eq!(
        urls,
        vec!["https://api.example/detail/17", "https://api.example/detail/18"]
    );

    assert_eq!(h.store.pending().await.unwrap().len(), 0);
    assert_eq!(h.store.len().await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_payload_is_not_a_source_failure() {
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://api.example/list.do", JSON_LISTING);
    let (channel, received) = RecordingChannel::new("wecom", false);
    let mut h = harness(
        transport.clone(),
        vec![json_source("Province", "https://api.example/list.do", "/data/missing")],
        vec![channel],
    );

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(outcome.state, CycleState::Completed);
    assert_eq!(outcome.attempted_sources, 1);
    assert!(outcome.failed_sources.is_empty());
    assert_eq!(outcome.new_count, 0);
    assert_eq!(transport.calls("https://api.example/list.do"), 1);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_one_bad_page_does_not_fail_source() {
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://a.example/list?page=2", &listing(&["Solar tender lot 7"]));
    let mut paged = source("A", "https://a.example/list");
    if let FetchStrategy::Html(params) = &mut paged.strategy {
        params.pages = vec!["https://a.example/list?page=2".into()];
    }
    let (channel, _) = RecordingChannel::new("wecom", false);
    let mut h = harness(transport.clone(), vec![paged], vec![channel]);

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert!(outcome.failed("A").is_none());
    assert_eq!(transport.calls("https://a.example/list"), 2);
    assert_eq!(outcome.new_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_same_item_from_two_sources_sent_once() {
    let shared = "<ul><li><a href='https://shared.example/notice/1.html'>Solar tender lot 1</a></li></ul>";
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://a.example/list", shared)
        .page("https://b.example/list", shared);
    let (channel, received) = RecordingChannel::new("wecom", false);
    let mut h = harness(
        transport,
        vec![source("A", "https://a.example/list"), source("B", "https://b.example/list")],
        vec![channel],
    );

    let outcome = h
        .monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(outcome.new_count, 1);
    assert_eq!(outcome.notified_count, 1);
    assert_eq!(received.lock().unwrap()[0].count, 1);
    assert_eq!(h.store.len().await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Relevance and store failures
// ---------------------------------------------------------------------------

/// Approves construction work, rejects anything else.
struct EpcOnlyClassifier;

#[async_trait]
impl RelevanceFilter for EpcOnlyClassifier {
    async fn check(&self, item: &BidItem) -> std::result::Result<Verdict, RelevanceError> {
        let relevant = item.title.contains("EPC");
        Ok(Verdict {
            relevant,
            reason: if relevant { "construction scope" } else { "equipment only" }.into(),
        })
    }
}

/// Collects relevance events as `(kind, title, reason)`.
#[derive(Default)]
struct RelevanceLog(Mutex<Vec<(&'static str, String, String)>>);

impl CycleObserver for RelevanceLog {
    fn on_event(&self, event: &CycleEvent<'_>) {
        let entry = match event {
            CycleEvent::RelevanceApproved { title, reason, .. } => ("approved", title, reason),
            CycleEvent::RelevanceRejected { title, reason, .. } => ("rejected", title, reason),
            _ => return,
        };
        self.0
            .lock()
            .unwrap()
            .push((entry.0, entry.1.to_string(), entry.2.to_string()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_relevance_decisions_are_reported() {
    let transport = Arc::new(ScriptedTransport::default()).page(
        "https://a.example/list",
        &listing(&[
            "Solar farm EPC tender",
            "Solar panel cleaning robots",
            "Office furniture purchase",
        ]),
    );
    let (channel, received) = RecordingChannel::new("wecom", false);
    let h = harness(transport, vec![source("A", "https://a.example/list")], vec![channel]);
    let mut monitor = h
        .monitor
        .with_relevance(Arc::new(EpcOnlyClassifier), FailurePolicy::PassThrough);
    let observer = RelevanceLog::default();

    let outcome = monitor
        .run_cycle(&CancellationToken::new(), &observer)
        .await
        .unwrap();

    assert_eq!(outcome.new_count, 1);
    assert_eq!(received.lock().unwrap()[0].count, 1);

    let stats = &outcome.relevance;
    assert!(stats.checked());
    assert_eq!(stats.keyword_matched, 2);
    assert_eq!(stats.approved.len(), 1);
    assert_eq!(stats.approved[0].title, "Solar farm EPC tender");
    assert_eq!(stats.approved[0].reason, "construction scope");
    assert_eq!(stats.rejected.len(), 1);
    assert_eq!(stats.rejected[0].reason, "equipment only");

    assert_eq!(
        *observer.0.lock().unwrap(),
        vec![
            ("approved", "Solar farm EPC tender".to_string(), "construction scope".to_string()),
            ("rejected", "Solar panel cleaning robots".to_string(), "equipment only".to_string()),
        ]
    );
}

struct UnreachableClassifier;

#[async_trait]
impl RelevanceFilter for UnreachableClassifier {
    async fn check(&self, _item: &BidItem) -> std::result::Result<Verdict, RelevanceError> {
        Err(RelevanceError::Transport("connection refused".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_relevance_failure_policy() {
    for (policy, expected) in [(FailurePolicy::PassThrough, 1), (FailurePolicy::Reject, 0)] {
        let transport = Arc::new(ScriptedTransport::default())
            .page("https://a.example/list", &listing(&["Solar tender lot 1"]));
        let (channel, _) = RecordingChannel::new("wecom", false);
        let h = harness(transport, vec![source("A", "https://a.example/list")], vec![channel]);
        let mut monitor = h.monitor.with_relevance(Arc::new(UnreachableClassifier), policy);

        let outcome = monitor
            .run_cycle(&CancellationToken::new(), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(outcome.new_count, expected, "policy {policy:?}");
        assert_eq!(outcome.relevance.keyword_matched, 1);
        let decisions = if expected == 1 {
            &outcome.relevance.approved
        } else {
            &outcome.relevance.rejected
        };
        assert!(decisions[0].reason.starts_with("check failed"));
    }
}

/// Store whose disk is gone.
struct BrokenStore;

#[async_trait]
impl BidStore for BrokenStore {
    async fn exists(&self, _id: &ContentId) -> Result<bool> {
        Err(AppError::store("disk unavailable"))
    }
    async fn get(&self, _id: &ContentId) -> Result<Option<StoredRecord>> {
        Err(AppError::store("disk unavailable"))
    }
    async fn save(&self, _item: &BidItem) -> Result<StoredRecord> {
        Err(AppError::store("disk unavailable"))
    }
    async fn mark_notified(&self, _ids: &[ContentId]) -> Result<usize> {
        Err(AppError::store("disk unavailable"))
    }
    async fn clear_all(&self) -> Result<usize> {
        Err(AppError::store("disk unavailable"))
    }
    async fn len(&self) -> Result<usize> {
        Err(AppError::store("disk unavailable"))
    }
    async fn pending(&self) -> Result<Vec<StoredRecord>> {
        Err(AppError::store("disk unavailable"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_aborts_cycle() {
    let transport = Arc::new(ScriptedTransport::default())
        .page("https://a.example/list", &listing(&["Solar tender lot 1"]));
    let (channel, received) = RecordingChannel::new("wecom", false);
    let sources = vec![source("A", "https://a.example/list")];
    let mut monitor = Monitor::new(
        sources.clone(),
        AdapterRegistry::from_sources(&sources),
        FetchExecutor::new(transport, BlockDetector::default()),
        KeywordMatcher::new(&policy()),
        Arc::new(BrokenStore),
        NotificationDispatcher::new(vec![channel], 10),
    );

    let err = monitor
        .run_cycle(&CancellationToken::new(), &NoopObserver)
        .await
        .unwrap_err();
    assert!(err.is_store_failure());
    assert_eq!(monitor.state(), CycleState::Idle);
    assert!(received.lock().unwrap().is_empty());
}
