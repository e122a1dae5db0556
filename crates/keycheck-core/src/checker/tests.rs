use super::*;
use crate::events::{event_channel, EventReceiver};
use crate::fetch::{CheckRequest, FetchError, PageResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

const NOT_ACTIVATED_HTML: &str =
    r#"<html><body><span style="color: #e24044">Non activée</span></body></html>"#;
const ACTIVATED_HTML: &str =
    r#"<html><body><span style="color: #67c1f5">Activée</span></body></html>"#;

fn page(status: u32, html: &str) -> PageResponse {
    PageResponse {
        status,
        reason: if status == 200 { "OK".into() } else { "Internal Server Error".into() },
        body: html.as_bytes().to_vec(),
    }
}

fn key_of(request: &CheckRequest) -> String {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "cdkey")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// Answers per key; unknown keys get a page without any status marker.
#[derive(Default)]
struct MapFetcher {
    pages: HashMap<String, Result<PageResponse, String>>,
}

impl MapFetcher {
    fn with(mut self, key: &str, answer: Result<PageResponse, String>) -> Self {
        self.pages.insert(key.to_string(), answer);
        self
    }
}

#[async_trait]
impl PageFetcher for MapFetcher {
    async fn fetch(&self, request: &CheckRequest) -> Result<PageResponse, FetchError> {
        match self.pages.get(&key_of(request)) {
            Some(Ok(p)) => Ok(p.clone()),
            Some(Err(e)) => Err(FetchError::Join(e.clone())),
            None => Ok(page(200, "<html><body>nothing here</body></html>")),
        }
    }
}

/// Blocks every request until a permit is released, then answers with the
/// activated page or, when `failure` is set, with that transport error.
struct GatedFetcher {
    entered: Notify,
    gate: Semaphore,
    failure: Option<String>,
}

impl GatedFetcher {
    fn new() -> Self {
        Self {
            entered: Notify::new(),
            gate: Semaphore::new(0),
            failure: None,
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }
}

#[async_trait]
impl PageFetcher for GatedFetcher {
    async fn fetch(&self, _request: &CheckRequest) -> Result<PageResponse, FetchError> {
        self.entered.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| FetchError::Join(e.to_string()))?;
        permit.forget();
        match &self.failure {
            Some(message) => Err(FetchError::Join(message.clone())),
            None => Ok(page(200, ACTIVATED_HTML)),
        }
    }
}

struct PanickingFetcher;

#[async_trait]
impl PageFetcher for PanickingFetcher {
    async fn fetch(&self, request: &CheckRequest) -> Result<PageResponse, FetchError> {
        if key_of(request) == "BOOM" {
            panic!("fetcher exploded");
        }
        Ok(page(200, ACTIVATED_HTML))
    }
}

fn settings(pause: Duration) -> CheckSettings {
    CheckSettings {
        request: RequestTemplate::from_config(&KeycheckConfig::default(), Some("sessionid=test"))
            .unwrap(),
        delay: DelayPolicy::fixed(pause, Duration::from_millis(100)),
    }
}

fn checker<F: PageFetcher>(fetcher: F, pause: Duration) -> (Checker<F>, EventReceiver) {
    let (tx, rx) = event_channel();
    (Checker::new(fetcher, settings(pause), tx), rx)
}

fn keys(values: &[&str]) -> Vec<KeyRecord> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| KeyRecord::new(*v, "key_1", i))
        .collect()
}

fn drain(rx: &mut EventReceiver) -> Vec<CheckerEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

async fn next_event(rx: &mut EventReceiver) -> CheckerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within timeout")
        .expect("channel open")
}

#[tokio::test]
async fn not_activated_then_activated_in_input_order() {
    let fetcher = MapFetcher::default()
        .with("ABCDE-12345-FGHIJ", Ok(page(200, NOT_ACTIVATED_HTML)))
        .with("ZZZZZ-00000-WRONG", Ok(page(200, ACTIVATED_HTML)));
    let (checker, mut rx) = checker(fetcher, Duration::ZERO);

    let outcome = checker
        .run(keys(&["ABCDE-12345-FGHIJ", "ZZZZZ-00000-WRONG"]))
        .await
        .unwrap();

    let statuses: Vec<StatusCode> = outcome.results().iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![StatusCode::NotActivated, StatusCode::Activated]);
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert!(!checker.is_running());

    let events = drain(&mut rx);
    let kinds: Vec<&str> = events.iter().map(CheckerEvent::kind).collect();
    assert_eq!(
        kinds,
        vec!["started", "progress", "keyChecked", "progress", "keyChecked", "completed"]
    );
    assert_eq!(events[0], CheckerEvent::Started { total: 2 });
    assert_eq!(
        events[1],
        CheckerEvent::Progress {
            current: 1,
            total: 2,
            current_key: "ABCDE-1234...".to_string(),
        }
    );
    match &events[5] {
        CheckerEvent::Completed { results } => assert_eq!(results, outcome.results()),
        other => panic!("unexpected terminal event: {other:?}"),
    }
}

#[tokio::test]
async fn per_key_failures_do_not_abort_the_run() {
    let fetcher = MapFetcher::default()
        .with("A", Err("connection refused".into()))
        .with("B", Ok(page(500, "oops")))
        .with("C", Ok(page(200, ACTIVATED_HTML)));
    let (checker, _rx) = checker(fetcher, Duration::ZERO);

    let outcome = checker.run(keys(&["A", "B", "C", "D"])).await.unwrap();
    let results = outcome.results();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].status, StatusCode::Error);
    assert!(results[0]
        .error_detail
        .as_deref()
        .unwrap()
        .contains("connection refused"));
    assert_eq!(results[1].status, StatusCode::Error);
    assert_eq!(
        results[1].error_detail.as_deref(),
        Some("HTTP error: 500 Internal Server Error")
    );
    assert_eq!(results[2].status, StatusCode::Activated);
    assert_eq!(results[3].status, StatusCode::UnknownStatus);
    let rows: Vec<usize> = results.iter().map(|r| r.source_row_index).collect();
    assert_eq!(rows, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn duplicates_are_checked_independently() {
    let fetcher = MapFetcher::default().with("SAME", Ok(page(200, ACTIVATED_HTML)));
    let (checker, _rx) = checker(fetcher, Duration::ZERO);
    let outcome = checker.run(keys(&["SAME", "SAME"])).await.unwrap();
    assert_eq!(outcome.results().len(), 2);
}

#[tokio::test]
async fn empty_input_completes_immediately() {
    let (checker, mut rx) = checker(MapFetcher::default(), Duration::ZERO);
    let outcome = checker.run(Vec::new()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(Vec::new()));
    let kinds: Vec<&str> = drain(&mut rx).iter().map(CheckerEvent::kind).collect();
    assert_eq!(kinds, vec!["started", "completed"]);
}

#[tokio::test]
async fn second_run_while_busy_fails_without_events() {
    let fetcher = Arc::new(GatedFetcher::new());
    let (checker, mut rx) = checker(Arc::clone(&fetcher), Duration::ZERO);

    CheckerPort::start(&checker, keys(&["K1"])).unwrap();
    fetcher.entered.notified().await;
    let before = drain(&mut rx);
    assert_eq!(before.len(), 2, "started + progress: {before:?}");

    assert_eq!(checker.run(keys(&["OTHER"])).await, Err(CheckerError::Busy));
    assert_eq!(
        CheckerPort::start(&checker, keys(&["OTHER"])),
        Err(CheckerError::Busy)
    );
    assert!(drain(&mut rx).is_empty());
    assert!(checker.is_running());

    fetcher.gate.add_permits(1);
    checker.wait_idle().await;
    let after = drain(&mut rx);
    let kinds: Vec<&str> = after.iter().map(CheckerEvent::kind).collect();
    assert_eq!(kinds, vec!["keyChecked", "completed"]);
    assert_eq!(checker.results().len(), 1);
    assert_eq!(checker.results()[0].value, "K1");
}

#[tokio::test(start_paused = true)]
async fn stop_during_delay_is_noticed_within_one_step() {
    let fetcher = MapFetcher::default().with("K1", Ok(page(200, NOT_ACTIVATED_HTML)));
    let (checker, mut rx) = checker(fetcher, Duration::from_secs(3_600));

    let runner = checker.clone();
    let run = tokio::spawn(async move { runner.run(keys(&["K1", "K2", "K3"])).await });

    loop {
        if let CheckerEvent::KeyChecked { .. } = next_event(&mut rx).await {
            break;
        }
    }
    tokio::time::sleep(Duration::from_millis(1_250)).await;

    let stopped_at = tokio::time::Instant::now();
    assert!(checker.stop());
    let outcome = run.await.unwrap().unwrap();
    assert!(stopped_at.elapsed() <= Duration::from_millis(100));

    let RunOutcome::Stopped(results) = outcome else {
        panic!("expected a stopped outcome");
    };
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].value, "K1");
    assert_eq!(results[0].status, StatusCode::NotActivated);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2, "{events:?}");
    for ev in &events {
        assert_eq!(ev, &CheckerEvent::Stopped { results: results.clone() });
    }
    assert!(!checker.is_running());
}

#[tokio::test]
async fn stop_during_fetch_records_the_key_as_stopped() {
    let fetcher = Arc::new(GatedFetcher::new());
    let (checker, mut rx) = checker(Arc::clone(&fetcher), Duration::ZERO);

    CheckerPort::start(&checker, keys(&["K1", "K2"])).unwrap();
    fetcher.entered.notified().await;
    assert!(checker.stop());
    fetcher.gate.add_permits(1);
    checker.wait_idle().await;

    let results = checker.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, StatusCode::Stopped);
    assert!(results[0].error_detail.is_none());

    let kinds: Vec<&str> = drain(&mut rx).iter().map(CheckerEvent::kind).collect();
    assert_eq!(
        kinds,
        vec!["started", "progress", "stopped", "keyChecked", "stopped"]
    );
}

#[tokio::test]
async fn stop_during_failing_fetch_records_the_key_as_stopped() {
    let fetcher = Arc::new(GatedFetcher::failing("connection reset"));
    let (checker, _rx) = checker(Arc::clone(&fetcher), Duration::ZERO);

    CheckerPort::start(&checker, keys(&["K1", "K2"])).unwrap();
    fetcher.entered.notified().await;
    assert!(checker.stop());
    fetcher.gate.add_permits(1);
    checker.wait_idle().await;

    let results = checker.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, StatusCode::Stopped);
    assert!(results[0].error_detail.is_none());
}

#[tokio::test]
async fn stop_when_idle_is_a_noop() {
    let (checker, mut rx) = checker(MapFetcher::default(), Duration::ZERO);
    assert!(!checker.stop());
    assert!(drain(&mut rx).is_empty());
    checker.wait_idle().await;
}

#[tokio::test]
async fn loop_fault_emits_error_and_keeps_partial_results() {
    let (checker, mut rx) = checker(PanickingFetcher, Duration::ZERO);
    let outcome = checker.run(keys(&["OK", "BOOM", "NEVER"])).await.unwrap();

    let RunOutcome::Failed { message, partial } = outcome else {
        panic!("expected a failed outcome");
    };
    assert!(message.contains("fetcher exploded"), "{message}");
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].value, "OK");
    assert!(!checker.is_running());

    let events = drain(&mut rx);
    assert_eq!(events.last(), Some(&CheckerEvent::Error { message }));
    assert!(events.iter().all(|e| !matches!(e, CheckerEvent::Completed { .. })));

    // The guard was released, so a new run is accepted.
    let again = checker.run(keys(&["OK"])).await.unwrap();
    assert_eq!(again.results().len(), 1);
}

#[tokio::test]
async fn new_run_clears_previous_results() {
    let (checker, _rx) = checker(MapFetcher::default(), Duration::ZERO);
    checker.run(keys(&["A", "B"])).await.unwrap();
    assert_eq!(checker.results().len(), 2);
    checker.run(keys(&["C"])).await.unwrap();
    assert_eq!(checker.results().len(), 1);
    assert_eq!(checker.results()[0].value, "C");
}

#[test]
fn panic_message_handles_str_and_string() {
    let payload: Box<dyn Any + Send> = Box::new("static");
    assert_eq!(panic_message(payload.as_ref()), "static");
    let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
    assert_eq!(panic_message(payload.as_ref()), "owned");
    let payload: Box<dyn Any + Send> = Box::new(7_u8);
    assert_eq!(panic_message(payload.as_ref()), "unknown panic");
}
