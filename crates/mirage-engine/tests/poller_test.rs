mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{FakeElement, FakePage, PageState};
use mirage_engine::poll::{ResultMarker, await_completion};
use mirage_engine::resolution::Locator;

const MARKER_CSS: &str = r#"img[src$=".jpg"]"#;

fn marker() -> ResultMarker {
    ResultMarker {
        locator: Locator::css(MARKER_CSS),
        attribute: "src".into(),
        reject: Some("thumb".into()),
    }
}

fn page() -> (FakePage, Arc<Mutex<PageState>>) {
    let state = Arc::new(Mutex::new(PageState::default()));
    (FakePage::new(state.clone()), state)
}

#[tokio::test]
async fn returns_address_when_marker_appears() {
    let (mut page, state) = page();
    state.lock().unwrap().insert(
        MARKER_CSS,
        FakeElement::with_attr("src", "https://cdn.example/img/abc123.jpg"),
    );

    let found = await_completion(&mut page, &marker(), 10, Duration::ZERO).await;
    assert_eq!(found.as_deref(), Some("https://cdn.example/img/abc123.jpg"));
}

#[tokio::test]
async fn finds_marker_on_fourth_attempt() {
    let (mut page, state) = page();
    state.lock().unwrap().insert(
        MARKER_CSS,
        FakeElement {
            appear_after: 3,
            ..FakeElement::with_attr("src", "https://cdn.example/img/abc123.jpg")
        },
    );

    let found = await_completion(&mut page, &marker(), 300, Duration::ZERO).await;
    assert_eq!(found.as_deref(), Some("https://cdn.example/img/abc123.jpg"));
    assert_eq!(state.lock().unwrap().queries_of(MARKER_CSS), 4);
}

#[tokio::test]
async fn performs_at_most_max_attempts_queries() {
    let (mut page, state) = page();

    let found = await_completion(&mut page, &marker(), 7, Duration::ZERO).await;
    assert_eq!(found, None);
    assert_eq!(state.lock().unwrap().queries_of(MARKER_CSS), 7);
}

#[tokio::test]
async fn zero_attempts_means_zero_queries() {
    let (mut page, state) = page();

    let found = await_completion(&mut page, &marker(), 0, Duration::ZERO).await;
    assert_eq!(found, None);
    assert_eq!(state.lock().unwrap().queries_of(MARKER_CSS), 0);
}

#[tokio::test]
async fn placeholder_addresses_are_not_completions() {
    let (mut page, state) = page();
    state.lock().unwrap().insert(
        MARKER_CSS,
        FakeElement::with_attr("src", "https://cdn.example/thumb/abc123.jpg"),
    );

    let found = await_completion(&mut page, &marker(), 5, Duration::ZERO).await;
    assert_eq!(found, None, "thumbnail address must not count as completed");
    assert_eq!(state.lock().unwrap().queries_of(MARKER_CSS), 5);
}

#[tokio::test]
async fn query_errors_are_not_fatal() {
    let (mut page, state) = page();
    state.lock().unwrap().fail_queries = true;

    let found = await_completion(&mut page, &marker(), 5, Duration::ZERO).await;
    assert_eq!(found, None, "errors are treated as not-yet-found");
    assert_eq!(state.lock().unwrap().queries_of(MARKER_CSS), 5);
}
