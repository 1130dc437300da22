mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{FakeElement, FakePage, PageState};
use mirage_engine::resolution::{Locator, LocatorStrategy, resolve};

fn strategies(specs: &[(&str, &str)]) -> Vec<LocatorStrategy> {
    specs
        .iter()
        .map(|(name, selector)| LocatorStrategy::new(*name, Locator::css(*selector), 50))
        .collect()
}

fn page_with(elements: &[(&str, FakeElement)]) -> (FakePage, Arc<Mutex<PageState>>) {
    let mut state = PageState::default();
    for (key, el) in elements {
        state.insert(key, el.clone());
    }
    let state = Arc::new(Mutex::new(state));
    (FakePage::new(state.clone()), state)
}

#[tokio::test]
async fn first_match_wins_skips_lower_priority_strategies() {
    let (mut page, state) = page_with(&[
        ("#primary", FakeElement::default()),
        (".fallback", FakeElement::default()),
    ]);
    let list = strategies(&[("primary", "#primary"), ("fallback", ".fallback")]);

    let resolved = resolve(&mut page, "field", &list, Duration::from_secs(5), false)
        .await
        .expect("primary strategy should match");

    assert_eq!(resolved.strategy, "primary");
    let s = state.lock().unwrap();
    assert_eq!(s.queries_of("#primary"), 1);
    assert_eq!(s.queries_of(".fallback"), 0, "lower-priority strategy must not run");
}

#[tokio::test]
async fn falls_through_to_next_strategy_when_first_misses() {
    let (mut page, _state) = page_with(&[(".fallback", FakeElement::default())]);
    let list = strategies(&[("primary", "#primary"), ("fallback", ".fallback")]);

    let resolved = resolve(&mut page, "field", &list, Duration::from_secs(5), false)
        .await
        .expect("fallback should match");

    assert_eq!(resolved.strategy, "fallback");
}

#[tokio::test]
async fn exhausted_strategies_are_enumerated_in_order() {
    let (mut page, _state) = page_with(&[]);
    let list = strategies(&[("a", "#a"), ("b", "#b"), ("c", "#c")]);

    let err = resolve(&mut page, "submit control", &list, Duration::from_secs(5), false)
        .await
        .expect_err("nothing matches");

    assert_eq!(err.target, "submit control");
    assert_eq!(err.attempted, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn disabled_match_fails_that_strategy_not_the_call() {
    let (mut page, _state) = page_with(&[
        ("#disabled", FakeElement::disabled()),
        ("#enabled", FakeElement::default()),
    ]);
    let list = strategies(&[("first", "#disabled"), ("second", "#enabled")]);

    let resolved = resolve(&mut page, "button", &list, Duration::from_secs(5), true)
        .await
        .expect("the enabled match should win");

    assert_eq!(resolved.strategy, "second");
}

#[tokio::test]
async fn disabled_match_is_accepted_when_interactability_not_required() {
    let (mut page, _state) = page_with(&[("#disabled", FakeElement::disabled())]);
    let list = strategies(&[("only", "#disabled")]);

    let resolved = resolve(&mut page, "marker", &list, Duration::from_secs(5), false).await;
    assert!(resolved.is_ok());
}

#[tokio::test]
async fn query_errors_count_against_the_strategy() {
    let (mut page, state) = page_with(&[("#a", FakeElement::default())]);
    state.lock().unwrap().fail_queries = true;
    let list = strategies(&[("a", "#a"), ("b", "#b")]);

    let err = resolve(&mut page, "field", &list, Duration::from_secs(5), false)
        .await
        .expect_err("all queries error");

    assert_eq!(err.attempted, vec!["a", "b"]);
}

#[tokio::test]
async fn hanging_driver_calls_do_not_outlive_the_budget() {
    let (mut page, state) = page_with(&[("#a", FakeElement::default())]);
    state.lock().unwrap().stall_queries = true;
    let list = strategies(&[("a", "#a"), ("b", "#b")]);

    let started = std::time::Instant::now();
    let err = resolve(&mut page, "field", &list, Duration::from_millis(200), false)
        .await
        .expect_err("stalled queries never match");

    assert!(!err.attempted.is_empty());
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "resolution must be bounded even when the driver hangs"
    );
}

#[tokio::test]
async fn element_appearing_within_slice_is_found() {
    let (mut page, _state) = page_with(&[(
        "#late",
        FakeElement {
            appear_after: 2,
            ..FakeElement::default()
        },
    )]);
    let list = vec![LocatorStrategy::new("late", Locator::css("#late"), 2_000)];

    let resolved = resolve(&mut page, "field", &list, Duration::from_secs(5), false)
        .await
        .expect("element appears on the third probe");
    assert_eq!(resolved.strategy, "late");
}
