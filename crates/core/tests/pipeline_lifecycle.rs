//! Pipeline lifecycle integration tests.
//!
//! These tests run the automation pipeline against the mock controller,
//! browser and recorder:
//! - Successful runs and what they record
//! - Failure at a step stops the run and still cleans up
//! - Content loading limits
//! - Panicking steps and hung driver commands
//! - Cooldown between runs of the same profile

use std::sync::Arc;
use std::time::Duration;

use playlister_core::{
    automation::{FailureKind, LoadStop, Step},
    automation::scripts,
    config::AutomationConfig,
    recorder::ResultRecorder,
    testing::{
        fixtures, MockDriverFactory, MockPage, MockRecorder, MockSessionController, SessionEvent,
        SessionEventKind, ACTION_MENU_LABEL, PUBLIC_OPTION_LABEL, SELECT_ALL_LABEL,
    },
    AutomationPipeline,
};

/// Test helper holding a pipeline and handles to its mocks.
struct TestHarness {
    pipeline: Arc<AutomationPipeline>,
    controller: Arc<MockSessionController>,
    drivers: Arc<MockDriverFactory>,
    recorder: Arc<MockRecorder>,
}

impl TestHarness {
    fn new(page: MockPage) -> Self {
        Self::with_config(page, fixtures::fast_automation_config())
    }

    fn with_config(page: MockPage, config: AutomationConfig) -> Self {
        let controller = Arc::new(MockSessionController::new());
        let drivers = Arc::new(MockDriverFactory::new(page));
        let recorder = Arc::new(MockRecorder::new());
        let pipeline = fixtures::pipeline(
            Arc::clone(&controller),
            Arc::clone(&drivers),
            Arc::clone(&recorder) as Arc<dyn ResultRecorder>,
            config,
        );
        Self {
            pipeline: Arc::new(pipeline),
            controller,
            drivers,
            recorder,
        }
    }
}

fn event(key: &str, kind: SessionEventKind) -> SessionEvent {
    SessionEvent {
        resource_key: key.to_string(),
        kind,
    }
}

#[tokio::test(start_paused = true)]
async fn test_successful_run_records_collection() {
    let harness = TestHarness::new(MockPage::default());
    let job = fixtures::job("profile-1", "lofi beats");

    let outcome = harness.pipeline.run(&job).await.expect("run should succeed");

    assert_eq!(outcome.collection_name, "lofi beats autoplay");
    assert_eq!(outcome.collection_link, "https://www.youtube.com/playlist?list=PLmock");
    assert_eq!(outcome.load.count, Some(150));
    assert_eq!(outcome.load.iterations, 0);
    assert_eq!(outcome.load.stop, LoadStop::TargetReached);

    let profile = harness
        .recorder
        .find_profile("profile-1")
        .unwrap()
        .expect("profile recorded");
    assert!(profile.is_done);
    let collections = harness.recorder.list_collections(profile.profile_ref()).unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].name, "lofi beats autoplay");
    assert_eq!(collections[0].link, outcome.collection_link);
    assert_eq!(collections[0].item_count, Some(150));

    let browsers = harness.drivers.browsers().await;
    assert_eq!(browsers.len(), 1);
    let browser = &browsers[0];
    assert_eq!(browser.opened_urls, vec![harness.pipeline.config().surface_url.clone()]);
    assert_eq!(browser.current_window.as_deref(), Some("tab-1"));
    assert!(browser
        .typed
        .contains(&(scripts::SEARCH_INPUT_NAME.to_string(), "lofi beats".to_string())));
    assert!(browser.values.contains(&"lofi beats autoplay".to_string()));
    assert!(browser.clicks.contains(&SELECT_ALL_LABEL.to_string()));
    assert!(browser.clicks.contains(&ACTION_MENU_LABEL.to_string()));
    assert!(browser.script_clicks.contains(&PUBLIC_OPTION_LABEL.to_string()));
    assert!(browser.quit);

    assert_eq!(
        harness.controller.events().await,
        vec![
            event("profile-1", SessionEventKind::Started),
            event("profile-1", SessionEventKind::Stopped),
        ]
    );
    assert!(!harness.pipeline.locks().is_contended("profile-1"));
}

#[tokio::test(start_paused = true)]
async fn test_explicit_collection_name_is_used() {
    let harness = TestHarness::new(MockPage::default());
    let job = fixtures::job("profile-1", "jazz").with_collection_name("Late night jazz");

    let outcome = harness.pipeline.run(&job).await.unwrap();

    assert_eq!(outcome.collection_name, "Late night jazz");
    let browser = &harness.drivers.browsers().await[0];
    assert!(browser.values.contains(&"Late night jazz".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_missing_element_fails_step_and_cleans_up() {
    let harness = TestHarness::new(MockPage::default().missing(SELECT_ALL_LABEL));
    let job = fixtures::job("profile-1", "lofi");

    let failure = harness.pipeline.run(&job).await.unwrap_err();

    assert_eq!(failure.step, Some(Step::SelectAll));
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(failure.to_string().starts_with("step 7 (select_all) failed:"));
    assert!(!failure.to_string().contains('\n'));

    // Later steps never ran
    let browser = &harness.drivers.browsers().await[0];
    assert!(!browser.clicks.contains(&ACTION_MENU_LABEL.to_string()));
    assert!(browser.values.is_empty());

    // Cleanup still happened and nothing was recorded
    assert!(browser.quit);
    assert_eq!(
        harness.controller.events().await.last(),
        Some(&event("profile-1", SessionEventKind::Stopped))
    );
    assert!(harness.recorder.find_profile("profile-1").unwrap().is_none());
    assert_eq!(harness.recorder.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_start_failure() {
    let harness = TestHarness::new(MockPage::default());
    harness.controller.fail_start("profile-1").await;

    let failure = harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .unwrap_err();

    assert_eq!(failure.step, Some(Step::AcquireSession));
    assert_eq!(failure.kind, FailureKind::RemoteControl);
    assert!(harness.drivers.browsers().await.is_empty());
    // Stop is requested even though the session never came up
    assert_eq!(
        harness.controller.events().await,
        vec![event("profile-1", SessionEventKind::Stopped)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_attach_failure() {
    let harness = TestHarness::new(MockPage::default());
    harness.drivers.fail_attach("profile-1").await;

    let failure = harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .unwrap_err();

    assert_eq!(failure.step, Some(Step::AttachDriver));
    assert_eq!(failure.kind, FailureKind::Attach);
    assert_eq!(harness.controller.events().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_missing_link_fails_last_step() {
    let harness = TestHarness::new(MockPage::default().with_link(None));

    let failure = harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .unwrap_err();

    assert_eq!(failure.step, Some(Step::ExtractLink));
    assert!(harness.recorder.find_profile("profile-1").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_new_collection_label_fallback() {
    let first = scripts::new_collection_xpath(scripts::NEW_COLLECTION_LABELS[0]);
    let harness = TestHarness::new(MockPage::default().missing(&first));

    harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .expect("second label should be used");

    let second = scripts::new_collection_xpath(scripts::NEW_COLLECTION_LABELS[1]);
    let browser = &harness.drivers.browsers().await[0];
    assert!(browser.clicks.contains(&second));
}

#[tokio::test(start_paused = true)]
async fn test_native_click_falls_back_to_script_click() {
    let harness = TestHarness::new(MockPage::default().failing_native_clicks());

    harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .expect("script clicks should be enough");

    let browser = &harness.drivers.browsers().await[0];
    assert!(browser.clicks.is_empty());
    assert!(browser
        .script_clicks
        .contains(&scripts::EXTENSION_BUTTON.to_string()));
    assert!(browser.script_clicks.contains(&SELECT_ALL_LABEL.to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_loading_stops_when_page_stops_growing() {
    let page = MockPage::default()
        .with_counts(Some(10), vec![Some(20), Some(30)])
        .with_extents(vec![100, 200, 200]);
    let harness = TestHarness::new(page);

    let outcome = harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .unwrap();

    assert_eq!(outcome.load.stop, LoadStop::Stagnated);
    assert_eq!(outcome.load.iterations, 3);
    assert_eq!(outcome.load.count, Some(30));

    let profile = harness.recorder.find_profile("profile-1").unwrap().unwrap();
    let collections = harness.recorder.list_collections(profile.profile_ref()).unwrap();
    assert_eq!(collections[0].item_count, Some(30));
}

#[tokio::test(start_paused = true)]
async fn test_unobserved_count_is_recorded_as_unknown() {
    let config = AutomationConfig {
        max_scroll_iterations: 5,
        ..fixtures::fast_automation_config()
    };
    let page = MockPage::default()
        .with_counts(None, vec![None])
        .with_extents(vec![100, 200, 300, 400, 500, 600]);
    let harness = TestHarness::with_config(page, config);

    let outcome = harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .unwrap();

    assert_eq!(outcome.load.stop, LoadStop::Exhausted);
    assert_eq!(outcome.load.iterations, 5);
    assert_eq!(outcome.load.count, None);

    let profile = harness.recorder.find_profile("profile-1").unwrap().unwrap();
    let collections = harness.recorder.list_collections(profile.profile_ref()).unwrap();
    assert_eq!(collections[0].item_count, None);
}

#[tokio::test(start_paused = true)]
async fn test_recorder_failure_does_not_fail_run() {
    let harness = TestHarness::new(MockPage::default());
    harness.recorder.fail_writes(true);

    let outcome = harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await;

    assert!(outcome.is_ok());
    assert!(harness.recorder.write_count() > 0);
    assert!(harness.recorder.find_profile("profile-1").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_failure_still_releases_lock() {
    let harness = TestHarness::new(MockPage::default());
    harness.controller.fail_stops().await;

    harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .unwrap();
    harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .unwrap();

    assert_eq!(harness.controller.start_order().await.len(), 2);
    assert!(!harness.pipeline.locks().is_contended("profile-1"));
    assert_eq!(harness.pipeline.locks().key_count(), 1);
    assert!(playlister_core::metrics::LOCK_KEYS.get() >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_runs_after_stop_and_before_release() {
    let config = AutomationConfig {
        cooldown_ms: 5_000,
        ..fixtures::fast_automation_config()
    };
    let harness = TestHarness::with_config(MockPage::default(), config);

    let first = {
        let pipeline = Arc::clone(&harness.pipeline);
        tokio::spawn(async move { pipeline.run(&fixtures::job("profile-1", "a")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = {
        let pipeline = Arc::clone(&harness.pipeline);
        tokio::spawn(async move { pipeline.run(&fixtures::job("profile-1", "b")).await })
    };

    // The first session is stopped but its lock is still held
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        harness.controller.events().await,
        vec![
            event("profile-1", SessionEventKind::Started),
            event("profile-1", SessionEventKind::Stopped),
        ]
    );
    assert!(harness.pipeline.locks().is_contended("profile-1"));

    // After the cooldown the second run gets its turn
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(first.is_finished());
    assert_eq!(harness.controller.start_order().await.len(), 2);

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(harness.controller.overlaps().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_step_still_stops_session_and_cools_down() {
    let config = AutomationConfig {
        cooldown_ms: 5_000,
        ..fixtures::fast_automation_config()
    };
    let harness = TestHarness::with_config(MockPage::default(), config);
    harness.drivers.panic_on_attach("profile-1").await;

    let first = {
        let pipeline = Arc::clone(&harness.pipeline);
        tokio::spawn(async move { pipeline.run(&fixtures::job("profile-1", "a")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = {
        let pipeline = Arc::clone(&harness.pipeline);
        tokio::spawn(async move { pipeline.run(&fixtures::job("profile-1", "b")).await })
    };

    // The panic was contained: the session is stopped and the lock is held
    // through the cooldown
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        harness.controller.events().await,
        vec![
            event("profile-1", SessionEventKind::Started),
            event("profile-1", SessionEventKind::Stopped),
        ]
    );
    assert!(harness.pipeline.locks().is_contended("profile-1"));
    assert_eq!(harness.controller.start_order().await.len(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.controller.start_order().await.len(), 2);

    let failure = first.await.unwrap().unwrap_err();
    assert_eq!(failure.step, Some(Step::AttachDriver));
    assert_eq!(failure.kind, FailureKind::Panic);
    assert!(failure.to_string().contains("mock driver panicked"));
    assert!(!failure.to_string().contains('\n'));

    assert!(second.await.unwrap().is_err());
    assert_eq!(harness.controller.overlaps().await, 0);
    assert_eq!(harness.recorder.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_hung_driver_command_fails_step_at_deadline() {
    let page = MockPage::default()
        .with_counts(Some(10), vec![Some(20)])
        .stalling(scripts::SCROLL_HEIGHT);
    let harness = TestHarness::new(page);
    let started = tokio::time::Instant::now();

    let failure = harness
        .pipeline
        .run(&fixtures::job("profile-1", "lofi"))
        .await
        .unwrap_err();

    assert_eq!(failure.step, Some(Step::LoadContent));
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(2_000));

    let browsers = harness.drivers.browsers().await;
    assert!(browsers[0].quit);
    assert_eq!(
        harness.controller.events().await,
        vec![
            event("profile-1", SessionEventKind::Started),
            event("profile-1", SessionEventKind::Stopped),
        ]
    );
    assert!(!harness.pipeline.locks().is_contended("profile-1"));
}
