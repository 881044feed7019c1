//! End-to-end wiring of the two agents over a shared bridge: Init
//! handshake, event fan-out to all three coordinators, shutdown.

mod common;

use chat_sentinel::bridge::{Bridge, Envelope};
use chat_sentinel::net::StreamRequest;
use chat_sentinel::runtime::{LogicAgent, PageAgent};
use chat_sentinel::scroll_guard::WheelSample;
use chat_sentinel_config::Settings;
use common::{FakeAdapter, FakePage, held_network};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const MATCHED_URL: &str = "https://api.example.com/v1/chat/completions";

/// Let spawned agent/coordinator tasks catch up without advancing time.
async fn drain_tasks() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

fn alerting_settings() -> Settings {
    // Focus requests are the observable alert channel; desktop notification
    // and chime stay off so tests never touch the real platform services.
    let mut settings = Settings::default();
    settings.auto_focus_enabled = true;
    settings.desktop_notification_enabled = false;
    settings.completion_sound_volume = 0;
    settings
}

#[tokio::test(start_paused = true)]
async fn test_full_cycle_across_the_bridge() {
    let (network, stream, _unary) = held_network();
    let bridge = Bridge::default();
    let adapter = FakeAdapter::new();
    let page = FakePage::new();

    // Host side first, so the Init handshake finds its listener.
    let page_agent = PageAgent::spawn(Arc::clone(&network), &bridge, None);
    let logic_agent = LogicAgent::launch(
        Arc::clone(&adapter) as _,
        Arc::clone(&page) as _,
        alerting_settings(),
        &bridge,
    )
    .unwrap();

    drain_tasks().await;
    assert!(page_agent.detector().is_started());

    // Observe the wire alongside the coordinators.
    let mut observer = bridge.subscribe();

    let _response = network
        .stream_call(StreamRequest::post(MATCHED_URL))
        .await
        .unwrap();
    assert!(matches!(observer.recv().await.unwrap(), Envelope::Start { .. }));
    drain_tasks().await;
    assert_eq!(page.last_title().unwrap(), "⏳ Trip planning");

    // The user scrolls up mid-generation: suppression intent goes live.
    logic_agent.observe_wheel(WheelSample {
        delta_y: -120.0,
        distance_from_bottom: 900.0,
    });
    drain_tasks().await;
    assert!(*logic_agent.scroll_intent().borrow());

    stream.finish(0);
    drain_tasks().await;
    assert!(matches!(observer.recv().await.unwrap(), Envelope::Settle { .. }));
    drain_tasks().await;

    assert_eq!(page.last_title().unwrap(), "✅ Trip planning");
    assert_eq!(page.focus_count(), 1);
    // Generation over: the scroll guard released its intent.
    assert!(!*logic_agent.scroll_intent().borrow());

    logic_agent.shutdown();
    page_agent.shutdown();
    assert!(!page_agent.detector().is_started());
}

#[tokio::test(start_paused = true)]
async fn test_settings_override_shortens_threshold() {
    let (network, stream, _unary) = held_network();
    let bridge = Bridge::default();
    let adapter = FakeAdapter::new();
    let page = FakePage::new();

    let mut settings = alerting_settings();
    settings.silence_threshold_ms = Some(250);

    let page_agent = PageAgent::spawn(Arc::clone(&network), &bridge, None);
    let _logic_agent = LogicAgent::launch(
        Arc::clone(&adapter) as _,
        Arc::clone(&page) as _,
        settings,
        &bridge,
    )
    .unwrap();
    drain_tasks().await;
    assert!(page_agent.detector().is_started());

    let mut observer = bridge.subscribe();
    let _response = network
        .stream_call(StreamRequest::post(MATCHED_URL))
        .await
        .unwrap();
    assert!(matches!(observer.recv().await.unwrap(), Envelope::Start { .. }));

    stream.finish(0);
    drain_tasks().await;
    let before = tokio::time::Instant::now();
    assert!(matches!(observer.recv().await.unwrap(), Envelope::Settle { .. }));
    // The overridden threshold, not the adapter's 500 ms, paced the settle.
    assert_eq!(before.elapsed(), Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_visibility_inlet_reaches_generation_reactor() {
    let (network, stream, _unary) = held_network();
    let bridge = Bridge::default();
    let adapter = FakeAdapter::new();
    let page = FakePage::new();

    let page_agent = PageAgent::spawn(Arc::clone(&network), &bridge, None);
    let logic_agent = LogicAgent::launch(
        Arc::clone(&adapter) as _,
        Arc::clone(&page) as _,
        alerting_settings(),
        &bridge,
    )
    .unwrap();
    drain_tasks().await;
    assert!(page_agent.detector().is_started());

    let mut observer = bridge.subscribe();
    let _response = network
        .stream_call(StreamRequest::post(MATCHED_URL))
        .await
        .unwrap();
    assert!(matches!(observer.recv().await.unwrap(), Envelope::Start { .. }));
    drain_tasks().await;

    // Foregrounded after the site indicator stopped: completion is seen.
    adapter.generating.store(false, Ordering::SeqCst);
    logic_agent.notify_visibility(true);
    drain_tasks().await;

    stream.finish(0);
    assert!(matches!(observer.recv().await.unwrap(), Envelope::Settle { .. }));
    drain_tasks().await;

    // Alerts suppressed, title still completed.
    assert_eq!(page.focus_count(), 0);
    assert_eq!(page.last_title().unwrap(), "✅ Trip planning");
}

#[tokio::test(start_paused = true)]
async fn test_launch_refused_when_monitoring_disabled() {
    let bridge = Bridge::default();
    let adapter = FakeAdapter::new();
    let page = FakePage::new();

    let mut settings = Settings::default();
    settings.network_monitor_enabled = false;

    let result = LogicAgent::launch(
        Arc::clone(&adapter) as _,
        Arc::clone(&page) as _,
        settings,
        &bridge,
    );
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_launch_refused_without_monitor_config() {
    let bridge = Bridge::default();
    let page = FakePage::new();

    // Adapters for unsupported sites expose no monitor config.
    let adapter = FakeAdapter::without_monitor_config();

    let result = LogicAgent::launch(
        Arc::clone(&adapter) as _,
        Arc::clone(&page) as _,
        Settings::default(),
        &bridge,
    );
    assert!(result.is_err());
}
