use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;
use trackhound_app::{AppError, Controller, WorkerKind};
use trackhound_core::{cutoff, AppConfig, CutoffDate, ExtensionId, ExtensionSettings};
use trackhound_extension::{
    BuiltinLoader, EntryPoint, Event, ExtensionRecord, NativeModule, RunOutcome, ScrapeContext,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(tmp: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.network.cache = false;
    config.general.extensions_dir = Some(tmp.path().join("extensions"));
    config
}

fn enabled() -> ExtensionSettings {
    ExtensionSettings {
        enabled: true,
        ..ExtensionSettings::default()
    }
}

fn id(name: &str) -> ExtensionId {
    ExtensionId::new(name).expect("valid id")
}

/// Blocks until released, counting invocations.
struct Gate {
    release: Arc<Notify>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EntryPoint for Gate {
    async fn scrape(&self, _ctx: &ScrapeContext, _record: &ExtensionRecord) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(())
    }
}

fn gated_loader(names: &[&str], release: &Arc<Notify>, calls: &Arc<AtomicUsize>) -> BuiltinLoader {
    names.iter().fold(BuiltinLoader::new(), |loader, name| {
        loader.with(
            id(name),
            NativeModule::new()
                .named(*name)
                .with_entry_point(Gate {
                    release: release.clone(),
                    calls: calls.clone(),
                })
                .into_handle(),
        )
    })
}

async fn drain_until_idle(controller: &mut Controller) -> Vec<Event> {
    let mut events = Vec::new();
    controller.run_until_idle(|event| events.push(event.clone())).await;
    events
}

#[tokio::test]
async fn test_discover_and_scrape_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<ol><li><span class="t">Track A</span><a href="/a.mp3">listen</a></li></ol>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().expect("create temp dir");
    let config_path = tmp.path().join("config.toml");
    let extensions_dir = tmp.path().join("extensions");
    std::fs::create_dir_all(&extensions_dir).expect("create extensions dir");
    std::fs::write(
        extensions_dir.join("Test.toml"),
        format!(
            r#"
            [trackhound]
            name = "Test"
            genres = ["house"]

            [scrape]
            url = "{}/releases"
            item = "li"
            name = "span.t"
            media_url = "a@href"
            "#,
            server.uri()
        ),
    )
    .expect("write extension");

    let mut config = config(&tmp);
    config.extensions.insert("Test".to_string(), enabled());
    let mut controller = Controller::new(config, &config_path).expect("create controller");
    let initial_cutoff = controller.cutoff();

    controller.start_discovery().expect("idle controller");
    let events = drain_until_idle(&mut controller).await;
    assert!(matches!(events.last(), Some(Event::DiscoveryFinished)));
    let discovered: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::ExtensionDiscovered(record) => Some(record.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(discovered, vec!["Test"]);

    let record = controller.registry().get(&id("Test")).expect("discovered");
    assert_eq!(record.name, "Test");
    assert!(record.enabled, "persisted flag applied");
    assert!(record.is_genre_enabled("house"));

    controller.start_scrape().expect("idle controller");
    let events = drain_until_idle(&mut controller).await;

    let results: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::ResultFound { item, source } => Some((item.name().to_string(), source.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(results, vec![("Track A".to_string(), id("Test"))]);
    assert!(matches!(
        events.last(),
        Some(Event::RunFinished {
            outcome: RunOutcome::Completed
        })
    ));

    assert_eq!(initial_cutoff, CutoffDate::load(None));
    assert_eq!(controller.cutoff().date(), cutoff::today());

    let saved = AppConfig::load_from(&config_path).expect("config saved after run");
    assert_eq!(saved.general.last_use, Some(cutoff::today()));
    assert!(saved.extensions["Test"].enabled);
}

#[tokio::test]
async fn test_second_worker_is_refused() {
    let tmp = TempDir::new().expect("create temp dir");
    let release = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = gated_loader(&["Slow"], &release, &calls);

    let mut config = config(&tmp);
    config.extensions.insert("Slow".to_string(), enabled());
    let mut controller = Controller::with_loader(config, tmp.path().join("config.toml"), Arc::new(loader))
        .expect("create controller");

    controller.start_discovery().expect("idle controller");
    assert_eq!(controller.running(), Some(WorkerKind::Discovery));
    assert!(matches!(controller.start_scrape(), Err(AppError::Busy)));
    drain_until_idle(&mut controller).await;

    controller.start_scrape().expect("idle controller");
    assert!(controller.is_busy());
    assert!(matches!(controller.start_discovery(), Err(AppError::Busy)));
    assert!(matches!(controller.start_scrape(), Err(AppError::Busy)));
    assert!(matches!(
        controller.set_enabled(&id("Slow"), false),
        Err(AppError::Busy)
    ));
    assert!(matches!(
        controller.set_cutoff(cutoff::today()),
        Err(AppError::Busy)
    ));

    release.notify_one();
    drain_until_idle(&mut controller).await;

    assert!(!controller.is_busy());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    controller.start_discovery().expect("idle again");
    drain_until_idle(&mut controller).await;
}

#[tokio::test]
async fn test_cancelled_run_keeps_cutoff() {
    let tmp = TempDir::new().expect("create temp dir");
    let release = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = gated_loader(&["A", "B"], &release, &calls);

    let mut config = config(&tmp);
    config.extensions.insert("A".to_string(), enabled());
    config.extensions.insert("B".to_string(), enabled());
    let config_path = tmp.path().join("config.toml");
    let mut controller =
        Controller::with_loader(config, &config_path, Arc::new(loader)).expect("create controller");
    let before = controller.cutoff();

    controller.start_discovery().expect("idle controller");
    drain_until_idle(&mut controller).await;
    assert_eq!(controller.registry().enabled().count(), 2);

    controller.start_scrape().expect("idle controller");
    while calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(controller.cancel());
    release.notify_one();

    let events = drain_until_idle(&mut controller).await;
    assert!(matches!(
        events.last(),
        Some(Event::RunFinished {
            outcome: RunOutcome::Cancelled
        })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.cutoff(), before);
    assert!(!config_path.exists(), "nothing persisted after a cancelled run");
}

#[tokio::test]
async fn test_rescan_keeps_flags() {
    let tmp = TempDir::new().expect("create temp dir");
    let release = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = gated_loader(&["Keep"], &release, &calls);
    let mut controller =
        Controller::with_loader(config(&tmp), tmp.path().join("config.toml"), Arc::new(loader))
            .expect("create controller");

    controller.start_discovery().expect("idle controller");
    drain_until_idle(&mut controller).await;
    assert!(!controller.registry().get(&id("Keep")).expect("present").enabled);

    controller.set_enabled(&id("Keep"), true).expect("known extension");

    controller.start_discovery().expect("idle controller");
    assert!(controller.registry().is_empty(), "registry discarded on rescan");
    drain_until_idle(&mut controller).await;

    assert_eq!(controller.registry().len(), 1);
    assert!(controller.registry().get(&id("Keep")).expect("present").enabled);
}
