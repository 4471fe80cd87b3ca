mod common;

use async_trait::async_trait;
use common::{mock_app, Fixture, RecordingFactory};
use futures::future::join_all;
use privchat_push::model::{Application, Device, DeviceFilter, DeviceType, Notification};
use privchat_push::push::provider::ProviderFactory;
use privchat_push::repository::{ApplicationRepository, DeviceRepository, MemoryStore};
use privchat_push::{ErrorKind, ErrorSource, PushError, PushManager, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn notification() -> Notification {
    Notification::alert("新消息", "hello").with_badge(1)
}

#[tokio::test]
async fn test_configure_application_is_idempotent() {
    let fixture = Fixture::new(vec![mock_app("app-1", &[DeviceType::Ios, DeviceType::Android])], vec![]);

    let first = fixture
        .manager
        .configure_application("app-1", DeviceType::Ios)
        .await
        .unwrap();
    let second = fixture
        .manager
        .configure_application("app-1", DeviceType::Ios)
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fixture.factory.created(), 1);

    // 不同设备类型是不同的键
    let android = fixture
        .manager
        .configure_application("app-1", DeviceType::Android)
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &android));
    assert_eq!(fixture.factory.created(), 2);
    assert_eq!(fixture.manager.registry().len().await, 2);
}

#[tokio::test]
async fn test_concurrent_configure_constructs_once() {
    let fixture = Fixture::new(vec![mock_app("app-1", &[DeviceType::Web])], vec![]);

    let results = join_all(
        (0..16).map(|_| fixture.manager.configure_application("app-1", DeviceType::Web)),
    )
    .await;

    let providers: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    assert!(providers.iter().all(|p| Arc::ptr_eq(p, &providers[0])));
    assert_eq!(fixture.factory.created(), 1);
}

#[tokio::test]
async fn test_configure_application_errors() {
    let fixture = Fixture::new(
        vec![Application::new("bare"), mock_app("app-1", &[DeviceType::Ios])],
        vec![],
    );

    let err = fixture
        .manager
        .configure_application("nope", DeviceType::Ios)
        .await
        .err()
        .unwrap();
    assert_eq!(err, PushError::ApplicationNotFound { app_id: "nope".to_string() });

    let err = fixture
        .manager
        .configure_application("bare", DeviceType::Ios)
        .await
        .err()
        .unwrap();
    assert_eq!(err, PushError::Configuration { app_id: "bare".to_string() });

    let err = fixture
        .manager
        .configure_application("app-1", DeviceType::Android)
        .await
        .err()
        .unwrap();
    assert_eq!(
        err,
        PushError::UnsupportedDeviceType {
            device_type: DeviceType::Android
        }
    );
    assert_eq!(fixture.factory.created(), 0);
}

#[tokio::test]
async fn test_notify_by_id_uses_requested_device_on_token_collision() {
    let fixture = Fixture::new(
        vec![mock_app("app-1", &[DeviceType::Ios, DeviceType::Android])],
        vec![
            Device::new("android-device", "app-1", DeviceType::Android, "shared-token"),
            Device::new("ios-device", "app-1", DeviceType::Ios, "shared-token"),
        ],
    );

    let receipt = fixture
        .manager
        .notify_by_id("ios-device", &notification())
        .await
        .unwrap();
    assert_eq!(receipt.device_id, "ios-device");
    assert_eq!(receipt.device_type, DeviceType::Ios);

    let ios = fixture.provider("app-1", DeviceType::Ios);
    let pushed = ios.pushed();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].0, notification());
    assert_eq!(pushed[0].1, "shared-token");

    // Android Provider 从未被解析
    assert!(fixture
        .factory
        .provider(&common::label("app-1", DeviceType::Android))
        .is_none());
    assert_eq!(fixture.factory.created(), 1);
}

#[tokio::test]
async fn test_notify_by_id_missing_device() {
    let fixture = Fixture::new(vec![mock_app("app-1", &[DeviceType::Ios])], vec![]);

    let err = fixture
        .manager
        .notify_by_id("missing-id", &notification())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    let details = err.not_found_details().unwrap();
    assert_eq!(details.device_id.as_deref(), Some("missing-id"));
    assert!(details.app_id.is_none());
}

#[tokio::test]
async fn test_notify_by_id_dangling_application() {
    let fixture = Fixture::new(
        vec![],
        vec![Device::new("d1", "ghost-app", DeviceType::Ios, "token")],
    );

    let err = fixture
        .manager
        .notify_by_id("d1", &notification())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        err.not_found_details().unwrap().app_id.as_deref(),
        Some("ghost-app")
    );
}

#[tokio::test]
async fn test_notify_by_id_without_push_settings() {
    let fixture = Fixture::new(
        vec![Application::new("bare")],
        vec![Device::new("d1", "bare", DeviceType::Ios, "token")],
    );

    let err = fixture
        .manager
        .notify_by_id("d1", &notification())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err, PushError::Configuration { app_id: "bare".to_string() });
}

#[tokio::test]
async fn test_notify_by_id_unconfigured_device_type() {
    let fixture = Fixture::new(
        vec![mock_app("app-1", &[DeviceType::Ios])],
        vec![Device::new("d1", "app-1", DeviceType::Web, "token")],
    );

    let err = fixture
        .manager
        .notify_by_id("d1", &notification())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedDeviceType);
    assert_eq!(fixture.factory.created(), 0);
}

#[tokio::test]
async fn test_provider_error_goes_to_error_channel() {
    let fixture = Fixture::new(
        vec![mock_app("app-1", &[DeviceType::Android])],
        vec![Device::new("d1", "app-1", DeviceType::Android, "token")],
    );
    let mut errors = fixture.manager.subscribe_errors();

    // 推送被接受，调用本身成功
    fixture
        .manager
        .notify_by_id("d1", &notification())
        .await
        .unwrap();

    // 之后 Provider 报告投递失败
    fixture
        .provider("app-1", DeviceType::Android)
        .emit_error("delivery failed");

    let event = tokio::time::timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("error event not delivered")
        .unwrap();
    assert_eq!(event.app_id, "app-1");
    assert_eq!(event.device_type, DeviceType::Android);
    assert_eq!(event.source, ErrorSource::Provider);
    assert_eq!(event.error.kind(), ErrorKind::Provider);

    // 只有一个事件
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn test_notify_by_query_pushes_in_discovery_order() {
    let fixture = Fixture::new(
        vec![mock_app("app-1", &[DeviceType::Ios])],
        vec![
            Device::new("d1", "app-1", DeviceType::Ios, "token-1").with_user("myself"),
            Device::new("d2", "app-1", DeviceType::Ios, "token-2").with_user("someone-else"),
            Device::new("d3", "app-1", DeviceType::Ios, "token-3").with_user("myself"),
        ],
    );

    let report = fixture
        .manager
        .notify_by_query(&DeviceFilter::by_user("myself"), &notification())
        .await
        .unwrap();

    assert_eq!(report.matched, 2);
    assert!(report.is_complete_success());
    let accepted: Vec<_> = report.accepted.iter().map(|r| r.device_id.as_str()).collect();
    assert_eq!(accepted, vec!["d1", "d3"]);

    let pushed = fixture.provider("app-1", DeviceType::Ios).pushed();
    assert_eq!(pushed.len(), 2);
    assert_eq!(pushed[0], (notification(), "token-1".to_string()));
    assert_eq!(pushed[1], (notification(), "token-3".to_string()));
    assert_eq!(fixture.factory.created(), 1);
}

#[tokio::test]
async fn test_notify_by_query_is_best_effort() {
    let fixture = Fixture::new(
        vec![mock_app("app-1", &[DeviceType::Ios, DeviceType::Android])],
        vec![
            Device::new("d1", "app-1", DeviceType::Ios, "token-1").with_user("u"),
            Device::new("d2", "ghost-app", DeviceType::Ios, "token-2").with_user("u"),
            Device::new("d3", "app-1", DeviceType::Web, "token-3").with_user("u"),
            Device::new("d4", "app-1", DeviceType::Android, "token-4").with_user("u"),
        ],
    );

    let report = fixture
        .manager
        .notify_by_query(&DeviceFilter::by_user("u"), &notification())
        .await
        .unwrap();

    assert_eq!(report.matched, 4);
    assert!(!report.is_complete_success());

    let accepted: Vec<_> = report.accepted.iter().map(|r| r.device_id.as_str()).collect();
    assert_eq!(accepted, vec!["d1", "d4"]);

    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].device_id, "d2");
    assert_eq!(report.failures[0].error.kind(), ErrorKind::NotFound);
    assert_eq!(report.failures[1].device_id, "d3");
    assert_eq!(report.failures[1].error.kind(), ErrorKind::UnsupportedDeviceType);

    assert_eq!(fixture.provider("app-1", DeviceType::Ios).push_count(), 1);
    assert_eq!(fixture.provider("app-1", DeviceType::Android).push_count(), 1);
}

#[tokio::test]
async fn test_notify_by_query_records_rejected_push() {
    let fixture = Fixture::new(
        vec![mock_app("app-1", &[DeviceType::Ios])],
        vec![
            Device::new("d1", "app-1", DeviceType::Ios, "token-1"),
            Device::new("d2", "app-1", DeviceType::Ios, "token-2"),
        ],
    );

    fixture
        .manager
        .configure_application("app-1", DeviceType::Ios)
        .await
        .unwrap();
    fixture.provider("app-1", DeviceType::Ios).set_reject(true);

    let report = fixture
        .manager
        .notify_by_query(&DeviceFilter::new().app_id("app-1"), &notification())
        .await
        .unwrap();

    assert_eq!(report.matched, 2);
    assert!(report.accepted.is_empty());
    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .all(|f| f.error.kind() == ErrorKind::Provider));
}

#[tokio::test]
async fn test_notify_by_query_without_matches() {
    let fixture = Fixture::new(vec![mock_app("app-1", &[DeviceType::Ios])], vec![]);

    let report = fixture
        .manager
        .notify_by_query(&DeviceFilter::by_user("nobody"), &notification())
        .await
        .unwrap();

    assert_eq!(report.matched, 0);
    assert!(report.is_complete_success());
    assert_eq!(fixture.factory.created(), 0);
}

/// 记录同时进行的应用查询数的应用存储
struct CountingApplications {
    inner: Arc<MemoryStore>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl ApplicationRepository for CountingApplications {
    async fn find_by_id(&self, id: &str) -> Result<Option<Application>> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = ApplicationRepository::find_by_id(self.inner.as_ref(), id).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[tokio::test]
async fn test_notify_by_query_bounds_concurrent_resolution() {
    const DEVICES: usize = 40;

    let store = Arc::new(MemoryStore::new());
    store.insert_application(mock_app("app-1", &[DeviceType::Android]));
    for i in 0..DEVICES {
        store.insert_device(
            Device::new(format!("d{}", i), "app-1", DeviceType::Android, format!("token-{}", i))
                .with_user("crowd"),
        );
    }

    let applications = Arc::new(CountingApplications {
        inner: Arc::clone(&store),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let factory = Arc::new(RecordingFactory::default());
    let manager = PushManager::new(
        applications.clone() as Arc<dyn ApplicationRepository>,
        store.clone() as Arc<dyn DeviceRepository>,
        factory.clone() as Arc<dyn ProviderFactory>,
        16,
    )
    .with_resolve_concurrency(4);

    let report = manager
        .notify_by_query(&DeviceFilter::by_user("crowd"), &notification())
        .await
        .unwrap();

    assert_eq!(report.matched, DEVICES);
    assert!(report.is_complete_success());
    assert!(applications.peak.load(Ordering::SeqCst) <= 4);

    // 限流不改变推送顺序
    let expected: Vec<String> = (0..DEVICES).map(|i| format!("d{}", i)).collect();
    let accepted: Vec<String> = report.accepted.iter().map(|r| r.device_id.clone()).collect();
    assert_eq!(accepted, expected);

    let pushed = factory
        .provider(&common::label("app-1", DeviceType::Android))
        .unwrap()
        .pushed();
    assert_eq!(pushed.len(), DEVICES);
    assert_eq!(pushed[DEVICES - 1].1, format!("token-{}", DEVICES - 1));
    assert_eq!(factory.created(), 1);
}
