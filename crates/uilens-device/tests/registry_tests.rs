#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use uilens_core::{LensError, Platform};
    use uilens_device::DeviceRegistry;
    use uilens_device::mock::MockConnector;

    fn registry(connector: MockConnector) -> (Arc<MockConnector>, DeviceRegistry) {
        let connector = Arc::new(connector);
        (connector.clone(), DeviceRegistry::new(connector))
    }

    // ── Connect ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (connector, reg) = registry(MockConnector::new());
        let a = reg.connect("android", "127.0.0.1:5555").await.unwrap();
        let b = reg.connect("android", "127.0.0.1:5555").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "android:127.0.0.1:5555");
        assert_eq!(connector.connects(), 1);
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_address_uses_platform_id() {
        let (_, reg) = registry(MockConnector::new());
        let id = reg.connect("ios", "").await.unwrap();
        assert_eq!(id.as_str(), "ios");
        let device = reg.get("ios").await.unwrap();
        assert_eq!(device.platform(), Platform::Ios);
    }

    #[tokio::test]
    async fn test_platform_is_case_insensitive() {
        let (_, reg) = registry(MockConnector::new());
        let id = reg.connect("Android", "").await.unwrap();
        assert_eq!(id.as_str(), "android");
    }

    #[tokio::test]
    async fn test_concurrent_connects_open_one_connection() {
        let (connector, reg) =
            registry(MockConnector::new().with_delay(Duration::from_millis(50)));
        let reg = Arc::new(reg);
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let reg = reg.clone();
                tokio::spawn(async move { reg.connect("android", "10.0.0.7:5555").await })
            })
            .collect();
        for t in tasks {
            assert_eq!(t.await.unwrap().unwrap().as_str(), "android:10.0.0.7:5555");
        }
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_different_ids_connect_independently() {
        let (connector, reg) = registry(MockConnector::new());
        reg.connect("android", "10.0.0.7:5555").await.unwrap();
        reg.connect("android", "10.0.0.8:5555").await.unwrap();
        reg.connect("android", "").await.unwrap();
        assert_eq!(connector.connects(), 3);
        assert_eq!(reg.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_platform() {
        let (connector, reg) = registry(MockConnector::new());
        let err = reg.connect("windows", "x").await.unwrap_err();
        assert!(matches!(err, LensError::UnsupportedPlatform(p) if p == "windows"));
        assert_eq!(connector.connects(), 0);
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_failed_connect_registers_nothing() {
        let (connector, reg) = registry(MockConnector::failing());
        let err = reg.connect("android", "10.0.0.7:5555").await.unwrap_err();
        assert!(matches!(err, LensError::Connection { .. }));
        assert!(!reg.contains("android:10.0.0.7:5555"));

        // a retry tries again rather than returning a cached failure
        assert!(reg.connect("android", "10.0.0.7:5555").await.is_err());
        assert_eq!(connector.connects(), 2);
    }

    // ── Get ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_get_connects_lazily() {
        let (connector, reg) = registry(MockConnector::new());
        let device = reg.get("android:127.0.0.1:5555").await.unwrap();
        let identity = device.identity().await.unwrap();
        assert!(!identity.serial.is_empty());
        assert!(reg.contains("android:127.0.0.1:5555"));

        // later connect for the same pair reuses the session
        reg.connect("android", "127.0.0.1:5555").await.unwrap();
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_get_equals_connect_then_get() {
        let (_, lazy) = registry(MockConnector::new());
        let (_, eager) = registry(MockConnector::new());

        let id = eager.connect("android", "127.0.0.1:5555").await.unwrap();
        let a = eager.get(id.as_str()).await.unwrap().identity().await.unwrap();
        let b = lazy
            .get("android:127.0.0.1:5555")
            .await
            .unwrap()
            .identity()
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.serial, "127.0.0.1:5555");
        assert_eq!(a.port, Some(5555));
    }

    #[tokio::test]
    async fn test_get_unknown_platform_fails() {
        let (_, reg) = registry(MockConnector::new());
        assert!(matches!(
            reg.get("symbian:1.2.3.4").await,
            Err(LensError::UnsupportedPlatform(_))
        ));
    }

    // ── List ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_list_reports_failures_inline() {
        let (_, reg) = registry(MockConnector::new().with_broken_identity("10.0.0.8:5555"));
        reg.connect("android", "10.0.0.7:5555").await.unwrap();
        reg.connect("android", "10.0.0.8:5555").await.unwrap();
        reg.connect("ios", "").await.unwrap();

        let list = reg.list().await;
        assert_eq!(list.len(), 3);

        let broken = list
            .iter()
            .find(|s| s.id.as_str() == "android:10.0.0.8:5555")
            .unwrap();
        assert!(broken.info.is_none());
        assert!(broken.error.is_some());

        let healthy: Vec<_> = list.iter().filter(|s| s.info.is_some()).collect();
        assert_eq!(healthy.len(), 2);

        let wire = serde_json::to_value(&list).unwrap();
        let first = &wire[0];
        assert!(first.get("devicesName").is_some());
    }

    #[tokio::test]
    async fn test_list_empty() {
        let (_, reg) = registry(MockConnector::new());
        assert!(reg.list().await.is_empty());
    }
}
