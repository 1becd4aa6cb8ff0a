//! # Routing, Privacy and ACL Flows
//!
//! Publish routing with and without an external provider, private topic
//! isolation, and topic ACLs loaded from a rule file on disk.

#[cfg(test)]
mod tests {
    use crate::fixtures::{clustered_config, next, nothing, recorder, user, RecordingProvider, TestBus};
    use pubsub_core::{
        BusConfig, BusError, Identity, JsonFileAclSource, MessagingApi, TopicAclChecker,
    };
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;

    // =============================================================================
    // EXTERNAL ROUTING
    // =============================================================================

    #[tokio::test]
    async fn test_routing_with_active_provider() {
        let bus = TestBus::new(clustered_config("recorder"), TopicAclChecker::disabled());
        let provider = RecordingProvider::new("recorder");
        bus.host.load(&bus.providers, provider.clone());
        bus.core.start_listeners();

        let u = user("mel");
        bus.core.publish(&u, "external/1", json!("a")).await.unwrap();
        bus.core.publish(&u, "what/ever/deep", json!("b")).await.unwrap();
        bus.core.publish(&u, "foo/bar", json!("c")).await.unwrap();
        bus.core.publish(&u, "externally/not", json!("d")).await.unwrap();

        assert_eq!(
            *provider.external.lock(),
            vec![
                ("external/1".to_string(), json!("a")),
                ("what/ever/deep".to_string(), json!("b")),
            ]
        );
        assert_eq!(
            *provider.internal.lock(),
            vec![
                ("foo/bar".to_string(), json!("c")),
                ("externally/not".to_string(), json!("d")),
            ]
        );
    }

    #[tokio::test]
    async fn test_routing_without_provider() {
        let bus = TestBus::new(clustered_config("recorder"), TopicAclChecker::disabled());
        let u = user("mel");

        let (callback, mut rx) = recorder();
        bus.core.subscribe(&u, "foo/bar", callback).await.unwrap();

        let err = bus.core.publish(&u, "external/1", json!(1)).await.unwrap_err();
        assert!(matches!(err, BusError::NoProvider { .. }));

        bus.core.publish(&u, "foo/bar", json!(2)).await.unwrap();
        assert_eq!(next(&mut rx).await, ("foo/bar".to_string(), json!(2)));
    }

    #[tokio::test]
    async fn test_broker_echo_reaches_local_subscribers() {
        let bus = TestBus::new(clustered_config("recorder"), TopicAclChecker::disabled());
        let provider = RecordingProvider::new("recorder");
        bus.host.load(&bus.providers, provider.clone());
        bus.core.start_listeners();

        let (callback, mut rx) = recorder();
        bus.core.subscribe(&user("mel"), "sensors/#", callback).await.unwrap();

        provider.inject("sensors/kitchen/temp", json!(21.5));
        assert_eq!(next(&mut rx).await.0, "sensors/kitchen/temp");
        provider.inject("other", json!(0));
        nothing(&mut rx).await;
    }

    // =============================================================================
    // PRIVACY
    // =============================================================================

    #[tokio::test]
    async fn test_private_topic_isolation() {
        let bus = TestBus::local();
        let mel = user("mel");
        let maria = user("maria");

        let topic = bus.core.user_private_topic(&mel);
        assert_eq!(topic, "user/mel");

        let (mel_cb, mut mel_rx) = recorder();
        bus.core.subscribe(&mel, "user/mel/notification", mel_cb).await.unwrap();

        let (maria_cb, mut maria_rx) = recorder();
        let err = bus
            .core
            .subscribe(&maria, "user/mel/notification", maria_cb.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::PermissionDenied { .. }));
        bus.core.subscribe(&maria, "user/maria/#", maria_cb).await.unwrap();

        bus.core.publish(&maria, "user/mel/notification", json!("for mel")).await.unwrap();
        assert_eq!(next(&mut mel_rx).await.1, json!("for mel"));
        nothing(&mut maria_rx).await;
    }

    #[tokio::test]
    async fn test_wildcard_username_is_sanitized() {
        let bus = TestBus::local();
        let sneaky = Identity::new("a+b", ["User"]);
        assert_eq!(bus.core.user_private_topic(&sneaky), "user/ab");

        let (callback, mut rx) = recorder();
        bus.core.subscribe(&sneaky, "user/ab", callback).await.unwrap();
        bus.core.publish(&user("x"), "user/ab", json!(1)).await.unwrap();
        next(&mut rx).await;
    }

    #[tokio::test]
    async fn test_custom_private_base() {
        let config = BusConfig {
            user_private_base_topic: "private/users".into(),
            ..BusConfig::default()
        };
        let bus = TestBus::new(config, TopicAclChecker::disabled());
        let mel = user("mel");
        assert_eq!(bus.core.user_private_topic(&mel), "private/users/mel");

        let (callback, _rx) = recorder();
        assert!(bus.core.subscribe(&mel, "private/users/mel", callback.clone()).await.is_ok());
        assert!(bus.core.subscribe(&mel, "private/users/maria", callback.clone()).await.is_err());
        // only the configured base is private
        assert!(bus.core.subscribe(&mel, "user/maria", callback).await.is_ok());
    }

    // =============================================================================
    // TOPIC ACL FROM FILE
    // =============================================================================

    fn acl_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn acl_bus(path: &std::path::Path) -> TestBus {
        TestBus::new(
            BusConfig::default(),
            TopicAclChecker::new(Arc::new(JsonFileAclSource::new(path))),
        )
    }

    #[tokio::test]
    async fn test_acl_file_rules() {
        let file = acl_file(
            r#"{
                "_comment": "first match wins",
                "foo/bar/#": { "allow": ["Role5", "GroupX"] },
                "secure/admin/#": { "allow": "any", "deny": ["Guest"] },
                "secure/#": { "allow": ["Admin"] },
                "locked/#": {}
            }"#,
        );
        let bus = acl_bus(file.path());
        let (callback, _rx) = recorder();

        let grouped = Identity::new("g", ["GroupX"]);
        let role1 = Identity::new("r", ["Role1"]);
        let guest = Identity::new("guest", ["Guest", "Admin"]);
        let admin = Identity::new("admin", ["Admin"]);

        assert!(bus.core.subscribe(&grouped, "foo/bar/x", callback.clone()).await.is_ok());
        assert!(bus.core.subscribe(&role1, "foo/bar/x", callback.clone()).await.is_err());
        assert!(bus.core.subscribe(&role1, "foo/baz", callback.clone()).await.is_ok());

        assert!(bus.core.subscribe(&role1, "secure/admin/panel", callback.clone()).await.is_ok());
        assert!(bus.core.subscribe(&guest, "secure/admin/panel", callback.clone()).await.is_err());
        assert!(bus.core.subscribe(&admin, "secure/other", callback.clone()).await.is_ok());
        assert!(bus.core.subscribe(&role1, "secure/other", callback.clone()).await.is_err());

        assert!(bus.core.publish(&admin, "locked/x", json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_acl_rechecked_at_delivery() {
        let file = acl_file(r#"{ "news/internal/#": { "allow": ["Staff"] } }"#);
        let bus = acl_bus(file.path());

        let reader = Identity::new("reader", ["Reader"]);
        let staff = Identity::new("staff", ["Staff"]);

        let (callback, mut rx) = recorder();
        bus.core.subscribe(&reader, "news/#", callback).await.unwrap();

        bus.core.publish(&staff, "news/internal/memo", json!("secret")).await.unwrap();
        bus.core.publish(&staff, "news/public/post", json!("hello")).await.unwrap();

        assert_eq!(next(&mut rx).await.1, json!("hello"));
        nothing(&mut rx).await;
    }

    #[tokio::test]
    async fn test_missing_acl_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let bus = acl_bus(&dir.path().join("topic-acl.json"));
        let (callback, _rx) = recorder();
        assert!(bus
            .core
            .subscribe(&Identity::new("nobody", Vec::<String>::new()), "any/topic", callback)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_malformed_acl_file_rejects() {
        let file = acl_file(r#"{ "a/#": { "allow": "everyone" } }"#);
        let bus = acl_bus(file.path());
        let (callback, _rx) = recorder();
        let err = bus.core.subscribe(&user("mel"), "a/b", callback).await.unwrap_err();
        assert!(matches!(err, BusError::AclSource(_)));
    }
}
