//! # Multi-Instance Fan-Out
//!
//! Several bus instances share one broker link, as several server
//! processes would share one external broker.

#[cfg(test)]
mod tests {
    use crate::fixtures::{clustered_config, next, nothing, recorder, user, TestBus};
    use pubsub_core::{BroadcastProvider, BrokerLink, MessagingApi, TopicAclChecker};
    use serde_json::json;
    use std::sync::Arc;

    fn node(link: &BrokerLink) -> TestBus {
        let bus = TestBus::new(clustered_config("broker"), TopicAclChecker::disabled());
        bus.host
            .load(&bus.providers, Arc::new(BroadcastProvider::new("broker", link)));
        bus.core.start_listeners();
        bus
    }

    #[tokio::test]
    async fn test_publish_reaches_every_instance() {
        let link = BrokerLink::new();
        let a = node(&link);
        let b = node(&link);
        assert_eq!(link.attached(), 2);

        let (cb_a, mut rx_a) = recorder();
        let (cb_b, mut rx_b) = recorder();
        a.core.subscribe(&user("mel"), "chat/+", cb_a).await.unwrap();
        b.core.subscribe(&user("maria"), "chat/#", cb_b).await.unwrap();

        a.core.publish(&user("mel"), "chat/general", json!("hi")).await.unwrap();

        assert_eq!(next(&mut rx_a).await, ("chat/general".to_string(), json!("hi")));
        assert_eq!(next(&mut rx_b).await, ("chat/general".to_string(), json!("hi")));
        nothing(&mut rx_a).await;
        nothing(&mut rx_b).await;
    }

    #[tokio::test]
    async fn test_private_topics_across_instances() {
        let link = BrokerLink::new();
        let a = node(&link);
        let b = node(&link);

        let (mel_cb, mut mel_rx) = recorder();
        b.core.subscribe(&user("mel"), "user/mel", mel_cb).await.unwrap();

        a.core.publish(&user("maria"), "user/mel", json!("dm")).await.unwrap();
        assert_eq!(next(&mut mel_rx).await.1, json!("dm"));
    }

    #[tokio::test]
    async fn test_external_topics_go_to_broker_only() {
        let link = BrokerLink::new();
        let a = node(&link);
        let mut tap = link.tap();

        a.core.publish(&user("mel"), "external/feed", json!(1)).await.unwrap();

        let envelope = tap.recv().await.unwrap();
        assert!(envelope.external);
        assert_eq!(envelope.topic, "external/feed");
    }

    #[tokio::test]
    async fn test_stopped_instance_receives_nothing() {
        let link = BrokerLink::new();
        let a = node(&link);
        let b = node(&link);

        let (callback, mut rx) = recorder();
        b.core.subscribe(&user("mel"), "news", callback).await.unwrap();
        b.core.stop_listeners();

        a.core.publish(&user("mel"), "news", json!(1)).await.unwrap();
        nothing(&mut rx).await;

        b.core.start_listeners();
        a.core.publish(&user("mel"), "news", json!(2)).await.unwrap();
        assert_eq!(next(&mut rx).await.1, json!(2));
    }
}
