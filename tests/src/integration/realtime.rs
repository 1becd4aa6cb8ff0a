//! # Realtime Round Trips
//!
//! Full node with its WebSocket endpoint, driven by a real WebSocket
//! client the way a browser would.

#[cfg(test)]
mod tests {
    use futures::{SinkExt, StreamExt};
    use pubsub_core::{Identity, MessagingApi};
    use pubsub_node::{NodeConfig, NodeRuntime};
    use pubsub_realtime::ws::{ROLES_HEADER, USER_HEADER, WS_PATH};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::time::{sleep, timeout};
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    async fn start_node() -> (NodeRuntime, SocketAddr) {
        let mut config = NodeConfig::default();
        config.realtime.bind_address = "127.0.0.1:0".parse().unwrap();
        let runtime = NodeRuntime::new(config).unwrap();
        let addr = runtime.start().await.unwrap().unwrap();
        (runtime, addr)
    }

    async fn connect(addr: SocketAddr, user: &'static str) -> Client {
        let mut request = format!("ws://{}{}", addr, WS_PATH).into_client_request().unwrap();
        request
            .headers_mut()
            .insert(USER_HEADER, HeaderValue::from_static(user));
        request
            .headers_mut()
            .insert(ROLES_HEADER, HeaderValue::from_static("User"));
        let (client, _) = connect_async(request).await.unwrap();
        client
    }

    async fn send(client: &mut Client, frame: Value) {
        client
            .send(Message::Text(frame.to_string().into()))
            .await
            .unwrap();
    }

    async fn receive(client: &mut Client) -> Value {
        loop {
            let message = timeout(Duration::from_secs(2), client.next())
                .await
                .expect("timeout waiting for frame")
                .expect("connection closed")
                .unwrap();
            if let Message::Text(text) = message {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn silent(client: &mut Client) {
        assert!(timeout(Duration::from_millis(100), client.next()).await.is_err());
    }

    // =============================================================================
    // INTEGRATION TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_subscribe_publish_round_trip() {
        let (runtime, addr) = start_node().await;
        let mut client = connect(addr, "mel").await;

        send(&mut client, json!({"messageId": "1", "command": "subscribe", "topic": "chat/+"})).await;
        assert_eq!(receive(&mut client).await, json!({"messageId": "1", "success": true}));

        send(
            &mut client,
            json!({"messageId": "2", "command": "publish", "topic": "chat/general", "message": {"text": "hi"}}),
        )
        .await;

        let mut frames = vec![receive(&mut client).await, receive(&mut client).await];
        frames.sort_by_key(|frame| frame.get("remoteMessage").is_some());
        assert_eq!(frames[0], json!({"messageId": "2", "success": true}));
        assert_eq!(
            frames[1],
            json!({"remoteMessage": true, "topic": "chat/general", "message": {"text": "hi"}})
        );
        silent(&mut client).await;

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_server_side_publish_pushed_to_client() {
        let (runtime, addr) = start_node().await;
        let mut client = connect(addr, "mel").await;

        send(&mut client, json!({"messageId": "1", "command": "subscribe", "topic": "user/mel/#"})).await;
        receive(&mut client).await;

        let system = Identity::new("system", ["Service"]);
        runtime
            .core()
            .publish(&system, "user/mel/notification", json!({"unread": 3}))
            .await
            .unwrap();

        assert_eq!(
            receive(&mut client).await,
            json!({"remoteMessage": true, "topic": "user/mel/notification", "message": {"unread": 3}})
        );

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_error_responses_and_dropped_frames() {
        let (runtime, addr) = start_node().await;
        let mut client = connect(addr, "mel").await;

        send(&mut client, json!({"messageId": "1", "command": "unsubscribe", "topic": "never"})).await;
        let response = receive(&mut client).await;
        assert_eq!(response["messageId"], "1");
        assert_eq!(response["error"], true);

        send(&mut client, json!({"messageId": "2", "command": "subscribe", "topic": "user/maria"})).await;
        let response = receive(&mut client).await;
        assert_eq!(response["error"], true);
        assert!(response["message"].is_string());

        send(&mut client, json!({"command": "subscribe", "topic": "x"})).await;
        client.send(Message::Text("not json".into())).await.unwrap();
        silent(&mut client).await;

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_cleans_up_subscriptions() {
        let (runtime, addr) = start_node().await;
        let mut client = connect(addr, "mel").await;

        for (id, topic) in [("1", "a/b"), ("2", "c/#")] {
            send(&mut client, json!({"messageId": id, "command": "subscribe", "topic": topic})).await;
            receive(&mut client).await;
        }
        assert_eq!(runtime.core().subscription_count(), 2);

        client.close(None).await.unwrap();

        let cleaned = timeout(Duration::from_secs(2), async {
            while runtime.core().subscription_count() > 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(cleaned.is_ok(), "subscriptions not removed on disconnect");
        assert_eq!(runtime.realtime().unwrap().session_count(), 0);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_two_clients_see_each_other() {
        let (runtime, addr) = start_node().await;
        let mut mel = connect(addr, "mel").await;
        let mut maria = connect(addr, "maria").await;

        send(&mut maria, json!({"messageId": "s", "command": "subscribe", "topic": "room/1"})).await;
        receive(&mut maria).await;

        send(
            &mut mel,
            json!({"messageId": "p", "command": "publish", "topic": "room/1", "message": "hello"}),
        )
        .await;
        assert_eq!(receive(&mut mel).await, json!({"messageId": "p", "success": true}));
        assert_eq!(
            receive(&mut maria).await,
            json!({"remoteMessage": true, "topic": "room/1", "message": "hello"})
        );
        silent(&mut mel).await;

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_upgrade_without_identity_rejected() {
        let (runtime, addr) = start_node().await;
        let result = connect_async(format!("ws://{}{}", addr, WS_PATH)).await;
        assert!(result.is_err());
        runtime.shutdown().await;
    }
}
