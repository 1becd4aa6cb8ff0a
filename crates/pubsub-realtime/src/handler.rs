//! # Realtime Protocol Handler
//!
//! Exposes the bus to remote clients over a [`RealtimeTransport`] with the
//! command/response protocol in [`crate::domain::protocol`].
//!
//! Sessions are created on a connection's first frame and torn down on
//! disconnect, unsubscribing everything the connection still holds. A
//! detached handler no longer hears disconnects, so stopping the handler or
//! losing the transport tears down every session at once.
//!
//! The transport is a host-loaded unit: like the core does for its external
//! provider, the handler follows the transport's load/unload events and
//! re-attaches itself to whichever instance is current.

use crate::domain::protocol::{
    error_response, push_message, success_response, ClientCommand, Command,
};
use crate::domain::session::Session;
use crate::error::{RealtimeError, RealtimeResult};
use crate::ports::transport::{
    Connection, ConnectionHandler, ConnectionId, HandlerId, RealtimeTransport, TransportRegistry,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use pubsub_core::{
    watch_lifecycle, Identity, LifecycleEvent, LifecycleNotifier, MessageCallback, MessagingApi,
};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

#[derive(Default)]
struct TransportLink {
    started: bool,
    active: Option<Arc<dyn RealtimeTransport>>,
    handler: Option<HandlerId>,
}

impl TransportLink {
    fn attach(&mut self, handler: &Weak<HandlerInner>) {
        if let Some(transport) = &self.active {
            let id = transport.add_handler(Arc::new(HandlerRef(handler.clone())));
            info!(transport = transport.name(), "Attached realtime handler");
            self.handler = Some(id);
        }
    }

    fn detach(&mut self) {
        if let (Some(transport), Some(id)) = (&self.active, self.handler.take()) {
            transport.remove_handler(id);
            info!(transport = transport.name(), "Detached realtime handler");
        }
    }
}

struct HandlerInner {
    bus: Arc<dyn MessagingApi>,
    transports: Arc<TransportRegistry>,
    transport_name: String,
    sessions: DashMap<ConnectionId, Session>,
    link: Mutex<TransportLink>,
    this: Weak<HandlerInner>,
}

/// Bridges realtime connections to the messaging API. Cheap to clone.
#[derive(Clone)]
pub struct RealtimeProtocolHandler {
    inner: Arc<HandlerInner>,
}

impl RealtimeProtocolHandler {
    pub fn new(
        bus: Arc<dyn MessagingApi>,
        transports: Arc<TransportRegistry>,
        notifier: Arc<dyn LifecycleNotifier>,
        transport_name: impl Into<String>,
    ) -> Self {
        let transport_name = transport_name.into();
        let inner = Arc::new_cyclic(|this| HandlerInner {
            bus,
            transports,
            transport_name: transport_name.clone(),
            sessions: DashMap::new(),
            link: Mutex::new(TransportLink::default()),
            this: this.clone(),
        });

        inner.transport_loaded();
        watch_transport(notifier, transport_name, Arc::downgrade(&inner));

        Self { inner }
    }

    /// Attach to the active transport. Idempotent.
    pub fn start_listeners(&self) {
        let mut link = self.inner.link.lock();
        if link.started {
            return;
        }
        link.started = true;
        link.attach(&self.inner.this);
        info!(transport = %self.inner.transport_name, "Realtime handler started");
    }

    /// Detach from the transport and close every session. Idempotent.
    pub fn stop_listeners(&self) {
        {
            let mut link = self.inner.link.lock();
            if !link.started {
                return;
            }
            link.detach();
            link.started = false;
        }
        self.inner.close_sessions();
        info!(transport = %self.inner.transport_name, "Realtime handler stopped");
    }

    pub fn is_started(&self) -> bool {
        self.inner.link.lock().started
    }

    pub fn has_transport(&self) -> bool {
        self.inner.link.lock().active.is_some()
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Topics `connection` is subscribed to, in subscription order.
    pub fn subscriptions_of(&self, connection: ConnectionId) -> Vec<String> {
        self.inner
            .sessions
            .get(&connection)
            .map(|session| session.topics())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for RealtimeProtocolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeProtocolHandler")
            .field("transport", &self.inner.transport_name)
            .field("sessions", &self.session_count())
            .finish()
    }
}

#[async_trait]
impl ConnectionHandler for RealtimeProtocolHandler {
    async fn on_message(&self, connection: &Connection, frame: Value) {
        self.inner.handle_message(connection, frame).await;
    }

    async fn on_disconnect(&self, connection: ConnectionId) {
        self.inner.handle_disconnect(connection).await;
    }
}

/// What the transport holds: a weak handle, so a dropped handler does not
/// stay alive through its transport.
struct HandlerRef(Weak<HandlerInner>);

#[async_trait]
impl ConnectionHandler for HandlerRef {
    async fn on_message(&self, connection: &Connection, frame: Value) {
        if let Some(inner) = self.0.upgrade() {
            inner.handle_message(connection, frame).await;
        }
    }

    async fn on_disconnect(&self, connection: ConnectionId) {
        if let Some(inner) = self.0.upgrade() {
            inner.handle_disconnect(connection).await;
        }
    }
}

impl HandlerInner {
    fn active_transport(&self) -> Option<Arc<dyn RealtimeTransport>> {
        self.link.lock().active.clone()
    }

    fn transport_loaded(&self) {
        let transport = self.transports.find(&self.transport_name);
        let replaced = {
            let mut link = self.link.lock();
            if link.started {
                link.detach();
            }
            let replaced = match (&link.active, &transport) {
                (Some(old), Some(new)) => !Arc::ptr_eq(old, new),
                (Some(_), None) => true,
                (None, _) => false,
            };
            link.active = transport;
            match &link.active {
                Some(_) => info!(transport = %self.transport_name, "Realtime transport active"),
                None => warn!(transport = %self.transport_name, "Realtime transport not registered"),
            }
            if link.started {
                link.attach(&self.this);
            }
            replaced
        };
        // connections of the previous instance went away with it
        if replaced {
            self.close_sessions();
        }
    }

    fn transport_unloaded(&self) {
        {
            let mut link = self.link.lock();
            if link.started {
                link.detach();
            }
            link.active = None;
        }
        self.close_sessions();
        info!(transport = %self.transport_name, "Realtime transport gone");
    }

    /// Drop every session and release its bus subscriptions in the
    /// background.
    fn close_sessions(&self) {
        let ids: Vec<ConnectionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let closed: Vec<(ConnectionId, Session)> = ids
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id))
            .collect();
        if closed.is_empty() {
            return;
        }

        info!(transport = %self.transport_name, sessions = closed.len(), "Closing realtime sessions");
        let bus = Arc::clone(&self.bus);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for (connection, session) in closed {
                        release_session(bus.as_ref(), connection, session).await;
                    }
                });
            }
            Err(_) => warn!(
                transport = %self.transport_name,
                "No async runtime, session subscriptions left on the bus"
            ),
        }
    }

    async fn handle_message(&self, connection: &Connection, frame: Value) {
        self.sessions
            .entry(connection.id)
            .or_insert_with(|| Session::new(connection.identity.clone()));

        let command = match ClientCommand::parse(&frame) {
            Ok(command) => command,
            Err(e) => {
                warn!(connection_id = %connection.id, error = %e, "Dropping malformed message");
                return;
            }
        };

        debug!(
            connection_id = %connection.id,
            message_id = %command.message_id,
            command = command.command.name(),
            topic = command.command.topic(),
            "Realtime command"
        );

        let identity = &connection.identity;
        let outcome = match command.command {
            Command::Subscribe { topic } => self.subscribe(connection.id, identity, &topic).await,
            Command::Unsubscribe { topic } => self.unsubscribe(connection.id, &topic).await,
            Command::Publish { topic, message } => self
                .bus
                .publish(identity, &topic, message)
                .await
                .map_err(RealtimeError::from),
        };

        let response = match outcome {
            Ok(()) => success_response(&command.message_id),
            Err(e) => {
                debug!(connection_id = %connection.id, error = %e, "Command rejected");
                error_response(&command.message_id, &e.to_string())
            }
        };
        self.send(connection.id, response).await;
    }

    async fn subscribe(
        &self,
        connection: ConnectionId,
        identity: &Identity,
        topic: &str,
    ) -> RealtimeResult<()> {
        let already = self
            .sessions
            .get(&connection)
            .is_some_and(|session| session.is_subscribed(topic));
        if already {
            return Ok(());
        }

        let callback = self.push_callback(connection);
        self.bus.subscribe(identity, topic, callback.clone()).await?;

        let recorded = match self.sessions.get_mut(&connection) {
            Some(mut session) => {
                session.add(topic, callback.clone());
                true
            }
            None => false,
        };
        if !recorded {
            // disconnected while subscribing
            self.bus.unsubscribe(topic, &callback).await?;
        }
        Ok(())
    }

    async fn unsubscribe(&self, connection: ConnectionId, topic: &str) -> RealtimeResult<()> {
        let callback = self
            .sessions
            .get(&connection)
            .and_then(|session| session.find(topic).map(|entry| entry.callback.clone()))
            .ok_or_else(|| RealtimeError::NotSubscribed {
                topic: topic.to_string(),
            })?;

        self.bus.unsubscribe(topic, &callback).await?;

        if let Some(mut session) = self.sessions.get_mut(&connection) {
            session.remove(topic);
        }
        Ok(())
    }

    async fn handle_disconnect(&self, connection: ConnectionId) {
        if let Some((_, session)) = self.sessions.remove(&connection) {
            release_session(self.bus.as_ref(), connection, session).await;
        }
    }

    async fn send(&self, connection: ConnectionId, frame: Value) {
        let Some(transport) = self.active_transport() else {
            warn!(connection_id = %connection, transport = %self.transport_name, "No transport, dropping response");
            return;
        };
        if let Err(e) = transport.send(connection, frame).await {
            warn!(connection_id = %connection, error = %e, "Failed to send to connection");
        }
    }

    /// Subscriber callback forwarding deliveries to `connection` as push
    /// messages.
    fn push_callback(&self, connection: ConnectionId) -> MessageCallback {
        let handler = self.this.clone();
        MessageCallback::new(move |payload, topic| {
            let inner = handler.upgrade().ok_or_else(|| RealtimeError::NoTransport {
                name: "<dropped handler>".into(),
            })?;
            if !inner.sessions.contains_key(&connection) {
                return Err(RealtimeError::ConnectionClosed { connection }.into());
            }
            let transport = inner
                .active_transport()
                .ok_or_else(|| RealtimeError::NoTransport {
                    name: inner.transport_name.clone(),
                })?;
            let frame = push_message(topic, payload);
            Handle::try_current()?.spawn(async move {
                if let Err(e) = transport.send(connection, frame).await {
                    debug!(connection_id = %connection, error = %e, "Push not delivered");
                }
            });
            Ok(())
        })
    }
}

/// Unsubscribe everything `session` holds. Failures are logged.
async fn release_session(bus: &dyn MessagingApi, connection: ConnectionId, session: Session) {
    for entry in &session.subscriptions {
        if let Err(e) = bus.unsubscribe(&entry.topic, &entry.callback).await {
            warn!(
                connection_id = %connection,
                topic = %entry.topic,
                error = %e,
                "Failed to unsubscribe on disconnect"
            );
        }
    }
    info!(
        connection_id = %connection,
        user = %session.identity.username,
        subscriptions = session.subscriptions.len(),
        "Realtime session closed"
    );
}

fn watch_transport(notifier: Arc<dyn LifecycleNotifier>, name: String, handler: Weak<HandlerInner>) {
    let weak = handler.clone();
    watch_lifecycle(
        Arc::clone(&notifier),
        LifecycleEvent::Load,
        name.clone(),
        Arc::new(move || match weak.upgrade() {
            Some(inner) => {
                inner.transport_loaded();
                true
            }
            None => false,
        }),
    );
    watch_lifecycle(
        notifier,
        LifecycleEvent::Unload,
        name,
        Arc::new(move || match handler.upgrade() {
            Some(inner) => {
                inner.transport_unloaded();
                true
            }
            None => false,
        }),
    );
}
