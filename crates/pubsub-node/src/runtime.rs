//! Wiring of the bus, its collaborators and the realtime endpoint.
//!
//! ## Startup Sequence
//!
//! 1. Plugin host and the provider/transport registries
//! 2. Topic ACL checker over the configured rule file (fail-open if absent)
//! 3. Messaging core, watching the configured external provider
//! 4. Realtime handler, watching the WebSocket transport (if enabled)
//! 5. Load the units: in-process broker provider, WebSocket transport
//! 6. Serve the WebSocket endpoint

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use pubsub_core::{
    BroadcastProvider, BrokerLink, ExternalProviderRegistry, JsonFileAclSource, MessagingCore,
    PluginHost, TopicAclChecker,
};
use pubsub_realtime::{
    router, RealtimeProtocolHandler, TransportRegistry, WebSocketTransport,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct NodeRuntime {
    config: NodeConfig,
    host: Arc<PluginHost>,
    providers: Arc<ExternalProviderRegistry>,
    transports: Arc<TransportRegistry>,
    broker: BrokerLink,
    core: MessagingCore,
    realtime: Option<RealtimeProtocolHandler>,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl NodeRuntime {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let host = Arc::new(PluginHost::new());
        let providers = Arc::new(ExternalProviderRegistry::new());
        let transports = Arc::new(TransportRegistry::new());

        let acl = match &config.bus.topic_acl {
            Some(path) => TopicAclChecker::new(Arc::new(JsonFileAclSource::new(path))),
            None => TopicAclChecker::disabled(),
        };

        let core = MessagingCore::new(
            config.bus.clone(),
            Arc::new(acl),
            Arc::clone(&providers),
            host.clone(),
        )
        .context("invalid bus configuration")?;

        let realtime = if config.bus.enable_web_sockets {
            config
                .realtime
                .validate()
                .context("invalid realtime configuration")?;
            Some(RealtimeProtocolHandler::new(
                Arc::new(core.clone()),
                Arc::clone(&transports),
                host.clone(),
                config.realtime.transport_name.clone(),
            ))
        } else {
            info!("WebSockets disabled");
            None
        };

        Ok(Self {
            config,
            host,
            providers,
            transports,
            broker: BrokerLink::new(),
            core,
            realtime,
            server: Mutex::new(None),
        })
    }

    pub fn core(&self) -> &MessagingCore {
        &self.core
    }

    pub fn realtime(&self) -> Option<&RealtimeProtocolHandler> {
        self.realtime.as_ref()
    }

    pub fn host(&self) -> Arc<PluginHost> {
        Arc::clone(&self.host)
    }

    /// The in-process broker the configured provider is attached to.
    pub fn broker(&self) -> &BrokerLink {
        &self.broker
    }

    /// Start listeners, load the units and serve the WebSocket endpoint.
    /// Returns the address actually bound, if any.
    pub async fn start(&self) -> Result<Option<SocketAddr>> {
        self.core.start_listeners();

        if let Some(name) = &self.config.bus.external_provider_name {
            let provider = Arc::new(BroadcastProvider::new(name.clone(), &self.broker));
            self.host.load(&self.providers, provider);
        }

        let Some(realtime) = &self.realtime else {
            info!("Pubsub node started");
            return Ok(None);
        };
        realtime.start_listeners();

        let transport = Arc::new(WebSocketTransport::new(&self.config.realtime));
        self.host.load(&self.transports, transport.clone());

        let listener = TcpListener::bind(self.config.realtime.bind_address)
            .await
            .with_context(|| format!("failed to bind {}", self.config.realtime.bind_address))?;
        let addr = listener.local_addr()?;

        info!(addr = %addr, "Starting WebSocket server");
        let app = router(transport);
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "WebSocket server error");
            }
        });
        *self.server.lock() = Some(server);

        info!("Pubsub node started");
        Ok(Some(addr))
    }

    pub async fn shutdown(&self) {
        info!("Shutting down pubsub node");

        if let Some(server) = self.server.lock().take() {
            server.abort();
        }
        if let Some(realtime) = &self.realtime {
            realtime.stop_listeners();
            self.host.unload(&self.transports, &self.config.realtime.transport_name);
        }
        self.core.stop_listeners();
        if let Some(name) = &self.config.bus.external_provider_name {
            self.host.unload(&self.providers, name);
        }

        info!("Pubsub node stopped");
    }
}
