//! The SDK context object.
//!
//! # Design
//! `Sdk` is constructed explicitly by the host and owns every component:
//! configuration, request registry, network monitor, transport, crash
//! logger, behavior tracker and image loader. There is no global state apart
//! from the panic hook, which the process only has one of.
//!
//! The network monitor starts as `Unknown`, which counts as unreachable, so
//! hosts push the real status right after construction.

use std::sync::Arc;

use tracing::info;

use crate::behavior::BehaviorTracker;
use crate::client::{api_key, ClientContext, NetClient};
use crate::config::{RequestConfig, SdkConfig};
use crate::crash::CrashLogger;
use crate::error::{Result, SdkError};
use crate::image::{ImageCache, ImageLoader};
use crate::network::NetworkMonitor;
use crate::registry::RequestRegistry;
use crate::transport::Transport;

pub struct Sdk {
    ctx: Arc<ClientContext>,
    http: NetClient,
    crash: Arc<CrashLogger>,
    behavior: BehaviorTracker,
    images: ImageLoader,
}

impl Sdk {
    /// Validate `config` and build every component over `transport`.
    pub fn new(config: SdkConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let ctx = Arc::new(ClientContext {
            config: config.clone(),
            registry: Arc::new(RequestRegistry::new()),
            network: Arc::new(NetworkMonitor::default()),
            transport,
        });

        let crash = Arc::new(CrashLogger::from_config(&config));
        if config.crash_handler {
            crash.install();
        }
        let behavior = BehaviorTracker::from_config(&config)?;

        let http = NetClient::new(ctx.clone(), RequestConfig::default());
        let images = ImageLoader::new(Arc::new(ImageCache::new(config.image_memory_cost())), http.clone());

        info!(
            base_url = %config.base_url,
            documents = %config.documents_dir().display(),
            "sdk initialized"
        );
        Ok(Self {
            ctx,
            http,
            crash,
            behavior,
            images,
        })
    }

    pub fn config(&self) -> &SdkConfig {
        &self.ctx.config
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.ctx.network
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.ctx.registry
    }

    /// Client with no per-request overrides.
    pub fn http(&self) -> &NetClient {
        &self.http
    }

    /// Client bound to `request`.
    pub fn client(&self, request: RequestConfig) -> Result<NetClient> {
        request.validate()?;
        Ok(NetClient::new(self.ctx.clone(), request))
    }

    pub fn crash_logger(&self) -> &Arc<CrashLogger> {
        &self.crash
    }

    /// Install the panic hook regardless of `SdkConfig::crash_handler`.
    pub fn install_crash_handler(&self) -> bool {
        self.crash.install()
    }

    pub fn behavior(&self) -> &BehaviorTracker {
        &self.behavior
    }

    pub fn images(&self) -> &ImageLoader {
        &self.images
    }

    pub fn suspend_request_by_url(&self, url: &str) -> Result<()> {
        self.ctx.registry.suspend(non_empty(url)?);
        Ok(())
    }

    pub fn resume_request_by_url(&self, url: &str) -> Result<()> {
        self.ctx.registry.resume(non_empty(url)?);
        Ok(())
    }

    pub fn cancel_request_by_url(&self, url: &str) -> Result<()> {
        self.ctx.registry.cancel(non_empty(url)?);
        Ok(())
    }

    pub fn suspend_request_by_api(&self, api: &str) -> Result<()> {
        self.ctx.registry.suspend(&self.api_key(api)?);
        Ok(())
    }

    pub fn resume_request_by_api(&self, api: &str) -> Result<()> {
        self.ctx.registry.resume(&self.api_key(api)?);
        Ok(())
    }

    pub fn cancel_request_by_api(&self, api: &str) -> Result<()> {
        self.ctx.registry.cancel(&self.api_key(api)?);
        Ok(())
    }

    fn api_key(&self, api: &str) -> Result<String> {
        api_key(&self.ctx.config, non_empty(api)?)
    }
}

fn non_empty(key: &str) -> Result<&str> {
    if key.trim().is_empty() {
        Err(SdkError::EmptyUrl)
    } else {
        Ok(key)
    }
}
