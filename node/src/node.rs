//! Full node implementation

use crate::api::start_api_server;
use crate::runtime::NodeRuntime;
use agora_ballot::BallotManifest;
use agora_core::{Address, AgoraError, AgoraResult, NodeConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Node serving a single ballot
pub struct AgoraNode {
    runtime: Arc<NodeRuntime>,
}

impl AgoraNode {
    /// Create a new node
    pub fn new(config: NodeConfig, owner: Address) -> Self {
        let runtime = Arc::new(NodeRuntime::new(config, owner));
        Self { runtime }
    }

    /// Start the node and run until ctrl-c
    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting Agora node {}...", self.runtime.config().name);

        let observer_handle = self.runtime.spawn_event_observer();

        // Start API server
        let api_runtime = self.runtime.clone();
        let api_addr = self.runtime.config().api.listen_addr.clone();

        let api_handle = tokio::spawn(async move {
            if let Err(e) = start_api_server(api_runtime, &api_addr).await {
                error!("API server error: {}", e);
            }
        });

        info!("Node started successfully");
        info!("Ballot owner: {}", self.runtime.ballot().owner().to_hex());
        info!("Workflow status: {}", self.runtime.ballot().workflow_status());

        // Wait for shutdown signal
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping node...");
            }
            Err(e) => {
                error!("Error waiting for shutdown signal: {}", e);
            }
        }

        // Cleanup
        api_handle.abort();
        if let Some(handle) = observer_handle {
            handle.abort();
        }

        info!("Node stopped");

        Ok(())
    }

    /// Get runtime reference
    pub fn runtime(&self) -> &Arc<NodeRuntime> {
        &self.runtime
    }
}

/// Node builder for easier configuration
pub struct NodeBuilder {
    config: NodeConfig,
    owner: Option<Address>,
    manifest: Option<BallotManifest>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
            owner: None,
            manifest: None,
        }
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn owner(mut self, owner: Address) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Voters in the manifest are registered at build time. The manifest
    /// owner is used when no explicit owner was set.
    pub fn manifest(mut self, manifest: BallotManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn api_addr(mut self, addr: &str) -> Self {
        self.config.api.listen_addr = addr.to_string();
        self
    }

    pub fn build(self) -> AgoraResult<AgoraNode> {
        let owner = match (self.owner, &self.manifest) {
            (Some(owner), _) => owner,
            (None, Some(manifest)) => manifest.parse_owner()?,
            (None, None) => {
                return Err(AgoraError::ConfigError(
                    "ballot owner is required (use a manifest or --owner)".into(),
                ))
            }
        };

        self.config.ballot.validate()?;
        let node = AgoraNode::new(self.config, owner);

        if let Some(manifest) = self.manifest {
            node.runtime.apply_manifest(manifest)?;
        }

        Ok(node)
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
