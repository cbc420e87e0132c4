//! Client context object
//!
//! Owns the configuration, the entity cache, the REST client and, once
//! started, the shard coordinator. Every component is reached through it.

use shardline_cache::{CacheConfig, EntityCache};
use shardline_common::{ClientConfig, ShardCount};
use shardline_core::{Channel, Member, Snowflake, User};
use shardline_gateway::shard::DEFAULT_GATEWAY_URL;
use shardline_gateway::{
    Coordinator, CoordinatorConfig, Dispatcher, EventStream, GatewayTransport, ShardCommand,
    ShardState, WsTransport,
};
use shardline_rest::{HttpTransport, RestClient, RestClientConfig};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{ClientError, ClientResult};

/// How many shards to run, how many may handshake at once, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    pub shard_count: u32,
    pub concurrency: u32,
    pub gateway_url: String,
}

/// Bot client
///
/// Cheap to clone; clones share every component.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    cache: Arc<EntityCache>,
    rest: RestClient,
    gateway_transport: Arc<dyn GatewayTransport>,
    coordinator: Arc<Mutex<Option<Arc<Coordinator>>>>,
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    // === Components ===

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Entity cache kept in step with the gateway
    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    // === Lifecycle ===

    /// Work out the shard layout, asking the platform for whatever the
    /// configuration leaves open
    pub async fn shard_plan(&self) -> ClientResult<ShardPlan> {
        let sharding = &self.config.sharding;
        let needs_query = sharding.shard_count == ShardCount::Auto
            || sharding.concurrency.is_none()
            || self.config.gateway.url.is_none();

        let info = if needs_query {
            let info = self.rest.gateway_bot().await?;
            let limit = info.session_start_limit;
            tracing::info!(
                recommended_shards = info.shards,
                max_concurrency = limit.max_concurrency,
                sessions_remaining = limit.remaining,
                "Gateway info fetched"
            );
            Some(info)
        } else {
            None
        };

        let shard_count = match sharding.shard_count {
            ShardCount::Fixed(count) => count,
            ShardCount::Auto => info.as_ref().map_or(1, |info| info.shards.max(1)),
        };
        let concurrency = sharding
            .concurrency
            .or_else(|| info.as_ref().map(|info| info.session_start_limit.max_concurrency))
            .unwrap_or(1)
            .max(1);
        let gateway_url = self
            .config
            .gateway
            .url
            .clone()
            .or_else(|| info.as_ref().map(|info| info.url.clone()))
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());

        if let Some(info) = &info {
            if info.session_start_limit.remaining < shard_count {
                tracing::warn!(
                    shards = shard_count,
                    sessions_remaining = info.session_start_limit.remaining,
                    "Not enough session starts left for every shard"
                );
            }
        }

        Ok(ShardPlan {
            shard_count,
            concurrency,
            gateway_url,
        })
    }

    /// Connect every shard and return the event stream
    ///
    /// # Errors
    /// Returns [`ClientError::AlreadyStarted`] if the shards are already running
    pub async fn start(&self) -> ClientResult<EventStream> {
        let mut slot = self.coordinator.lock().await;
        if slot.is_some() {
            return Err(ClientError::AlreadyStarted);
        }

        let plan = self.shard_plan().await?;
        let config = CoordinatorConfig::from_client(
            &self.config,
            plan.shard_count,
            plan.concurrency,
            plan.gateway_url,
        );
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&self.cache)));
        let (coordinator, events) =
            Coordinator::start(config, Arc::clone(&self.gateway_transport), dispatcher)?;

        *slot = Some(Arc::new(coordinator));
        Ok(events)
    }

    async fn coordinator(&self) -> ClientResult<Arc<Coordinator>> {
        self.coordinator
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NotStarted)
    }

    /// Wait until the shards stop on their own
    pub async fn wait(&self) -> ClientResult<()> {
        self.coordinator().await?.wait().await?;
        Ok(())
    }

    /// Close every shard and fail queued REST requests
    pub async fn shutdown(&self) -> ClientResult<()> {
        self.rest.close();
        let coordinator = self.coordinator.lock().await.take();
        match coordinator {
            Some(coordinator) => coordinator.shutdown().await.map_err(Into::into),
            None => Ok(()),
        }
    }

    // === Shards ===

    /// Current state of every running shard
    pub async fn shard_states(&self) -> ClientResult<Vec<(u32, ShardState)>> {
        Ok(self.coordinator().await?.shard_states())
    }

    /// Send a gateway command through the shard that owns `guild_id`
    pub async fn send_to_guild(&self, guild_id: Snowflake, command: ShardCommand) -> ClientResult<()> {
        self.coordinator()
            .await?
            .send_to_guild(guild_id, command)
            .await?;
        Ok(())
    }

    // === Cache-or-fetch ===

    /// A guild member, from the cache or else from the API.
    ///
    /// A fetched member is cached only when its guild is cached. `None`
    /// means the member does not exist.
    pub async fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> ClientResult<Option<Member>> {
        if let Some(member) = self.cache.member(guild_id, user_id) {
            return Ok(Some(member));
        }
        tracing::debug!(guild_id = %guild_id, user_id = %user_id, "Member not cached, fetching");
        match self.rest.get_member(guild_id, user_id).await {
            Ok((member, user)) => {
                self.cache.upsert_member(member.clone(), user);
                Ok(Some(member))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// A channel, from the cache or else from the API.
    ///
    /// A fetched guild channel is cached only when its guild is cached.
    pub async fn channel(&self, channel_id: Snowflake) -> ClientResult<Option<Channel>> {
        if let Some(channel) = self.cache.channel(channel_id) {
            return Ok(Some(channel));
        }
        tracing::debug!(channel_id = %channel_id, "Channel not cached, fetching");
        match self.rest.get_channel(channel_id).await {
            Ok(channel) => {
                if channel.guild_id.is_some() {
                    self.cache.upsert_channel(channel.clone(), Vec::new());
                }
                Ok(Some(channel))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The bot user, from READY or else from the API
    pub async fn current_user(&self) -> ClientResult<User> {
        if let Some(user) = self.cache.current_user() {
            return Ok(user);
        }
        self.rest.current_user().await.map_err(Into::into)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("cache", &"EntityCache")
            .field("rest", &self.rest)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`]; transports default to WebSocket and reqwest
pub struct ClientBuilder {
    config: ClientConfig,
    gateway_transport: Option<Arc<dyn GatewayTransport>>,
    http_transport: Option<Arc<dyn HttpTransport>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            gateway_transport: None,
            http_transport: None,
        }
    }

    /// Builder over configuration loaded from the environment
    pub fn from_env() -> ClientResult<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    pub fn gateway_transport(mut self, transport: Arc<dyn GatewayTransport>) -> Self {
        self.gateway_transport = Some(transport);
        self
    }

    pub fn http_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http_transport = Some(transport);
        self
    }

    /// Build the client
    ///
    /// # Errors
    /// Returns [`ClientError::Cache`] for an unknown cache kind name, or
    /// [`ClientError::Rest`] if the HTTP client cannot be created
    pub fn build(self) -> ClientResult<Client> {
        let cache_config = CacheConfig::try_from(&self.config.cache)?;
        let rest_config = RestClientConfig::from_client(&self.config);
        let rest = match self.http_transport {
            Some(transport) => RestClient::with_transport(rest_config, transport),
            None => RestClient::new(rest_config)?,
        };
        let gateway_transport = self
            .gateway_transport
            .unwrap_or_else(|| Arc::new(WsTransport));

        tracing::debug!(
            intents = self.config.intents.bits(),
            api_version = self.config.api_version,
            "Client built"
        );

        Ok(Client {
            config: Arc::new(self.config),
            cache: EntityCache::new_shared(cache_config),
            rest,
            gateway_transport,
            coordinator: Arc::default(),
        })
    }
}
