//! Asynchronous marketplace client.

use crate::models::{
    Acknowledged, BillingDetails, DeployServerRequest, Deployment, ModifyServerRequest,
    ServerDetail, ServerList, ServerStatus, Stock,
};
use crate::Result;
use serde::de::DeserializeOwned;
use tensordock_core::client::{ClientConfig, ServiceClient, ServiceClientBuilder};
use tensordock_core::{Credentials, FormBody, MarketplaceConfig, Reply};
use tracing::debug;
use url::Url;

/// Builder for [`MarketplaceClient`].
#[derive(Debug, Clone)]
pub struct MarketplaceClientBuilder {
    inner: ServiceClientBuilder,
}

impl MarketplaceClientBuilder {
    /// Create a builder for the specified base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            inner: ServiceClientBuilder::new(base_url)?,
        })
    }

    /// Create a builder from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured service URL is invalid.
    pub fn from_config(config: &MarketplaceConfig) -> Result<Self> {
        Ok(Self {
            inner: ServiceClientBuilder::from_config(config)?,
        })
    }

    /// Attach API credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.inner = self.inner.with_credentials(credentials);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.inner = self.inner.with_http_config(config);
        self
    }

    /// Enable or disable wire dumps.
    #[must_use]
    pub fn with_wire_dump(mut self, enabled: bool) -> Self {
        self.inner = self.inner.with_wire_dump(enabled);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<MarketplaceClient> {
        let inner = self.inner.build()?;
        Ok(MarketplaceClient { inner })
    }
}

/// Asynchronous marketplace client.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    inner: ServiceClient,
}

impl MarketplaceClient {
    /// Construct a client without credentials directly from the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        MarketplaceClientBuilder::new(base_url)?.build()
    }

    /// Construct a client from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured service URL is invalid.
    pub fn from_config(config: &MarketplaceConfig) -> Result<Self> {
        MarketplaceClientBuilder::from_config(config)?.build()
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// List every server on the account.
    pub async fn list_servers(&self) -> Result<Reply<ServerList>> {
        self.post_reply("list", &FormBody::new()).await
    }

    /// Fetch a single server.
    pub async fn get_server(&self, server: &str) -> Result<Reply<ServerDetail>> {
        self.post_reply("get/single", &server_form(server)).await
    }

    /// Fetch the lifecycle status of a server.
    pub async fn server_status(&self, server: &str) -> Result<Reply<ServerStatus>> {
        self.post_reply("deploy/status", &server_form(server)).await
    }

    /// Deploy a new server.
    pub async fn deploy_server(&self, request: &DeployServerRequest) -> Result<Reply<Deployment>> {
        debug!(name = %request.name, gpu_model = %request.gpu_model, "deploying server");
        self.post_reply("deploy/single", &request.to_form()).await
    }

    /// Change the resources of a server.
    pub async fn modify_server(
        &self,
        request: &ModifyServerRequest,
    ) -> Result<Reply<Acknowledged>> {
        self.post_reply("modify/single", &request.to_form()).await
    }

    /// Start a stopped server.
    pub async fn start_server(&self, server: &str) -> Result<Reply<Acknowledged>> {
        self.get_reply("start/single", &server_form(server), true)
            .await
    }

    /// Stop a running server.
    pub async fn stop_server(&self, server: &str) -> Result<Reply<Acknowledged>> {
        self.get_reply("stop/single", &server_form(server), true)
            .await
    }

    /// Restart a server.
    pub async fn restart_server(&self, server: &str) -> Result<Reply<Acknowledged>> {
        self.get_reply("restart/single", &server_form(server), true)
            .await
    }

    /// Delete a server.
    pub async fn delete_server(&self, server: &str) -> Result<Reply<Acknowledged>> {
        self.get_reply("delete/single", &server_form(server), true)
            .await
    }

    /// Fetch the account balance and spending rate.
    pub async fn billing(&self) -> Result<Reply<BillingDetails>> {
        self.get_reply("billing", &FormBody::new(), true).await
    }

    /// List host nodes and the GPUs they offer. Needs no credentials.
    pub async fn list_stock(&self) -> Result<Reply<Stock>> {
        let reply: Reply<Stock> = self
            .get_reply("deploy/hostnodes", &FormBody::new(), false)
            .await?;
        Ok(reply.map(Stock::with_gpu_names))
    }

    async fn get_reply<T>(&self, path: &str, params: &FormBody, auth: bool) -> Result<Reply<T>>
    where
        T: DeserializeOwned,
    {
        let canonical = self.inner.get(path, params, auth).await?;
        Reply::decode(&canonical)
    }

    async fn post_reply<T>(&self, path: &str, body: &FormBody) -> Result<Reply<T>>
    where
        T: DeserializeOwned,
    {
        let canonical = self.inner.post(path, body, true).await?;
        Reply::decode(&canonical)
    }
}

fn server_form(server: &str) -> FormBody {
    let mut form = FormBody::new();
    form.push("server", server);
    form
}
