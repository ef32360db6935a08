//! Command handlers.
//!
//! Handlers talk to the marketplace through [`Marketplace`] and return the text
//! to print, leaving terminal I/O to the caller.

use crate::output;
use crate::remote::{RemoteCommand, ShellOptions, Task};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::Path;
use tensordock_core::{MarketplaceConfig, Reply};
use tensordock_marketplace::{
    Acknowledged, BillingDetails, DeployServerRequest, Deployment, MarketplaceClient,
    ModifyServerRequest, ServerDetail, ServerList, ServerStatus, Stock,
};
use tracing::{info, warn};

/// Marketplace operations used by the CLI.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Marketplace: Send + Sync {
    async fn list_servers(&self) -> tensordock_core::Result<Reply<ServerList>>;
    async fn get_server(&self, server: &str) -> tensordock_core::Result<Reply<ServerDetail>>;
    async fn server_status(&self, server: &str) -> tensordock_core::Result<Reply<ServerStatus>>;
    async fn deploy_server(
        &self,
        request: &DeployServerRequest,
    ) -> tensordock_core::Result<Reply<Deployment>>;
    async fn modify_server(
        &self,
        request: &ModifyServerRequest,
    ) -> tensordock_core::Result<Reply<Acknowledged>>;
    async fn start_server(&self, server: &str) -> tensordock_core::Result<Reply<Acknowledged>>;
    async fn stop_server(&self, server: &str) -> tensordock_core::Result<Reply<Acknowledged>>;
    async fn restart_server(&self, server: &str) -> tensordock_core::Result<Reply<Acknowledged>>;
    async fn delete_server(&self, server: &str) -> tensordock_core::Result<Reply<Acknowledged>>;
    async fn billing(&self) -> tensordock_core::Result<Reply<BillingDetails>>;
    async fn list_stock(&self) -> tensordock_core::Result<Reply<Stock>>;
}

#[async_trait]
impl Marketplace for MarketplaceClient {
    async fn list_servers(&self) -> tensordock_core::Result<Reply<ServerList>> {
        MarketplaceClient::list_servers(self).await
    }

    async fn get_server(&self, server: &str) -> tensordock_core::Result<Reply<ServerDetail>> {
        MarketplaceClient::get_server(self, server).await
    }

    async fn server_status(&self, server: &str) -> tensordock_core::Result<Reply<ServerStatus>> {
        MarketplaceClient::server_status(self, server).await
    }

    async fn deploy_server(
        &self,
        request: &DeployServerRequest,
    ) -> tensordock_core::Result<Reply<Deployment>> {
        MarketplaceClient::deploy_server(self, request).await
    }

    async fn modify_server(
        &self,
        request: &ModifyServerRequest,
    ) -> tensordock_core::Result<Reply<Acknowledged>> {
        MarketplaceClient::modify_server(self, request).await
    }

    async fn start_server(&self, server: &str) -> tensordock_core::Result<Reply<Acknowledged>> {
        MarketplaceClient::start_server(self, server).await
    }

    async fn stop_server(&self, server: &str) -> tensordock_core::Result<Reply<Acknowledged>> {
        MarketplaceClient::stop_server(self, server).await
    }

    async fn restart_server(&self, server: &str) -> tensordock_core::Result<Reply<Acknowledged>> {
        MarketplaceClient::restart_server(self, server).await
    }

    async fn delete_server(&self, server: &str) -> tensordock_core::Result<Reply<Acknowledged>> {
        MarketplaceClient::delete_server(self, server).await
    }

    async fn billing(&self) -> tensordock_core::Result<Reply<BillingDetails>> {
        MarketplaceClient::billing(self).await
    }

    async fn list_stock(&self) -> tensordock_core::Result<Reply<Stock>> {
        MarketplaceClient::list_stock(self).await
    }
}

/// Lifecycle actions that take only a server ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAction {
    Start,
    Stop,
    Restart,
    Delete,
}

impl ServerAction {
    fn past_tense(self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Stop => "stopped",
            Self::Restart => "restarted",
            Self::Delete => "deleted",
        }
    }
}

pub async fn list_servers(api: &dyn Marketplace) -> Result<String> {
    let list = api.list_servers().await?.into_result()?;
    Ok(output::server_table(&list))
}

pub async fn server_info(api: &dyn Marketplace, server: &str) -> Result<String> {
    let detail = api.get_server(server).await?.into_result()?;
    Ok(output::server_info(&detail.server))
}

pub async fn server_status(api: &dyn Marketplace, server: &str) -> Result<String> {
    let status = api.server_status(server).await?.into_result()?;
    Ok(status.status)
}

pub async fn server_action(
    api: &dyn Marketplace,
    action: ServerAction,
    server: &str,
) -> Result<String> {
    let reply = match action {
        ServerAction::Start => api.start_server(server).await?,
        ServerAction::Stop => api.stop_server(server).await?,
        ServerAction::Restart => api.restart_server(server).await?,
        ServerAction::Delete => api.delete_server(server).await?,
    };
    reply.into_result()?;
    Ok(format!("Server {server} {}", action.past_tense()))
}

pub async fn deploy(api: &dyn Marketplace, request: &DeployServerRequest) -> Result<String> {
    let deployment = api.deploy_server(request).await?.into_result()?;
    info!(server = %deployment.server, "server deployed");
    Ok(output::deployment_table(&deployment))
}

pub async fn modify(api: &dyn Marketplace, request: &ModifyServerRequest) -> Result<String> {
    api.modify_server(request).await?.into_result()?;
    Ok(format!("Server {} modified", request.server_id))
}

pub async fn billing(api: &dyn Marketplace) -> Result<String> {
    let billing = api.billing().await?.into_result()?;
    Ok(output::billing_table(&billing))
}

pub async fn stock(api: &dyn Marketplace, include_out_of_stock: bool) -> Result<String> {
    let stock = api.list_stock().await?.into_result()?;
    Ok(output::stock_table(output::stock_rows(
        &stock,
        include_out_of_stock,
    )))
}

/// Resolve a server's SSH endpoint and lay out the commands for `task`.
pub async fn remote_plan(
    api: &dyn Marketplace,
    server: &str,
    task: &Task,
    options: &ShellOptions,
) -> Result<Vec<RemoteCommand>> {
    let detail = api.get_server(server).await?.into_result()?;
    let endpoint = detail.server.remote_endpoint();
    if endpoint.host.is_empty() {
        bail!("Server {server} has no IP address yet");
    }

    Ok(task
        .steps()
        .iter()
        .map(|step| RemoteCommand::new(options, &endpoint, step.as_deref()))
        .collect())
}

/// Settings written by `td-stream config`.
#[derive(Debug, Default, Clone)]
pub struct ConfigUpdate {
    pub api_key: Option<String>,
    pub api_token: Option<String>,
    pub service_url: Option<String>,
    pub key_path: Option<String>,
}

/// Merge `update` into the configuration at `path` and save it.
///
/// A file that no longer loads is replaced, starting from the defaults.
pub fn configure(path: &Path, update: ConfigUpdate) -> Result<String> {
    let (Some(api_key), Some(api_token)) = (update.api_key, update.api_token) else {
        bail!("Both --api-key and --api-token are required");
    };

    let existing = MarketplaceConfig::load(path).unwrap_or_else(|err| {
        warn!("ignoring unreadable config {}: {err}", path.display());
        MarketplaceConfig::default()
    });
    let mut config = existing.with_credentials(api_key, api_token);
    if let Some(service_url) = update.service_url {
        config.service_url = service_url;
    }
    if let Some(key_path) = update.key_path {
        config.key_path = key_path;
    }

    config.save(path)?;
    Ok(format!("Configuration written to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tensordock_core::ApplicationFailure;
    use tensordock_marketplace::VirtualMachine;

    fn options() -> ShellOptions {
        ShellOptions {
            bin: "ssh".to_string(),
            user: "user".to_string(),
            key_path: PathBuf::from("/keys/id_rsa"),
        }
    }

    fn detail(ip: &str, forwards: &[(&str, &str)]) -> ServerDetail {
        ServerDetail {
            server: VirtualMachine {
                name: "box".to_string(),
                ip: ip.to_string(),
                port_forwards: forwards
                    .iter()
                    .map(|(e, i)| ((*e).to_string(), (*i).to_string()))
                    .collect::<BTreeMap<_, _>>(),
                ..VirtualMachine::default()
            },
        }
    }

    fn failure(message: &str) -> Reply<Acknowledged> {
        Reply::Failure(ApplicationFailure {
            message: message.to_string(),
        })
    }

    #[tokio::test]
    async fn server_action_dispatches_to_matching_call() {
        let mut mock = MockMarketplace::new();
        mock.expect_stop_server()
            .with(eq("srv-1"))
            .times(1)
            .returning(|_| Ok(Reply::Success(Acknowledged {})));

        let message = server_action(&mock, ServerAction::Stop, "srv-1")
            .await
            .unwrap();
        assert_eq!(message, "Server srv-1 stopped");
    }

    #[tokio::test]
    async fn application_failure_becomes_error_text() {
        let mut mock = MockMarketplace::new();
        mock.expect_delete_server()
            .returning(|_| Ok(failure("Server is still running")));

        let err = server_action(&mock, ServerAction::Delete, "srv-1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Server is still running"));
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let mut mock = MockMarketplace::new();
        mock.expect_billing().returning(|| {
            Err(tensordock_core::Error::Transport(
                "connection refused".to_string(),
            ))
        });

        let err = billing(&mock).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn status_prints_bare_status() {
        let mut mock = MockMarketplace::new();
        mock.expect_server_status()
            .with(eq("srv-1"))
            .returning(|_| {
                Ok(Reply::Success(ServerStatus {
                    status: "Running".to_string(),
                }))
            });

        assert_eq!(server_status(&mock, "srv-1").await.unwrap(), "Running");
    }

    #[tokio::test]
    async fn modify_passes_request_through() {
        let mut mock = MockMarketplace::new();
        mock.expect_modify_server()
            .withf(|request: &ModifyServerRequest| {
                request.server_id == "abc" && request.ram == Some(8) && request.gpu_model.is_none()
            })
            .times(1)
            .returning(|_| Ok(Reply::Success(Acknowledged {})));

        let request = ModifyServerRequest {
            ram: Some(8),
            ..ModifyServerRequest::new("abc")
        };
        assert_eq!(
            modify(&mock, &request).await.unwrap(),
            "Server abc modified"
        );
    }

    #[tokio::test]
    async fn remote_plan_uses_forwarded_ssh_port() {
        let mut mock = MockMarketplace::new();
        mock.expect_get_server()
            .with(eq("srv-1"))
            .times(1)
            .returning(|_| {
                Ok(Reply::Success(detail(
                    "203.0.113.5",
                    &[("47600", "80"), ("47612", "22")],
                )))
            });

        let plan = remote_plan(
            &mock,
            "srv-1",
            &Task::Shell(Some("nvidia-smi".to_string())),
            &options(),
        )
        .await
        .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(
            plan[0].to_string(),
            "ssh -i /keys/id_rsa -p 47612 user@203.0.113.5 nvidia-smi"
        );
    }

    #[tokio::test]
    async fn remote_plan_setup_has_two_steps() {
        let mut mock = MockMarketplace::new();
        mock.expect_get_server()
            .returning(|_| Ok(Reply::Success(detail("198.51.100.3", &[]))));

        let plan = remote_plan(&mock, "srv-1", &Task::Setup, &options())
            .await
            .unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan[0].args().iter().any(|arg| arg == "-p"));
        assert_eq!(plan[0].args()[3], "22");
        assert_eq!(
            plan[1].args().last().map(String::as_str),
            Some("bash /home/user/setup.sh")
        );
    }

    #[tokio::test]
    async fn remote_plan_requires_ip() {
        let mut mock = MockMarketplace::new();
        mock.expect_get_server()
            .returning(|_| Ok(Reply::Success(detail("", &[]))));

        let err = remote_plan(&mock, "srv-1", &Task::WolfLogs, &options())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no IP address"));
    }

    #[tokio::test]
    async fn stock_hides_empty_offers_by_default() {
        let mut mock = MockMarketplace::new();
        mock.expect_list_stock().times(2).returning(|| {
            let mut node = tensordock_marketplace::HostNode::default();
            node.specs.gpu.insert(
                "sold-out-gpu".to_string(),
                tensordock_marketplace::ResourceOffer::default(),
            );
            let mut stock = Stock::default();
            stock.hostnodes.insert("node-1".to_string(), node);
            Ok(Reply::Success(stock))
        });

        assert!(!stock(&mock, false).await.unwrap().contains("sold-out-gpu"));
        assert!(stock(&mock, true).await.unwrap().contains("sold-out-gpu"));
    }

    #[test]
    fn configure_writes_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".tensordock.yml");

        let message = configure(
            &path,
            ConfigUpdate {
                api_key: Some("k".to_string()),
                api_token: Some("t".to_string()),
                key_path: Some("~/.ssh/td".to_string()),
                ..ConfigUpdate::default()
            },
        )
        .unwrap();
        assert!(message.contains(".tensordock.yml"));

        let config = MarketplaceConfig::load(&path).unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.api_token, "t");
        assert_eq!(config.key_path, "~/.ssh/td");
    }

    #[test]
    fn configure_replaces_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".tensordock.yml");
        std::fs::write(&path, "serviceUrl: nope\napiKey: old\n").unwrap();
        assert!(MarketplaceConfig::load(&path).is_err());

        configure(
            &path,
            ConfigUpdate {
                api_key: Some("k".to_string()),
                api_token: Some("t".to_string()),
                service_url: Some("https://example.com/api".to_string()),
                ..ConfigUpdate::default()
            },
        )
        .unwrap();

        let config = MarketplaceConfig::load(&path).unwrap();
        assert_eq!(config.service_url, "https://example.com/api");
        assert_eq!(config.api_key, "k");
        assert_eq!(config.key_path, tensordock_core::config::DEFAULT_KEY_PATH);
    }

    #[test]
    fn configure_requires_both_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let err = configure(
            &dir.path().join("c.yml"),
            ConfigUpdate {
                api_key: Some("k".to_string()),
                ..ConfigUpdate::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("--api-token"));
    }
}
