//! Command-line arguments.

use crate::remote::{expand_tilde, ShellOptions};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tensordock_core::MarketplaceConfig;
use tensordock_marketplace::{DeployServerRequest, ModifyServerRequest};

/// td-stream - rent and provision TensorDock GPU servers
#[derive(Parser, Debug)]
#[command(
    name = "td-stream",
    version,
    about = "Rent and provision TensorDock marketplace GPU servers",
    after_help = "Examples:\n  td-stream config --api-key KEY --api-token TOKEN\n  td-stream stock list\n  td-stream servers deploy mybox 'p@ssw0rd' --hostnode NODE_ID\n  td-stream setup SERVER_ID\n  td-stream wolf install SERVER_ID\n"
)]
pub struct Cli {
    /// Configuration file path (default: ~/.tensordock.yml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API key, overrides the configuration file
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// API token, overrides the configuration file
    #[arg(long, global = true)]
    pub api_token: Option<String>,

    /// Dump raw HTTP requests and responses
    #[arg(long, global = true)]
    pub debug: bool,

    /// Private key used for SSH
    #[arg(long, global = true)]
    pub key_path: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Layer command-line flags over the loaded configuration.
    #[must_use]
    pub fn apply_overrides(&self, mut config: MarketplaceConfig) -> MarketplaceConfig {
        if let Some(api_key) = &self.api_key {
            config.api_key.clone_from(api_key);
        }
        if let Some(api_token) = &self.api_token {
            config.api_token.clone_from(api_token);
        }
        if let Some(key_path) = &self.key_path {
            config.key_path.clone_from(key_path);
        }
        config.debug |= self.debug;
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save API credentials (--api-key, --api-token) to the configuration file
    Config {
        /// Marketplace API base URL
        #[arg(long)]
        service_url: Option<String>,
    },

    /// Manage servers
    #[command(subcommand)]
    Servers(ServersCommand),

    /// Query stock
    #[command(subcommand)]
    Stock(StockCommand),

    /// Show account balance and spending rate
    Billing,

    /// Open a shell on a server, or run a single command
    Ssh {
        /// Server ID
        server: String,

        /// Command to run instead of an interactive shell
        #[arg(long)]
        command: Option<String>,

        #[command(flatten)]
        shell: ShellArgs,
    },

    /// Prepare a server for game streaming with Wolf
    Setup {
        /// Server ID
        server: String,

        #[command(flatten)]
        shell: ShellArgs,
    },

    /// NVIDIA driver management
    #[command(subcommand)]
    Nvidia(InstallCommand),

    /// WireGuard VPN management
    #[command(subcommand)]
    Vpn(InstallCommand),

    /// Wolf streaming server management
    #[command(subcommand)]
    Wolf(WolfCommand),
}

#[derive(Subcommand, Debug)]
pub enum ServersCommand {
    /// List servers
    List,
    /// Get server info
    Info { server: String },
    /// Start a server
    Start { server: String },
    /// Stop a server
    Stop { server: String },
    /// Delete a server
    Delete { server: String },
    /// Restart a server
    Restart { server: String },
    /// Get server status
    Status { server: String },
    /// Deploy a server
    Deploy(DeployArgs),
    /// Modify a server
    Modify(ModifyArgs),
}

#[derive(Subcommand, Debug)]
pub enum StockCommand {
    /// List GPU stock across host nodes
    List {
        /// Include out-of-stock GPUs
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum InstallCommand {
    /// Install on a server
    Install {
        /// Server ID
        server: String,

        #[command(flatten)]
        shell: ShellArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum WolfCommand {
    /// Fetch and start the Wolf containers
    Install {
        /// Server ID
        server: String,

        #[command(flatten)]
        shell: ShellArgs,
    },
    /// Show Wolf container logs
    Logs {
        /// Server ID
        server: String,

        #[command(flatten)]
        shell: ShellArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ShellArgs {
    /// SSH client executable (e.g. ssh, mosh)
    #[arg(long, default_value = "ssh")]
    pub bin: String,

    /// User account to log in as
    #[arg(long, default_value = "user")]
    pub user: String,
}

impl ShellArgs {
    pub fn options(&self, key_path: &str) -> ShellOptions {
        ShellOptions {
            bin: self.bin.clone(),
            user: self.user.clone(),
            key_path: expand_tilde(key_path),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Server name
    pub name: String,

    /// Password for the login user
    pub password: String,

    /// GPU model to provision
    #[arg(long, default_value = "geforcertx4090-pcie-24gb")]
    pub gpu_model: String,

    /// Number of GPUs
    #[arg(long, default_value_t = 1)]
    pub gpu_count: u32,

    /// Number of vCPUs
    #[arg(long, default_value_t = 2)]
    pub vcpus: u32,

    /// GB of RAM
    #[arg(long, default_value_t = 4)]
    pub ram: u32,

    /// GB of networked storage
    #[arg(long, default_value_t = 20)]
    pub storage: u32,

    /// Operating system
    #[arg(long, default_value = "Ubuntu 20.04 LTS")]
    pub operating_system: String,

    /// Ports opened inside the server
    #[arg(long, value_delimiter = ',', default_values_t = [80u16, 443])]
    pub internal_ports: Vec<u16>,

    /// Public ports forwarded to the internal ports
    #[arg(long, value_delimiter = ',', default_values_t = [47600u16, 46701])]
    pub external_ports: Vec<u16>,

    /// Host node to deploy on; may be omitted when --location is set
    #[arg(long)]
    pub hostnode: Option<String>,

    /// Location
    #[arg(long)]
    pub location: Option<String>,

    /// CPU model
    #[arg(long)]
    pub cpu_model: Option<String>,
}

impl From<DeployArgs> for DeployServerRequest {
    fn from(args: DeployArgs) -> Self {
        Self {
            name: args.name,
            password: args.password,
            gpu_model: args.gpu_model,
            gpu_count: args.gpu_count,
            vcpus: args.vcpus,
            ram: args.ram,
            storage: args.storage,
            operating_system: args.operating_system,
            internal_ports: args.internal_ports,
            external_ports: args.external_ports,
            hostnode: args.hostnode,
            location: args.location,
            cpu_model: args.cpu_model,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ModifyArgs {
    /// Server ID
    pub server: String,

    /// New GPU model
    #[arg(long)]
    pub gpu_model: Option<String>,

    /// New GPU count
    #[arg(long)]
    pub gpu_count: Option<u32>,

    /// New CPU model
    #[arg(long)]
    pub cpu_model: Option<String>,

    /// New vCPU count
    #[arg(long)]
    pub vcpus: Option<u32>,

    /// New GB of RAM
    #[arg(long)]
    pub ram: Option<u32>,

    /// New GB of storage
    #[arg(long)]
    pub storage: Option<u32>,
}

impl From<ModifyArgs> for ModifyServerRequest {
    fn from(args: ModifyArgs) -> Self {
        Self {
            server_id: args.server,
            gpu_model: args.gpu_model,
            gpu_count: args.gpu_count,
            cpu_model: args.cpu_model,
            vcpus: args.vcpus,
            ram: args.ram,
            storage: args.storage,
        }
    }
}
