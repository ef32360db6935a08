//! Marketplace request descriptors and response payloads.
//!
//! Request types know how to lay themselves out as a [`FormBody`]; response
//! types are decoded from the canonical envelope only after it reports success,
//! so their fields describe the success shape alone.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tensordock_core::FormBody;

/// Port the SSH daemon listens on inside every server.
pub const SSH_PORT: u16 = 22;

/// Parameters for deploying a new server.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeployServerRequest {
    /// Display name for the server.
    pub name: String,
    /// Password for the default user account.
    pub password: String,
    /// GPU model identifier, for example `geforcertx4090-pcie-24gb`.
    pub gpu_model: String,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// Number of virtual CPUs.
    pub vcpus: u32,
    /// RAM in GB.
    pub ram: u32,
    /// Networked storage in GB.
    pub storage: u32,
    /// Operating system image name.
    pub operating_system: String,
    /// Ports opened inside the server.
    pub internal_ports: Vec<u16>,
    /// Public ports forwarded to `internal_ports`, pairwise.
    pub external_ports: Vec<u16>,
    /// Host node to deploy on. Can be omitted when `location` is set.
    pub hostnode: Option<String>,
    /// Preferred location.
    pub location: Option<String>,
    /// CPU model identifier.
    pub cpu_model: Option<String>,
}

impl DeployServerRequest {
    /// Lay the request out as form fields.
    #[must_use]
    pub fn to_form(&self) -> FormBody {
        let mut form = FormBody::new();
        form.push("name", &self.name);
        form.push("password", &self.password);
        form.push("gpu_model", &self.gpu_model);
        form.push("gpu_count", self.gpu_count);
        form.push("vcpus", self.vcpus);
        form.push("ram", self.ram);
        form.push("storage", self.storage);
        form.push("operating_system", &self.operating_system);
        form.push_port_set("internal_ports", &self.internal_ports);
        form.push_port_set("external_ports", &self.external_ports);
        form.push_opt("hostnode", self.hostnode.as_deref());
        form.push_opt("location", self.location.as_deref());
        form.push_opt("cpu_model", self.cpu_model.as_deref());
        form
    }
}

/// Parameters for changing the resources of an existing server.
///
/// Only the fields that are set are sent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModifyServerRequest {
    /// Server to modify.
    pub server_id: String,
    /// New GPU model.
    pub gpu_model: Option<String>,
    /// New GPU count.
    pub gpu_count: Option<u32>,
    /// New CPU model.
    pub cpu_model: Option<String>,
    /// New vCPU count.
    pub vcpus: Option<u32>,
    /// New RAM in GB.
    pub ram: Option<u32>,
    /// New storage in GB.
    pub storage: Option<u32>,
}

impl ModifyServerRequest {
    /// Create a request that changes nothing yet.
    #[must_use]
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            ..Self::default()
        }
    }

    /// Lay the request out as form fields.
    #[must_use]
    pub fn to_form(&self) -> FormBody {
        let mut form = FormBody::new();
        form.push("server_id", &self.server_id);
        form.push_opt("gpu_model", self.gpu_model.as_deref());
        form.push_opt("gpu_count", self.gpu_count);
        form.push_opt("cpu_model", self.cpu_model.as_deref());
        form.push_opt("vcpus", self.vcpus);
        form.push_opt("ram", self.ram);
        form.push_opt("storage", self.storage);
        form
    }
}

/// A server as reported by the marketplace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VirtualMachine {
    /// Display name.
    pub name: String,
    /// Amount charged so far.
    pub cost: f64,
    /// Location name.
    pub location: String,
    /// Host node the server runs on.
    pub hostnode: String,
    /// Operating system image.
    pub operating_system: String,
    /// External port to internal port.
    pub port_forwards: BTreeMap<String, String>,
    /// Public IP address.
    #[serde(rename = "ip_address")]
    pub ip: String,
    /// Server type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Allocated resources.
    pub specs: VmSpecs,
    /// Lifecycle status, for example `Running`.
    pub status: String,
    /// Creation time as sent by the backend.
    pub timestamp_creation: String,
}

impl VirtualMachine {
    /// External port forwarded to the SSH daemon.
    ///
    /// The lowest matching external port wins; without a forward the server is
    /// reached on port 22 directly.
    #[must_use]
    pub fn ssh_port(&self) -> u16 {
        let ssh = SSH_PORT.to_string();
        self.port_forwards
            .iter()
            .filter(|(_, internal)| **internal == ssh)
            .filter_map(|(external, _)| external.parse::<u16>().ok())
            .min()
            .unwrap_or(SSH_PORT)
    }

    /// Address for opening a remote shell on this server.
    #[must_use]
    pub fn remote_endpoint(&self) -> RemoteEndpoint {
        RemoteEndpoint {
            host: self.ip.clone(),
            port: self.ssh_port(),
        }
    }
}

/// Resources allocated to a server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VmSpecs {
    /// GPU allocation.
    pub gpu: GpuAllocation,
    /// RAM in GB.
    pub ram: u32,
    /// Number of virtual CPUs.
    pub vcpus: u32,
    /// Storage in GB.
    pub storage: u32,
}

/// GPUs attached to a server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GpuAllocation {
    /// Number of GPUs.
    pub amount: u32,
    /// GPU model.
    #[serde(rename = "type")]
    pub model: String,
}

/// Host and port for a remote shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// Public IP address or host name.
    pub host: String,
    /// SSH port.
    pub port: u16,
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Payload of the server listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerList {
    /// Servers keyed by server ID.
    #[serde(default, rename = "virtualmachines")]
    pub servers: BTreeMap<String, VirtualMachine>,
}

/// Payload of a single-server lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerDetail {
    /// The server.
    #[serde(rename = "virtualmachines")]
    pub server: VirtualMachine,
}

/// Payload of a status lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerStatus {
    /// Lifecycle status.
    pub status: String,
}

/// Payload of a successful deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    /// Price breakdown.
    #[serde(default)]
    pub cost: DeploymentCost,
    /// Public IP address.
    #[serde(default)]
    pub ip: String,
    /// External port to internal port.
    #[serde(default)]
    pub port_forwards: BTreeMap<String, String>,
    /// ID of the new server.
    pub server: String,
}

/// Hourly price breakdown of a deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeploymentCost {
    /// Compute price.
    pub compute_price: f64,
    /// Storage price.
    pub storage_price: f64,
    /// Total price.
    pub total_price: f64,
}

/// Account balance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BillingDetails {
    /// Remaining balance.
    pub balance: f64,
    /// Current spend per hour.
    pub hourly_spending_rate: f64,
}

/// Payload of operations that return nothing beyond the envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledged {}

/// Payload of the host node stock listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stock {
    /// Host nodes keyed by host node ID.
    #[serde(default)]
    pub hostnodes: BTreeMap<String, HostNode>,
}

impl Stock {
    /// Copy every GPU's map key into its `name`.
    #[must_use]
    pub fn with_gpu_names(mut self) -> Self {
        for host in self.hostnodes.values_mut() {
            for (name, gpu) in &mut host.specs.gpu {
                gpu.name.clone_from(name);
            }
        }
        self
    }
}

/// A host node offering GPUs for rent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostNode {
    /// Where the node is.
    pub location: HostLocation,
    /// Public ports available for forwarding.
    pub networking: HostNetworking,
    /// Resources on offer.
    pub specs: HostSpecs,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostLocation {
    pub city: String,
    pub country: String,
    pub region: String,
}

/// Networking details of a host node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostNetworking {
    /// Free external ports.
    pub ports: Vec<u16>,
}

/// Resources a host node has on offer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostSpecs {
    /// CPU offer.
    pub cpu: ResourceOffer,
    /// GPU offers keyed by GPU model.
    pub gpu: BTreeMap<String, ResourceOffer>,
    /// RAM offer.
    pub ram: ResourceOffer,
    /// Storage offer.
    pub storage: ResourceOffer,
}

/// Available units of a resource and their price.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceOffer {
    /// Model name; for GPUs this is filled from the map key.
    pub name: String,
    /// Units available.
    pub amount: u32,
    /// Price per unit per hour.
    pub price: f64,
}

impl ResourceOffer {
    /// Returns true if at least one unit is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.amount > 0
    }
}
