//! Typed client for the TensorDock GPU marketplace.
//!
//! Each marketplace operation is one method on [`MarketplaceClient`] returning a
//! [`Reply`](tensordock_core::Reply): the decoded payload when the backend
//! reports success, or the backend's failure message when it does not.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{MarketplaceClient, MarketplaceClientBuilder};
pub use models::{
    Acknowledged, BillingDetails, DeployServerRequest, Deployment, DeploymentCost,
    GpuAllocation, HostLocation, HostNetworking, HostNode, HostSpecs, ModifyServerRequest,
    RemoteEndpoint, ResourceOffer, ServerDetail, ServerList, ServerStatus, Stock,
    VirtualMachine, VmSpecs,
};

/// Convenient result alias that reuses the shared marketplace error type.
pub type Result<T> = tensordock_core::Result<T>;
