//! Table formatting for CLI output

use std::collections::BTreeMap;
use tabled::{settings::Style, Table, Tabled};
use tensordock_marketplace::{BillingDetails, Deployment, ServerList, Stock, VirtualMachine};

/// Most ports shown per host node in the stock table.
const MAX_STOCK_PORTS: usize = 10;

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn property(name: &'static str, value: impl ToString) -> PropertyRow {
    PropertyRow {
        name,
        value: value.to_string(),
    }
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

fn format_forwards(forwards: &BTreeMap<String, String>) -> String {
    forwards
        .iter()
        .map(|(external, internal)| format!("{external}->{internal}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Servers on the account, one row each.
pub fn server_table(list: &ServerList) -> String {
    #[derive(Tabled)]
    struct ServerRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Server ID")]
        id: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows = list
        .servers
        .iter()
        .map(|(id, vm)| ServerRow {
            name: vm.name.clone(),
            id: id.clone(),
            status: vm.status.clone(),
        })
        .collect();
    render::<ServerRow>(rows)
}

/// Every property of a single server.
pub fn server_info(vm: &VirtualMachine) -> String {
    render(vec![
        property("Name", &vm.name),
        property("Location", &vm.location),
        property("HostNode", &vm.hostnode),
        property("IP", &vm.ip),
        property("Charged Cost", vm.cost),
        property("Status", &vm.status),
        property("Type", &vm.kind),
        property("vCPUs", vm.specs.vcpus),
        property("RAM", format!("{}GB", vm.specs.ram)),
        property("Storage", format!("{}GB", vm.specs.storage)),
        property("Operating System", &vm.operating_system),
        property("Port Forwards", format_forwards(&vm.port_forwards)),
        property("GPU Amount", vm.specs.gpu.amount),
        property("GPU Type", &vm.specs.gpu.model),
        property("Creation Timestamp", &vm.timestamp_creation),
    ])
}

/// Price breakdown and address of a new server.
pub fn deployment_table(deployment: &Deployment) -> String {
    render(vec![
        property("Server ID", &deployment.server),
        property("IP", &deployment.ip),
        property("Port Forwards", format_forwards(&deployment.port_forwards)),
        property("Compute Price", deployment.cost.compute_price),
        property("Storage Price", deployment.cost.storage_price),
        property("Total Price", deployment.cost.total_price),
    ])
}

/// Balance and spending rate.
pub fn billing_table(billing: &BillingDetails) -> String {
    render(vec![
        property("Balance", billing.balance),
        property("Hourly Spending Rate", billing.hourly_spending_rate),
    ])
}

/// One GPU offer on one host node.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct StockRow {
    #[tabled(rename = "HostNode ID")]
    pub hostnode: String,
    #[tabled(rename = "GPU")]
    pub gpu: String,
    #[tabled(rename = "Region")]
    pub region: String,
    #[tabled(rename = "Available Units")]
    pub units: u32,
    #[tabled(rename = "GPU Price")]
    pub price: f64,
    #[tabled(rename = "Location")]
    pub location: String,
    #[tabled(rename = "External Ports")]
    pub ports: String,
}

/// Flatten stock into rows sorted by GPU price, cheapest first.
///
/// Offers with no free units are dropped unless `include_out_of_stock` is set.
pub fn stock_rows(stock: &Stock, include_out_of_stock: bool) -> Vec<StockRow> {
    let mut rows = Vec::new();
    for (id, host) in &stock.hostnodes {
        let ports = if host.networking.ports.is_empty() {
            "No ports".to_string()
        } else {
            host.networking
                .ports
                .iter()
                .take(MAX_STOCK_PORTS)
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let location = format!("{}, {}", host.location.city, host.location.region);

        for (name, gpu) in &host.specs.gpu {
            if !gpu.in_stock() && !include_out_of_stock {
                continue;
            }
            rows.push(StockRow {
                hostnode: id.clone(),
                gpu: name.clone(),
                region: host.location.region.clone(),
                units: gpu.amount,
                price: gpu.price,
                location: location.clone(),
                ports: ports.clone(),
            });
        }
    }

    rows.sort_by(|a, b| a.price.total_cmp(&b.price));
    rows
}

/// Render stock rows.
pub fn stock_table(rows: Vec<StockRow>) -> String {
    render(rows)
}
