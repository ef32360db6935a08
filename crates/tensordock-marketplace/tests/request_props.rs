//! Property-based tests for request descriptors.
//!
//! A modify request sends exactly the fields that are set, and a deploy request
//! always carries its required fields and both port sets.

use proptest::prelude::*;
use std::collections::BTreeMap;
use tensordock_core::form::decode;
use tensordock_marketplace::{DeployServerRequest, ModifyServerRequest};

fn arb_text() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 +%._-]{1,24}").unwrap()
}

/// Generates modify requests with every optional field independently set or unset.
fn arb_modify() -> impl Strategy<Value = ModifyServerRequest> {
    (
        prop::string::string_regex("[a-f0-9-]{8,36}").unwrap(),
        prop::option::of(arb_text()),
        prop::option::of(1u32..8),
        prop::option::of(arb_text()),
        prop::option::of(1u32..64),
        prop::option::of(1u32..512),
        prop::option::of(20u32..10_000),
    )
        .prop_map(
            |(server_id, gpu_model, gpu_count, cpu_model, vcpus, ram, storage)| {
                ModifyServerRequest {
                    server_id,
                    gpu_model,
                    gpu_count,
                    cpu_model,
                    vcpus,
                    ram,
                    storage,
                }
            },
        )
}

fn arb_deploy() -> impl Strategy<Value = DeployServerRequest> {
    (
        arb_text(),
        arb_text(),
        arb_text(),
        prop::collection::vec(any::<u16>(), 0..6),
        prop::collection::vec(any::<u16>(), 0..6),
        prop::option::of(arb_text()),
    )
        .prop_map(
            |(name, password, operating_system, internal_ports, external_ports, hostnode)| {
                DeployServerRequest {
                    name,
                    password,
                    gpu_model: "geforcertx4090-pcie-24gb".to_string(),
                    gpu_count: 1,
                    vcpus: 2,
                    ram: 4,
                    storage: 20,
                    operating_system,
                    internal_ports,
                    external_ports,
                    hostnode,
                    location: None,
                    cpu_model: None,
                }
            },
        )
}

fn port_set(ports: &[u16]) -> String {
    let joined = ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{joined}}}")
}

proptest! {
    #[test]
    fn modify_sends_only_set_fields(request in arb_modify()) {
        let fields: BTreeMap<String, String> = decode(&request.to_form().encode()).into_iter().collect();

        let expected = [
            ("gpu_model", request.gpu_model.clone()),
            ("gpu_count", request.gpu_count.map(|v| v.to_string())),
            ("cpu_model", request.cpu_model.clone()),
            ("vcpus", request.vcpus.map(|v| v.to_string())),
            ("ram", request.ram.map(|v| v.to_string())),
            ("storage", request.storage.map(|v| v.to_string())),
        ];

        prop_assert_eq!(fields.get("server_id"), Some(&request.server_id));
        for (key, value) in &expected {
            prop_assert_eq!(fields.get(*key), value.as_ref(), "field {}", key);
        }
        let set = expected.iter().filter(|(_, value)| value.is_some()).count();
        prop_assert_eq!(fields.len(), 1 + set);
    }

    #[test]
    fn deploy_carries_required_fields_and_port_sets(request in arb_deploy()) {
        let fields: BTreeMap<String, String> = decode(&request.to_form().encode()).into_iter().collect();

        prop_assert_eq!(fields.get("name"), Some(&request.name));
        prop_assert_eq!(fields.get("password"), Some(&request.password));
        prop_assert_eq!(fields.get("operating_system"), Some(&request.operating_system));
        let internal = port_set(&request.internal_ports);
        let external = port_set(&request.external_ports);
        prop_assert_eq!(fields.get("internal_ports"), Some(&internal));
        prop_assert_eq!(fields.get("external_ports"), Some(&external));
        prop_assert_eq!(fields.get("hostnode"), request.hostnode.as_ref());
        prop_assert!(!fields.contains_key("location"));
        prop_assert!(!fields.contains_key("cpu_model"));
    }
}
