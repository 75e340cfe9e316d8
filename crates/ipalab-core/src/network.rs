//! ネットワーク計画
//!
//! ラボ全体、またはデプロイメント・外部ホストブロックごとに、
//! どのネットワークとサブネットを使うかを決定する。

use crate::allocator::{DEFAULT_SUBNET, parse_subnet};
use crate::error::{LabError, Result};
use crate::model::{NetworkDefinition, NetworkFragment, NetworkSpec};
use ipnet::Ipv4Net;
use serde_yaml::Value;
use tracing::debug;

/// ラボ共有ネットワークの既定名
pub const DEFAULT_NETWORK_NAME: &str = "ipanet";

/// 計画済みネットワーク
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedNetwork {
    pub name: String,
    pub subnet: Ipv4Net,
    pub fragment: NetworkFragment,
}

/// ラボ共有ネットワークを計画
///
/// | 指定 | 名前 | サブネット |
/// |---|---|---|
/// | なし | `ipanet` | `subnet` または既定値 |
/// | 文字列（外部参照） | その文字列 | `subnet` 必須 |
/// | 定義 | `name` または `ipanet-<lab_name>` | 定義 > `subnet` > 既定値 |
pub fn plan_lab_network(
    network: Option<&NetworkSpec>,
    subnet: Option<&str>,
    lab_name: &str,
) -> Result<PlannedNetwork> {
    let planned = match network {
        None => {
            let subnet = parse_subnet(subnet.unwrap_or(DEFAULT_SUBNET))?;
            PlannedNetwork {
                name: DEFAULT_NETWORK_NAME.to_string(),
                subnet,
                fragment: NetworkFragment::bridge(subnet.to_string()),
            }
        }
        Some(NetworkSpec::External(name)) => {
            let subnet = subnet
                .ok_or_else(|| LabError::ExternalNetworkWithoutSubnet(name.clone()))?;
            plan_external(name, parse_subnet(subnet)?)?
        }
        Some(NetworkSpec::Definition(definition)) => {
            let inherited = parse_subnet(subnet.unwrap_or(DEFAULT_SUBNET))?;
            plan_definition(definition, lab_name, inherited)?
        }
    };
    debug!(network = %planned.name, subnet = %planned.subnet, "Planned lab network");
    Ok(planned)
}

/// デプロイメント（または外部ホストブロック）のネットワークを計画
///
/// ネットワークもサブネットも指定がなければ `None`（共有ネットワークを使う）。
/// サブネットのみの指定は `ipanet-<fallback_name>` の専用ネットワークになる。
pub fn plan_scope_network(
    network: Option<&NetworkSpec>,
    subnet: Option<&str>,
    fallback_name: &str,
    shared: &PlannedNetwork,
) -> Result<Option<PlannedNetwork>> {
    let inherited = match subnet {
        Some(subnet) => parse_subnet(subnet)?,
        None => shared.subnet,
    };
    let planned = match (network, subnet) {
        (None, None) => return Ok(None),
        (None, Some(_)) => {
            plan_definition(&NetworkDefinition::default(), fallback_name, inherited)?
        }
        (Some(NetworkSpec::External(name)), _) => plan_external(name, inherited)?,
        (Some(NetworkSpec::Definition(definition)), _) => {
            plan_definition(definition, fallback_name, inherited)?
        }
    };
    if planned.name == shared.name {
        return Err(LabError::InvalidNetwork(format!(
            "network '{}' of '{}' conflicts with the lab network",
            planned.name, fallback_name
        )));
    }
    debug!(
        scope = fallback_name,
        network = %planned.name,
        subnet = %planned.subnet,
        "Planned private network"
    );
    Ok(Some(planned))
}

fn plan_external(name: &str, subnet: Ipv4Net) -> Result<PlannedNetwork> {
    if name.trim().is_empty() {
        return Err(LabError::InvalidNetwork(
            "external network name must not be empty".to_string(),
        ));
    }
    Ok(PlannedNetwork {
        name: name.to_string(),
        subnet,
        fragment: NetworkFragment::external(),
    })
}

fn plan_definition(
    definition: &NetworkDefinition,
    fallback_name: &str,
    inherited: Ipv4Net,
) -> Result<PlannedNetwork> {
    let name = definition
        .name
        .clone()
        .unwrap_or_else(|| format!("{}-{}", DEFAULT_NETWORK_NAME, fallback_name));
    let subnet = match &definition.subnet {
        Some(subnet) => parse_subnet(subnet)?,
        None => inherited,
    };

    let mut fragment = NetworkFragment {
        driver: Some(
            definition
                .driver
                .clone()
                .unwrap_or_else(|| "bridge".to_string()),
        ),
        ..NetworkFragment::bridge(subnet.to_string())
    };
    fragment.external = definition.external;
    match &definition.dns {
        None | Some(Value::Null) => {}
        Some(Value::Bool(false)) => fragment.disable_dns = true,
        Some(value) => fragment.dns = dns_override(value, &name)?,
    }

    Ok(PlannedNetwork {
        name,
        subnet,
        fragment,
    })
}

/// ネットワークの DNS 上書き値を検証（単一値またはリスト）
fn dns_override(value: &Value, network: &str) -> Result<Vec<String>> {
    let invalid = || LabError::InvalidNetworkDns(network.to_string());
    let servers = match value {
        Value::String(server) => vec![server.clone()],
        Value::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(String::from).ok_or_else(invalid))
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(invalid()),
    };
    if servers.is_empty() || servers.iter().any(|server| server.trim().is_empty()) {
        return Err(invalid());
    }
    Ok(servers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(yaml: &str) -> NetworkSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn lab_default() -> PlannedNetwork {
        plan_lab_network(None, None, "lab").unwrap()
    }

    #[test]
    fn test_lab_network_default() {
        let planned = lab_default();
        assert_eq!(planned.name, "ipanet");
        assert_eq!(planned.subnet.to_string(), "192.168.159.0/24");
        assert_eq!(planned.fragment, NetworkFragment::bridge("192.168.159.0/24"));
    }

    #[test]
    fn test_lab_network_subnet() {
        let planned = plan_lab_network(None, Some("10.0.0.0/24"), "lab").unwrap();
        assert_eq!(planned.subnet.to_string(), "10.0.0.0/24");
    }

    #[test]
    fn test_lab_network_external() {
        let network = spec("podman");
        let planned = plan_lab_network(Some(&network), Some("10.88.0.0/16"), "lab").unwrap();
        assert_eq!(planned.name, "podman");
        assert_eq!(planned.fragment, NetworkFragment::external());

        let result = plan_lab_network(Some(&network), None, "lab");
        assert!(matches!(
            result,
            Err(LabError::ExternalNetworkWithoutSubnet(name)) if name == "podman"
        ));
    }

    #[test]
    fn test_lab_network_definition() {
        let network = spec("{subnet: 10.2.0.0/24, dns: false}");
        let planned = plan_lab_network(Some(&network), None, "demo").unwrap();
        assert_eq!(planned.name, "ipanet-demo");
        assert_eq!(planned.subnet.to_string(), "10.2.0.0/24");
        assert!(planned.fragment.disable_dns);
        assert_eq!(planned.fragment.driver.as_deref(), Some("bridge"));
    }

    #[test]
    fn test_network_dns_override() {
        let network = spec("{name: n, dns: 10.2.0.10}");
        let planned = plan_lab_network(Some(&network), None, "demo").unwrap();
        assert_eq!(planned.fragment.dns, vec!["10.2.0.10"]);

        let network = spec("{name: n, dns: [10.2.0.10, 10.2.0.11]}");
        let planned = plan_lab_network(Some(&network), None, "demo").unwrap();
        assert_eq!(planned.fragment.dns.len(), 2);
    }

    #[test]
    fn test_network_dns_invalid() {
        for dns in ["''", "[]", "true", "42", "[10.0.0.1, {a: b}]"] {
            let network = spec(&format!("{{name: n, dns: {}}}", dns));
            let result = plan_lab_network(Some(&network), None, "demo");
            assert!(
                matches!(result, Err(LabError::InvalidNetworkDns(_))),
                "dns value {} should be rejected",
                dns
            );
        }
    }

    #[test]
    fn test_scope_network_reuses_shared() {
        let shared = lab_default();
        assert_eq!(plan_scope_network(None, None, "d1", &shared).unwrap(), None);
    }

    #[test]
    fn test_scope_network_subnet_only() {
        let shared = lab_default();
        let planned = plan_scope_network(None, Some("10.5.0.0/24"), "d1", &shared)
            .unwrap()
            .unwrap();
        assert_eq!(planned.name, "ipanet-d1");
        assert_eq!(planned.subnet.to_string(), "10.5.0.0/24");
        assert_eq!(planned.fragment, NetworkFragment::bridge("10.5.0.0/24"));
    }

    #[test]
    fn test_scope_network_external_inherits_subnet() {
        let shared = lab_default();
        let network = spec("corpnet");
        let planned = plan_scope_network(Some(&network), None, "d1", &shared)
            .unwrap()
            .unwrap();
        assert_eq!(planned.name, "corpnet");
        assert_eq!(planned.subnet, shared.subnet);
    }

    #[test]
    fn test_scope_network_conflicting_name() {
        let shared = lab_default();
        let network = spec("{name: ipanet, subnet: 10.9.0.0/24}");
        let result = plan_scope_network(Some(&network), None, "d1", &shared);
        assert!(matches!(result, Err(LabError::InvalidNetwork(_))));
    }
}
