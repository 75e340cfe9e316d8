//! IPAデプロイメント定義

use super::host::Host;
use super::network::NetworkSpec;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

pub const DEFAULT_DOMAIN: &str = "ipa.test";

/// 同一ドメイン・レルムを共有するIPAクラスタ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default)]
    pub distro: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    /// デプロイメント既定のネームサーバー
    #[serde(default)]
    pub dns: Option<String>,
    /// 専用ネットワークのサブネット
    #[serde(default)]
    pub subnet: Option<String>,
    /// 専用ネットワーク
    #[serde(default)]
    pub network: Option<NetworkSpec>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub dm_password: Option<String>,
    #[serde(default)]
    pub vars: Mapping,
    #[serde(default)]
    pub cluster: Option<Cluster>,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

impl Deployment {
    /// レルム（未指定の場合はドメインの大文字）
    pub fn realm(&self) -> String {
        self.realm
            .as_deref()
            .unwrap_or(&self.domain)
            .to_ascii_uppercase()
    }
}

/// クラスタ構成
///
/// 最初のサーバーがIPAサーバー、以降はレプリカとして扱われる。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default)]
    pub servers: Vec<Host>,
    #[serde(default)]
    pub clients: ClientGroup,
}

impl Cluster {
    pub fn server(&self) -> Option<&Host> {
        self.servers.first()
    }

    pub fn replicas(&self) -> &[Host] {
        self.servers.get(1..).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty() && self.clients.hosts.is_empty()
    }
}

/// クライアント一覧（リスト、または hosts/vars を持つマップ）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ClientsInput")]
pub struct ClientGroup {
    pub hosts: Vec<Host>,
    pub vars: Mapping,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClientsInput {
    List(Vec<Host>),
    Group {
        #[serde(default)]
        hosts: Vec<Host>,
        #[serde(default)]
        vars: Mapping,
    },
}

impl From<ClientsInput> for ClientGroup {
    fn from(value: ClientsInput) -> Self {
        match value {
            ClientsInput::List(hosts) => Self {
                hosts,
                vars: Mapping::new(),
            },
            ClientsInput::Group { hosts, vars } => Self { hosts, vars },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_defaults() {
        let deployment: Deployment = serde_yaml::from_str("name: d1\n").unwrap();
        assert_eq!(deployment.domain, "ipa.test");
        assert_eq!(deployment.realm(), "IPA.TEST");
        assert!(deployment.cluster.is_none());
    }

    #[test]
    fn test_cluster_replicas() {
        let cluster: Cluster =
            serde_yaml::from_str("servers: [{name: s1}, {name: r1}, {name: r2}]").unwrap();
        assert_eq!(cluster.server().map(|s| s.name.as_str()), Some("s1"));
        assert_eq!(cluster.replicas().len(), 2);

        let empty = Cluster::default();
        assert!(empty.server().is_none());
        assert!(empty.replicas().is_empty());
        assert!(empty.is_empty());
    }
}
