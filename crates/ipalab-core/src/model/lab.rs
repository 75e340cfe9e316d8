//! ラボ定義（入力ドキュメントのルート）

use super::deployment::Deployment;
use super::host::ExternalHost;
use super::network::NetworkSpec;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

pub const DEFAULT_LAB_NAME: &str = "ipa-lab";
pub const DEFAULT_DISTRO: &str = "fedora";
pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_ADMIN_PASSWORD: &str = "SomeADMINpassword";
pub const DEFAULT_DM_PASSWORD: &str = "SomeDMpassword";

/// ラボ定義
///
/// ```yaml
/// lab_name: demo
/// subnet: 10.0.0.0/24
/// ipa_deployments:
///   - name: d1
///     domain: d1.test
///     cluster:
///       servers:
///         - name: s1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabModel {
    #[serde(default = "default_lab_name")]
    pub lab_name: String,
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub distro: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    /// コンテナ名をFQDNにする
    #[serde(default)]
    pub container_fqdn: bool,
    /// 外部ホストの既定ドメイン
    #[serde(default)]
    pub domain: Option<String>,
    /// ラボ全体のネームサーバー
    #[serde(default)]
    pub dns: Option<String>,
    #[serde(default)]
    pub network: Option<NetworkSpec>,
    #[serde(default)]
    pub external: Option<ExternalHosts>,
    #[serde(default)]
    pub ipa_deployments: Vec<Deployment>,
    #[serde(default)]
    pub containerfiles: Vec<String>,
    #[serde(default)]
    pub extra_data: Vec<String>,
    #[serde(default)]
    pub mount_varlog: bool,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub dm_password: Option<String>,
}

fn default_lab_name() -> String {
    DEFAULT_LAB_NAME.to_string()
}

impl Default for LabModel {
    fn default() -> Self {
        Self {
            lab_name: default_lab_name(),
            subnet: None,
            distro: None,
            tag: None,
            container_fqdn: false,
            domain: None,
            dns: None,
            network: None,
            external: None,
            ipa_deployments: Vec::new(),
            containerfiles: Vec::new(),
            extra_data: Vec::new(),
            mount_varlog: false,
            admin_password: None,
            dm_password: None,
        }
    }
}

impl LabModel {
    pub fn distro(&self) -> &str {
        self.distro.as_deref().unwrap_or(DEFAULT_DISTRO)
    }

    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    /// 管理者パスワード（デプロイメント指定 > ラボ指定 > 既定値）
    pub fn admin_password<'a>(&'a self, deployment: &'a Deployment) -> &'a str {
        deployment
            .admin_password
            .as_deref()
            .or(self.admin_password.as_deref())
            .unwrap_or(DEFAULT_ADMIN_PASSWORD)
    }

    /// Directory Manager パスワード（デプロイメント指定 > ラボ指定 > 既定値）
    pub fn dm_password<'a>(&'a self, deployment: &'a Deployment) -> &'a str {
        deployment
            .dm_password
            .as_deref()
            .or(self.dm_password.as_deref())
            .unwrap_or(DEFAULT_DM_PASSWORD)
    }

    pub fn external_hosts(&self) -> &[ExternalHost] {
        self.external
            .as_ref()
            .map(|external| external.hosts.as_slice())
            .unwrap_or_default()
    }
}

/// 外部ホストブロック
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalHosts {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub network: Option<NetworkSpec>,
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub hosts: Vec<ExternalHost>,
    #[serde(default)]
    pub vars: Mapping,
}
