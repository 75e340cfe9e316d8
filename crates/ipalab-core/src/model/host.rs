//! ホスト定義

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::fmt;
use std::net::Ipv4Addr;

/// サーバー・レプリカ・クライアント共通のホスト定義
///
/// ```yaml
/// - name: server
///   hostname: server.ipa.test
///   capabilities: [DNS, KRA]
///   vars:
///     ipaserver_netbios_name: IPA
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip_address: Option<Ipv4Addr>,
    /// 明示的なイメージ（distro/tag より優先）
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub distro: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    /// ネームサーバー（IPアドレスまたはホスト名）
    #[serde(default)]
    pub dns: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub vars: Mapping,
    #[serde(default, deserialize_with = "super::string_or_list")]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub ports: Vec<String>,
    /// メモリ上限（例: "4G"）
    #[serde(default)]
    pub memory: Option<String>,
    /// /var/log のマウントを無効化
    #[serde(default)]
    pub nolog: bool,
}

impl Host {
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

/// 外部ホスト（IPAデプロイメント外のノード）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalHost {
    #[serde(flatten)]
    pub host: Host,
    /// ロール名（dns, addc, keycloak）
    #[serde(default)]
    pub role: Option<String>,
    /// ロール固有のオプション
    #[serde(default)]
    pub options: Mapping,
}

impl ExternalHost {
    /// ロール名（未指定は "none"、小文字化）
    pub fn role_name(&self) -> String {
        self.role
            .as_deref()
            .unwrap_or("none")
            .to_ascii_lowercase()
    }
}

/// ホストのケイパビリティ
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Capability {
    /// 統合DNS
    Dns,
    /// Key Recovery Authority
    Kra,
    /// AD信頼
    Ad,
    /// 認証局（レプリカのみ）
    Ca,
    /// 隠しレプリカ
    Hidden,
    /// ランダムシリアル番号
    Rsn,
    Other(String),
}

impl From<String> for Capability {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "DNS" => Self::Dns,
            "KRA" => Self::Kra,
            "AD" => Self::Ad,
            "CA" => Self::Ca,
            "HIDDEN" => Self::Hidden,
            "RSN" => Self::Rsn,
            _ => Self::Other(value),
        }
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dns => f.write_str("DNS"),
            Self::Kra => f.write_str("KRA"),
            Self::Ad => f.write_str("AD"),
            Self::Ca => f.write_str("CA"),
            Self::Hidden => f.write_str("HIDDEN"),
            Self::Rsn => f.write_str("RSN"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_case_insensitive() {
        let caps: Vec<Capability> = serde_yaml::from_str("[dns, Kra, AD, hidden, foo]").unwrap();
        assert_eq!(
            caps,
            vec![
                Capability::Dns,
                Capability::Kra,
                Capability::Ad,
                Capability::Hidden,
                Capability::Other("foo".to_string()),
            ]
        );
    }

    #[test]
    fn test_external_host_role_name() {
        let host: ExternalHost = serde_yaml::from_str("name: ns\nrole: DNS\n").unwrap();
        assert_eq!(host.host.name, "ns");
        assert_eq!(host.role_name(), "dns");

        let host: ExternalHost = serde_yaml::from_str("name: plain\n").unwrap();
        assert_eq!(host.role_name(), "none");
    }

    #[test]
    fn test_volumes_scalar() {
        let host: Host = serde_yaml::from_str("name: h\nvolumes: /a:/b\n").unwrap();
        assert_eq!(host.volumes, vec!["/a:/b".to_string()]);
    }
}
