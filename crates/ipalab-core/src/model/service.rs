//! compose サービス定義（出力）

use serde::{Serialize, Serializer};
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// compose の1コンテナ分のサービスレコード
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceRecord {
    pub container_name: String,
    pub systemd: bool,
    pub no_hosts: bool,
    pub restart: RestartPolicy,
    pub cap_add: Vec<String>,
    pub security_opt: Vec<String>,
    pub hostname: String,
    pub networks: BTreeMap<String, NetworkAttachment>,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<Nameserver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_search: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_swap: Option<i64>,
    /// 外部ノードの元のロール指定（出力前に取り除かれる）
    #[serde(skip)]
    pub external_node: Option<ExternalNode>,
}

impl ServiceRecord {
    /// 割り当て済みのIPv4アドレス
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.networks
            .values()
            .next()
            .map(|attachment| attachment.ipv4_address)
    }

    /// ネームサーバー設定を取り除く
    pub fn clear_dns(&mut self) {
        self.dns = None;
        self.dns_search = None;
    }
}

/// 再起動ポリシー
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// 再起動しない（デフォルト）
    #[default]
    No,
}

/// ビルド設定
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildConfig {
    /// ビルドコンテキスト（出力ディレクトリからの相対パス）
    pub context: String,
    /// Containerfile 名
    pub dockerfile: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl BuildConfig {
    pub fn new(context: impl Into<String>, dockerfile: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            dockerfile: dockerfile.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkAttachment {
    pub ipv4_address: Ipv4Addr,
}

/// 外部ノードのロール指定
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalNode {
    pub role: String,
    pub options: Mapping,
}

/// サービスのネームサーバー
///
/// ホスト名指定は `{fqdn}` 形式のプレースホルダとして保持し、
/// 全ノードのアドレス確定後に置換する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nameserver {
    Address(IpAddr),
    Placeholder(String),
}

impl Nameserver {
    /// 設定値を解釈する
    ///
    /// IPアドレスはそのまま、`{name}` はプレースホルダ、
    /// それ以外はドメインで修飾したホスト名のプレースホルダになる。
    pub fn parse(value: &str, domain: &str) -> Self {
        let value = value.trim();
        if let Ok(address) = value.parse::<IpAddr>() {
            return Self::Address(address);
        }
        if let Some(name) = value
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            return Self::Placeholder(name.to_string());
        }
        Self::Placeholder(crate::naming::ensure_fqdn(value, domain))
    }

    pub fn is_placeholder_for(&self, hostname: &str) -> bool {
        matches!(self, Self::Placeholder(name) if name == hostname)
    }
}

impl fmt::Display for Nameserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{}", address),
            Self::Placeholder(name) => write!(f, "{{{}}}", name),
        }
    }
}

impl Serialize for Nameserver {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
