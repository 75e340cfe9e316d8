//! ネットワーク定義

use serde::{Deserialize, Serialize};

/// 入力のネットワーク指定
///
/// 文字列は外部管理ネットワークへの参照、マップは自前の定義。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NetworkSpec {
    External(String),
    Definition(NetworkDefinition),
}

/// 自前のネットワーク定義
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub external: bool,
    /// `false` で DNS 無効化、アドレス（またはそのリスト）で上書き
    #[serde(default)]
    pub dns: Option<serde_yaml::Value>,
}

/// compose ドキュメントの `networks` に出力されるネットワーク
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkFragment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam: Option<Ipam>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_dns: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
}

impl NetworkFragment {
    /// 外部管理ネットワークへの参照
    pub fn external() -> Self {
        Self {
            external: true,
            ..Default::default()
        }
    }

    /// 指定サブネットのブリッジネットワーク
    pub fn bridge(subnet: impl Into<String>) -> Self {
        Self {
            driver: Some("bridge".to_string()),
            ipam: Some(Ipam {
                config: vec![IpamConfig {
                    subnet: subnet.into(),
                }],
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ipam {
    pub config: Vec<IpamConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpamConfig {
    pub subnet: String,
}
