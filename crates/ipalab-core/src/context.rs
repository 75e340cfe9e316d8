//! 生成1回分の実行コンテキスト
//!
//! アドレス割り当てキャッシュ・ノード→アドレス表・ロールが出力する
//! 成果物を保持し、各フェーズへ順に渡される。

use crate::allocator::{AddressAllocator, AllocatorCache};
use ipnet::Ipv4Net;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::warn;

/// 出力ディレクトリに書き出す成果物
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// 生成したファイル（出力ディレクトリからの相対パス）
    File { path: PathBuf, contents: String },
    /// 既存ファイル（またはディレクトリ）を `dest_dir` へコピー
    Copy { source: PathBuf, dest_dir: PathBuf },
    /// 組み込みのヘルパーディレクトリを展開
    Helper(String),
    /// 空ディレクトリを作成
    Directory(PathBuf),
}

impl Artifact {
    pub fn file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// compose フェーズで確定したデプロイメントごとの情報
///
/// inventory フェーズの DNS 関連変数に使われる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentFacts {
    pub name: String,
    /// 最初のサーバーのアドレス
    pub server_address: Option<Ipv4Addr>,
    /// デプロイメントが属するネットワークのゲートウェイ
    pub gateway: Option<Ipv4Addr>,
}

#[derive(Debug)]
pub struct GenerationContext {
    config_dir: PathBuf,
    allocators: AllocatorCache,
    nodes: BTreeMap<String, Ipv4Addr>,
    lab_nameserver: Option<Ipv4Addr>,
    deployments: Vec<DeploymentFacts>,
    artifacts: Vec<Artifact>,
}

impl GenerationContext {
    /// `config_dir` はラボ記述ファイルのディレクトリ（相対パス解決の基準）
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            allocators: AllocatorCache::new(),
            nodes: BTreeMap::new(),
            lab_nameserver: None,
            deployments: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn allocator(&mut self, subnet: Ipv4Net) -> &mut AddressAllocator {
        self.allocators.for_subnet(subnet)
    }

    /// ノードのFQDNとアドレスを記録
    pub fn record_node(&mut self, hostname: &str, address: Ipv4Addr) {
        if let Some(previous) = self.nodes.insert(hostname.to_string(), address) {
            warn!(hostname, %previous, %address, "Hostname defined more than once");
        }
    }

    pub fn node_address(&self, hostname: &str) -> Option<Ipv4Addr> {
        self.nodes.get(hostname).copied()
    }

    /// FQDN → アドレス（FQDN順）
    pub fn nodes(&self) -> &BTreeMap<String, Ipv4Addr> {
        &self.nodes
    }

    /// 外部ネームサーバーのアドレス
    pub fn lab_nameserver(&self) -> Option<Ipv4Addr> {
        self.lab_nameserver
    }

    pub fn set_lab_nameserver(&mut self, address: Ipv4Addr) {
        self.lab_nameserver = Some(address);
    }

    pub fn push_deployment(&mut self, facts: DeploymentFacts) {
        self.deployments.push(facts);
    }

    pub fn deployments(&self) -> &[DeploymentFacts] {
        &self.deployments
    }

    pub fn push_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}
