//! ノード（compose サービス）の構築

use crate::context::GenerationContext;
use crate::error::Result;
use crate::model::{
    BuildConfig, Host, NetworkAttachment, Nameserver, RestartPolicy, ServiceRecord, split_distro,
};
use crate::naming::{resolve_container_name, resolve_hostname};
use crate::network::PlannedNetwork;
use ipnet::Ipv4Net;
use std::path::PathBuf;
use tracing::debug;

/// 全ノード共通のケイパビリティ
const CAPABILITIES: [&str; 2] = ["SYS_ADMIN", "DAC_READ_SEARCH"];
/// コンテナイメージのビルドコンテキスト
const CONTAINERFILES_DIR: &str = "containerfiles";

/// ノード構築時に上位（ラボ・デプロイメント）から継承する設定
#[derive(Debug, Clone)]
pub struct NodeScope<'a> {
    pub network: &'a PlannedNetwork,
    pub domain: &'a str,
    /// デプロイメント（またはラボ）の distro
    pub distro: &'a str,
    /// デプロイメント（またはラボ）の tag
    pub tag: &'a str,
    /// スコープ既定のネームサーバー
    pub nameserver: Option<&'a str>,
    pub container_fqdn: bool,
    pub mount_varlog: bool,
    /// 明示アドレスが [`reserve_addresses`] で確保済みか
    pub addresses_reserved: bool,
}

/// ホストの明示アドレスを自動割り当てより先に確保する
pub fn reserve_addresses<'h>(
    hosts: impl IntoIterator<Item = &'h Host>,
    subnet: Ipv4Net,
    ctx: &mut GenerationContext,
) -> Result<()> {
    let allocator = ctx.allocator(subnet);
    for address in hosts.into_iter().filter_map(|host| host.ip_address) {
        allocator.reserve(address)?;
    }
    Ok(())
}

/// ホスト定義から compose サービスを構築
///
/// アドレスは明示指定があればそれを確保し、なければスコープの
/// サブネットから払い出す。確定した FQDN→アドレスはコンテキストに記録される。
pub fn build_node(
    host: &Host,
    scope: &NodeScope<'_>,
    ctx: &mut GenerationContext,
) -> Result<ServiceRecord> {
    let container_name = resolve_container_name(host, scope.domain, scope.container_fqdn);
    let hostname = resolve_hostname(host, &host.name, scope.domain);

    let allocator = ctx.allocator(scope.network.subnet);
    let address = match host.ip_address {
        Some(address) if scope.addresses_reserved => address,
        Some(address) => {
            allocator.reserve(address)?;
            address
        }
        None => allocator.allocate()?,
    };
    ctx.record_node(&hostname, address);

    let (image, build) = resolve_image(host, scope);

    let mut volumes = host.volumes.clone();
    if scope.mount_varlog && !host.nolog {
        volumes.push(log_volume(&container_name));
    }

    let dns = host
        .dns
        .as_deref()
        .or(scope.nameserver)
        .map(|value| Nameserver::parse(value, scope.domain));
    let dns_search = dns.as_ref().map(|_| scope.domain.to_string());

    let mut record = ServiceRecord {
        container_name,
        systemd: true,
        no_hosts: true,
        restart: RestartPolicy::No,
        cap_add: CAPABILITIES.iter().map(|cap| cap.to_string()).collect(),
        security_opt: vec!["label=disable".to_string()],
        hostname,
        image,
        build,
        dns,
        dns_search,
        volumes,
        ports: host.ports.clone(),
        mem_limit: host.memory.as_ref().map(|memory| memory.to_lowercase()),
        memory_swap: host.memory.as_ref().map(|_| -1),
        ..Default::default()
    };
    record.networks.insert(
        scope.network.name.clone(),
        NetworkAttachment {
            ipv4_address: address,
        },
    );

    debug!(
        node = %record.container_name,
        hostname = %record.hostname,
        %address,
        image = %record.image,
        "Built node"
    );
    Ok(record)
}

fn log_volume(container_name: &str) -> String {
    format!("./logs/{}:/var/log:rw", container_name)
}

/// /var/log をマウントしているノードのログディレクトリ（出力ディレクトリからの相対パス）
pub fn log_dir(record: &ServiceRecord) -> Option<PathBuf> {
    let volume = log_volume(&record.container_name);
    record
        .volumes
        .contains(&volume)
        .then(|| PathBuf::from("logs").join(&record.container_name))
}

/// イメージを決定
///
/// 優先順位: ホストの image > ホストの distro/tag > スコープの distro/tag
fn resolve_image(host: &Host, scope: &NodeScope<'_>) -> (String, Option<BuildConfig>) {
    if let Some(image) = &host.image {
        return (image.clone(), None);
    }

    let (distro, distro_tag) = match host.distro.as_deref() {
        Some(distro) => split_distro(distro),
        None => (scope.distro, None),
    };
    let tag = host.tag.as_deref().or(distro_tag).unwrap_or(scope.tag);

    let build = BuildConfig::new(CONTAINERFILES_DIR, distro).with_arg("tag", tag);
    (format!("localhost/{}:{}", distro, tag), Some(build))
}
