//! compose ドキュメントの組み立て
//!
//! `Init → NetworkPlanned → ExternalHostsResolved → DeploymentsResolved → Finalized`
//! の順に状態を進める。ネームサーバーのホスト名はプレースホルダとして保持し、
//! 全ノードのアドレスが確定した最後のフェーズで置換する。

use crate::context::{DeploymentFacts, GenerationContext};
use crate::error::{LabError, Result};
use crate::model::{
    Capability, DEFAULT_DOMAIN, Deployment, ExternalHost, ExternalHosts, LabModel, Nameserver,
    NetworkFragment, NetworkSpec, ServiceRecord, split_distro,
};
use crate::naming::resolve_hostname;
use crate::network::{PlannedNetwork, plan_lab_network, plan_scope_network};
use crate::node::{NodeScope, build_node, reserve_addresses};
use crate::roles::{RoleInput, RolePlugin, apply_role, resolve_role};
use ipnet::Ipv4Net;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// 外部ホストブロックの専用ネットワーク名に使う名前
const EXTERNAL_SCOPE: &str = "external";

/// 組み立ての状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComposeState {
    Init,
    NetworkPlanned,
    ExternalHostsResolved,
    DeploymentsResolved,
    Finalized,
}

/// compose.yml の内容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeDocument {
    pub name: String,
    pub networks: BTreeMap<String, NetworkFragment>,
    pub services: BTreeMap<String, ServiceRecord>,
}

impl ComposeDocument {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// compose ドキュメントを組み立てる
pub struct ComposeAssembler<'a> {
    lab: &'a LabModel,
    state: ComposeState,
    lab_network: Option<PlannedNetwork>,
    lab_network_used: bool,
    networks: BTreeMap<String, NetworkFragment>,
    services: BTreeMap<String, ServiceRecord>,
}

impl<'a> ComposeAssembler<'a> {
    pub fn new(lab: &'a LabModel) -> Self {
        Self {
            lab,
            state: ComposeState::Init,
            lab_network: None,
            lab_network_used: false,
            networks: BTreeMap::new(),
            services: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> ComposeState {
        self.state
    }

    /// 全フェーズを実行
    pub fn assemble(mut self, ctx: &mut GenerationContext) -> Result<ComposeDocument> {
        self.plan_network(ctx)?;
        self.resolve_external_hosts(ctx)?;
        self.resolve_deployments(ctx)?;
        self.finalize(ctx)
    }

    fn advance(&mut self, next: ComposeState) {
        debug_assert!(self.state < next, "compose phases must run in order");
        debug!(from = ?self.state, to = ?next, "Compose state transition");
        self.state = next;
    }

    /// ラボ共有ネットワーク
    fn shared_network(&self) -> Result<&PlannedNetwork> {
        self.lab_network
            .as_ref()
            .ok_or_else(|| LabError::InvalidNetwork("lab network has not been planned".to_string()))
    }

    /// ネットワークを計画し、明示アドレスを先に確保する
    fn plan_network(&mut self, ctx: &mut GenerationContext) -> Result<()> {
        let lab = self.lab;
        self.lab_network = Some(plan_lab_network(
            lab.network.as_ref(),
            lab.subnet.as_deref(),
            &lab.lab_name,
        )?);
        self.reserve_explicit_addresses(ctx)?;
        self.advance(ComposeState::NetworkPlanned);
        Ok(())
    }

    /// 明示アドレスはホストの定義順に関係なく自動割り当てより優先される
    fn reserve_explicit_addresses(&self, ctx: &mut GenerationContext) -> Result<()> {
        let lab = self.lab;
        if let Some(external) = external_block(lab) {
            let subnet = self.scope_subnet(
                external.network.as_ref(),
                external.subnet.as_deref(),
                EXTERNAL_SCOPE,
            )?;
            reserve_addresses(external.hosts.iter().map(|host| &host.host), subnet, ctx)?;
        }
        for deployment in &lab.ipa_deployments {
            let Some(cluster) = &deployment.cluster else {
                continue;
            };
            let subnet = self.scope_subnet(
                deployment.network.as_ref(),
                deployment.subnet.as_deref(),
                &deployment.name,
            )?;
            reserve_addresses(cluster.servers.iter().chain(&cluster.clients.hosts), subnet, ctx)?;
        }
        Ok(())
    }

    /// スコープが使うサブネット（ドキュメントには追加しない）
    fn scope_subnet(
        &self,
        network: Option<&NetworkSpec>,
        subnet: Option<&str>,
        fallback_name: &str,
    ) -> Result<Ipv4Net> {
        let shared = self.shared_network()?;
        Ok(plan_scope_network(network, subnet, fallback_name, shared)?
            .map_or(shared.subnet, |planned| planned.subnet))
    }

    /// 外部ホストのノードを構築（ネームサーバーロールを先に処理）
    fn resolve_external_hosts(&mut self, ctx: &mut GenerationContext) -> Result<()> {
        let lab = self.lab;
        if let Some(external) = external_block(lab) {
            let domain = external
                .domain
                .as_deref()
                .or(lab.domain.as_deref())
                .unwrap_or(DEFAULT_DOMAIN);
            let network = self.scope_network(
                external.network.as_ref(),
                external.subnet.as_deref(),
                EXTERNAL_SCOPE,
            )?;

            let mut hosts = external
                .hosts
                .iter()
                .map(|host| Ok((host, resolve_role(&host.role_name())?)))
                .collect::<Result<Vec<_>>>()?;
            hosts.sort_by_key(|(_, role)| !role.is_nameserver());

            let nameservers = hosts
                .iter()
                .filter(|(_, role)| role.is_nameserver())
                .count();
            if nameservers > 1 {
                warn!(
                    count = nameservers,
                    "More than one external nameserver defined, none will be used lab-wide"
                );
            }

            for (host, role) in hosts {
                let nameserver = if role.is_nameserver() {
                    None
                } else {
                    lab_nameserver(lab, ctx)
                };
                let node = self.build_external_node(host, role, &network, domain, nameserver, ctx)?;
                if role.is_nameserver()
                    && nameservers == 1
                    && let Some(address) = node.address()
                {
                    info!(nameserver = %address, "Using external nameserver lab-wide");
                    ctx.set_lab_nameserver(address);
                }
                self.insert_service(node);
            }
        }
        self.advance(ComposeState::ExternalHostsResolved);
        Ok(())
    }

    fn build_external_node(
        &self,
        host: &ExternalHost,
        role: &dyn RolePlugin,
        network: &PlannedNetwork,
        domain: &str,
        nameserver: Option<String>,
        ctx: &mut GenerationContext,
    ) -> Result<ServiceRecord> {
        let lab = self.lab;
        let scope = NodeScope {
            network,
            domain,
            distro: lab.distro(),
            tag: lab.tag(),
            nameserver: nameserver.as_deref(),
            container_fqdn: lab.container_fqdn,
            mount_varlog: lab.mount_varlog,
            addresses_reserved: true,
        };
        let mut node = build_node(&host.host, &scope, ctx)?;
        let input = RoleInput {
            lab,
            subnet: network.subnet,
            options: &host.options,
        };
        apply_role(role, &input, &mut node, host.host.image.is_some(), ctx)?;
        Ok(node)
    }

    fn resolve_deployments(&mut self, ctx: &mut GenerationContext) -> Result<()> {
        let lab = self.lab;
        for deployment in &lab.ipa_deployments {
            self.resolve_deployment(deployment, ctx)?;
        }
        self.advance(ComposeState::DeploymentsResolved);
        Ok(())
    }

    fn resolve_deployment(
        &mut self,
        deployment: &Deployment,
        ctx: &mut GenerationContext,
    ) -> Result<()> {
        let lab = self.lab;
        let domain = deployment.domain.as_str();
        let cluster = deployment
            .cluster
            .as_ref()
            .ok_or_else(|| LabError::MissingCluster(domain.to_string()))?;
        if cluster.is_empty() {
            return Err(LabError::EmptyDeployment(deployment.name.clone()));
        }

        let network = self.scope_network(
            deployment.network.as_ref(),
            deployment.subnet.as_deref(),
            &deployment.name,
        )?;

        let (distro, distro_tag) = match deployment.distro.as_deref() {
            Some(distro) => split_distro(distro),
            None => (lab.distro(), None),
        };
        let tag = deployment
            .tag
            .as_deref()
            .or(distro_tag)
            .unwrap_or(lab.tag());

        // ホスト・デプロイメント指定がない場合のネームサーバー
        let scope_nameserver = deployment
            .dns
            .clone()
            .or_else(|| lab_nameserver(lab, ctx));
        let server_hostname = cluster
            .server()
            .map(|server| resolve_hostname(server, &server.name, domain));
        let member_nameserver = scope_nameserver.clone().or_else(|| {
            cluster
                .server()
                .filter(|server| server.has_capability(&Capability::Dns))
                .and(server_hostname.as_ref())
                .map(|hostname| format!("{{{}}}", hostname))
        });

        let scope = NodeScope {
            network: &network,
            domain,
            distro,
            tag,
            nameserver: scope_nameserver.as_deref(),
            container_fqdn: lab.container_fqdn,
            mount_varlog: lab.mount_varlog,
            addresses_reserved: true,
        };

        let mut server_address = None;
        if let (Some(server), Some(hostname)) = (cluster.server(), &server_hostname) {
            let mut node = build_node(server, &scope, ctx)?;
            let self_reference = match &node.dns {
                Some(dns @ Nameserver::Placeholder(_)) => dns.is_placeholder_for(hostname),
                Some(Nameserver::Address(address)) => {
                    node.address().map(IpAddr::V4) == Some(*address)
                }
                None => false,
            };
            if self_reference {
                debug!(server = %hostname, "Dropping nameserver pointing at the server itself");
                node.clear_dns();
            }
            server_address = node.address();
            self.insert_service(node);
        } else {
            warn!(deployment = %deployment.name, "No servers defined for domain '{}'", domain);
        }

        let scope = NodeScope {
            nameserver: member_nameserver.as_deref(),
            ..scope
        };
        for host in cluster.replicas().iter().chain(&cluster.clients.hosts) {
            let node = build_node(host, &scope, ctx)?;
            self.insert_service(node);
        }

        let gateway = ctx.allocator(network.subnet).gateway();
        ctx.push_deployment(DeploymentFacts {
            name: deployment.name.clone(),
            server_address,
            gateway,
        });
        debug!(deployment = %deployment.name, network = %network.name, "Resolved deployment");
        Ok(())
    }

    /// スコープのネットワークを決定し、必要ならドキュメントに追加
    fn scope_network(
        &mut self,
        network: Option<&NetworkSpec>,
        subnet: Option<&str>,
        fallback_name: &str,
    ) -> Result<PlannedNetwork> {
        let shared = self.shared_network()?;
        match plan_scope_network(network, subnet, fallback_name, shared)? {
            Some(planned) => {
                self.networks
                    .insert(planned.name.clone(), planned.fragment.clone());
                Ok(planned)
            }
            None => {
                let shared = shared.clone();
                self.lab_network_used = true;
                Ok(shared)
            }
        }
    }

    fn insert_service(&mut self, node: ServiceRecord) {
        let name = node.container_name.clone();
        if self.services.insert(name.clone(), node).is_some() {
            warn!(service = %name, "Service defined more than once, keeping the last definition");
        }
    }

    /// プレースホルダを解決し、出力用のドキュメントを返す
    fn finalize(mut self, ctx: &GenerationContext) -> Result<ComposeDocument> {
        for service in self.services.values_mut() {
            if let Some(Nameserver::Placeholder(hostname)) = &service.dns {
                let address = ctx
                    .node_address(hostname)
                    .ok_or_else(|| LabError::UnresolvedNameserver(hostname.clone()))?;
                service.dns = Some(Nameserver::Address(IpAddr::V4(address)));
            }
            service.external_node = None;
        }

        if self.lab_network_used {
            let shared = self.shared_network()?;
            let (name, fragment) = (shared.name.clone(), shared.fragment.clone());
            self.networks.insert(name, fragment);
        }
        self.advance(ComposeState::Finalized);

        Ok(ComposeDocument {
            name: self.lab.lab_name.clone(),
            networks: self.networks,
            services: self.services,
        })
    }
}

/// ホストを持つ外部ホストブロック
fn external_block(lab: &LabModel) -> Option<&ExternalHosts> {
    lab.external
        .as_ref()
        .filter(|external| !external.hosts.is_empty())
}

/// ラボ全体のネームサーバー（外部ネームサーバーのアドレス > ラボの `dns`）
fn lab_nameserver(lab: &LabModel, ctx: &GenerationContext) -> Option<String> {
    ctx.lab_nameserver()
        .map(|address| address.to_string())
        .or_else(|| lab.dns.clone())
}

/// compose ドキュメントを生成
pub fn gen_compose(lab: &LabModel, ctx: &mut GenerationContext) -> Result<ComposeDocument> {
    ComposeAssembler::new(lab).assemble(ctx)
}
