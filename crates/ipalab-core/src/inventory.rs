//! Ansible インベントリの組み立て
//!
//! デプロイメントごとに `ipaserver` → `ipareplicas` → `ipaclients` の順で
//! 変数を決定する。各ホストの `vars` は常に最後にマージされる。

use crate::context::{DeploymentFacts, GenerationContext};
use crate::error::{LabError, Result};
use crate::model::{Capability, DEFAULT_DOMAIN, Deployment, Host, LabModel};
use crate::naming::{
    deployment_group_name, lab_group_name, resolve_container_name, resolve_hostname,
};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// 外部ホストの親グループ名
const EXTERNAL_GROUP: &str = "external";

/// インベントリのグループ
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryGroup {
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub vars: Mapping,
    /// ホスト名 → ホスト変数（定義順）
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    pub hosts: Mapping,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, InventoryGroup>,
}

impl InventoryGroup {
    pub fn child(&self, name: &str) -> Option<&InventoryGroup> {
        self.children.get(name)
    }

    pub fn host(&self, name: &str) -> Option<&Mapping> {
        self.hosts.get(name).and_then(Value::as_mapping)
    }

    fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.hosts.is_empty() && self.children.is_empty()
    }
}

/// inventory.yml の内容
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InventoryDocument {
    pub groups: BTreeMap<String, InventoryGroup>,
}

impl InventoryDocument {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// ラボ（最上位）グループ
    pub fn lab_group(&self) -> Option<&InventoryGroup> {
        self.groups.values().next()
    }
}

/// ケイパビリティごとの変数接頭辞
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    Server,
    Replica,
}

impl Component {
    fn prefix(self) -> &'static str {
        match self {
            Component::Server => "ipaserver",
            Component::Replica => "ipareplica",
        }
    }
}

fn set(map: &mut Mapping, key: impl Into<String>, value: impl Into<Value>) {
    map.insert(Value::String(key.into()), value.into());
}

fn merge(map: &mut Mapping, vars: &Mapping) {
    for (key, value) in vars {
        map.insert(key.clone(), value.clone());
    }
}

/// ケイパビリティから変数を生成
fn capability_vars(
    host: &Host,
    component: Component,
    gateway: Option<Ipv4Addr>,
    options: &mut Mapping,
) {
    let prefix = component.prefix();
    for capability in &host.capabilities {
        match (capability, component) {
            (Capability::Dns, _) => {
                set(options, format!("{prefix}_setup_dns"), true);
                set(options, format!("{prefix}_auto_forwarders"), false);
                set(options, format!("{prefix}_forward_policy"), "first");
                if let Some(gateway) = gateway {
                    set(options, format!("{prefix}_forwarders"), vec![gateway.to_string()]);
                }
                set(options, format!("{prefix}_no_dnssec_validation"), true);
                set(options, format!("{prefix}_auto_reverse"), true);
            }
            (Capability::Kra, _) => set(options, format!("{prefix}_setup_kra"), true),
            (Capability::Ad, _) => set(options, format!("{prefix}_setup_adtrust"), true),
            (Capability::Rsn, Component::Server) => {
                set(options, "ipaserver_random_serial_numbers", true)
            }
            (Capability::Ca, Component::Replica) => set(options, "ipareplica_setup_ca", true),
            (Capability::Hidden, Component::Replica) => {
                set(options, "ipareplica_hidden_replica", true)
            }
            (Capability::Other(name), _) => {
                warn!(host = %host.name, capability = %name, "Ignoring unknown capability");
            }
            (capability, _) => {
                debug!(host = %host.name, %capability, component = prefix, "Capability not applicable");
            }
        }
    }
}

/// DNS リゾルバ修正用の変数
fn dns_resolver_fix_vars(server_address: Ipv4Addr) -> Mapping {
    let mut vars = Mapping::new();
    set(&mut vars, "ipaclient_cleanup_dns_resolver", true);
    set(&mut vars, "ipaclient_configure_dns_resolver", true);
    set(&mut vars, "ipaclient_dns_servers", vec![server_address.to_string()]);
    vars
}

struct DeploymentInventory<'a> {
    lab: &'a LabModel,
    deployment: &'a Deployment,
    facts: Option<&'a DeploymentFacts>,
    /// ラボ全体のネームサーバーが存在するか
    lab_nameserver: bool,
}

impl DeploymentInventory<'_> {
    fn host_key(&self, host: &Host) -> String {
        resolve_container_name(host, &self.deployment.domain, self.lab.container_fqdn)
    }

    fn hostname(&self, host: &Host) -> String {
        resolve_hostname(host, &host.name, &self.deployment.domain)
    }

    fn gateway(&self) -> Option<Ipv4Addr> {
        self.facts.and_then(|facts| facts.gateway)
    }

    fn build(&self) -> Result<InventoryGroup> {
        let deployment = self.deployment;
        let domain = deployment.domain.as_str();
        let cluster = deployment
            .cluster
            .as_ref()
            .ok_or_else(|| LabError::MissingCluster(domain.to_string()))?;

        let mut group = InventoryGroup::default();
        set(&mut group.vars, "ansible_connection", "podman");
        set(&mut group.vars, "ipaadmin_password", self.lab.admin_password(deployment));
        set(&mut group.vars, "ipadm_password", self.lab.dm_password(deployment));
        set(&mut group.vars, "ipaserver_domain", domain);
        set(&mut group.vars, "ipaserver_realm", deployment.realm());
        set(&mut group.vars, "ipaclient_no_ntp", true);
        merge(&mut group.vars, &deployment.vars);

        let mut server_hostname = None;
        let mut resolver_fix = None;
        if let Some(server) = cluster.server() {
            let options = self.server_vars(server);
            server_hostname = Some(self.hostname(server));
            let setup_dns = options
                .get("ipaserver_setup_dns")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if setup_dns && !self.lab_nameserver {
                resolver_fix = self
                    .facts
                    .and_then(|facts| facts.server_address)
                    .map(dns_resolver_fix_vars);
            }

            let mut ipaserver = InventoryGroup::default();
            ipaserver
                .hosts
                .insert(Value::String(self.host_key(server)), Value::Mapping(options));
            group.children.insert("ipaserver".to_string(), ipaserver);
        }

        let replicas = cluster.replicas();
        if !replicas.is_empty() {
            let mut ipareplicas = InventoryGroup::default();
            set(&mut ipareplicas.vars, "ipaclient_no_ntp", false);
            set(&mut ipareplicas.vars, "ipareplica_setup_firewalld", false);
            set(&mut ipareplicas.vars, "ipareplica_no_host_dns", true);
            if let Some(hostname) = &server_hostname {
                set(&mut ipareplicas.vars, "ipareplica_servers", hostname.as_str());
            }
            if let Some(fix) = &resolver_fix {
                merge(&mut ipareplicas.vars, fix);
            }
            for replica in replicas {
                let mut options = Mapping::new();
                set(&mut options, "ipareplica_hostname", self.hostname(replica));
                capability_vars(replica, Component::Replica, self.gateway(), &mut options);
                merge(&mut options, &replica.vars);
                ipareplicas
                    .hosts
                    .insert(Value::String(self.host_key(replica)), Value::Mapping(options));
            }
            group.children.insert("ipareplicas".to_string(), ipareplicas);
        }

        let clients = &cluster.clients;
        if !clients.hosts.is_empty() {
            let mut ipaclients = InventoryGroup::default();
            if let Some(hostname) = &server_hostname {
                set(&mut ipaclients.vars, "ipaclient_servers", hostname.as_str());
            }
            if let Some(fix) = &resolver_fix {
                merge(&mut ipaclients.vars, fix);
            }
            merge(&mut ipaclients.vars, &clients.vars);
            for client in &clients.hosts {
                let mut options = Mapping::new();
                set(&mut options, "ipaclient_hostname", self.hostname(client));
                merge(&mut options, &client.vars);
                ipaclients
                    .hosts
                    .insert(Value::String(self.host_key(client)), Value::Mapping(options));
            }
            group.children.insert("ipaclients".to_string(), ipaclients);
        }

        Ok(group)
    }

    fn server_vars(&self, server: &Host) -> Mapping {
        let mut options = Mapping::new();
        set(&mut options, "ipaserver_hostname", self.hostname(server));
        capability_vars(server, Component::Server, self.gateway(), &mut options);
        set(&mut options, "ipaclient_no_ntp", false);
        set(&mut options, "ipaserver_setup_firewalld", false);
        set(&mut options, "ipaserver_no_host_dns", true);
        merge(&mut options, &server.vars);
        options
    }
}

/// 外部ホストを `role_<role>` グループに分類
fn external_group(lab: &LabModel) -> Option<InventoryGroup> {
    let external = lab.external.as_ref()?;
    if external.hosts.is_empty() {
        return None;
    }
    let domain = external
        .domain
        .as_deref()
        .or(lab.domain.as_deref())
        .unwrap_or(DEFAULT_DOMAIN);

    let mut group = InventoryGroup {
        vars: external.vars.clone(),
        ..Default::default()
    };
    for host in &external.hosts {
        let key = resolve_container_name(&host.host, domain, lab.container_fqdn);
        group
            .children
            .entry(format!("role_{}", host.role_name()))
            .or_default()
            .hosts
            .insert(Value::String(key), Value::Mapping(host.host.vars.clone()));
    }
    Some(group)
}

/// デプロイメント名の一意性を検証
///
/// ラボ名との衝突、グループ名に変換した後の重複を含む。
fn check_deployment_names(lab: &LabModel) -> Result<()> {
    let mut seen = HashSet::new();
    if !lab.external_hosts().is_empty() {
        seen.insert(EXTERNAL_GROUP.to_string());
    }
    for deployment in &lab.ipa_deployments {
        let name = &deployment.name;
        if *name == lab.lab_name || !seen.insert(deployment_group_name(name)) {
            return Err(LabError::DuplicateDeployment(name.clone()));
        }
    }
    Ok(())
}

/// インベントリを生成
///
/// `ctx` には compose フェーズで確定したデプロイメント情報が入っていること。
pub fn gen_inventory(lab: &LabModel, ctx: &GenerationContext) -> Result<InventoryDocument> {
    let lab_nameserver = ctx.lab_nameserver().is_some() || lab.dns.is_some();

    let mut children = BTreeMap::new();
    for (index, deployment) in lab.ipa_deployments.iter().enumerate() {
        let facts = ctx
            .deployments()
            .get(index)
            .filter(|facts| facts.name == deployment.name);
        let group = DeploymentInventory {
            lab,
            deployment,
            facts,
            lab_nameserver,
        }
        .build()?;
        debug!(deployment = %deployment.name, "Built deployment inventory");
        children.insert(deployment_group_name(&deployment.name), group);
    }
    check_deployment_names(lab)?;

    if let Some(external) = external_group(lab) {
        children.insert(EXTERNAL_GROUP.to_string(), external);
    }

    let lab_group = InventoryGroup {
        children,
        ..Default::default()
    };
    let mut groups = BTreeMap::new();
    if !lab_group.is_empty() {
        groups.insert(lab_group_name(&lab.lab_name), lab_group);
    }
    Ok(InventoryDocument { groups })
}
