//! Unbound ネームサーバー（`dns` ロール）

use super::{RoleBase, RoleInput, RolePlugin};
use crate::context::{Artifact, GenerationContext};
use crate::error::{LabError, Result};
use crate::model::{BuildConfig, ServiceRecord};
use crate::template::TemplateProcessor;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::debug;

const ROLE: &str = "dns";

const ZONES_TEMPLATE: &str = "\
{% for zone in zones %}{% if not loop.first %}
{% endif %}auth-zone:
    name: {{ zone.name }}
    zonefile: /etc/unbound/zones/{{ zone.filename }}
    for-downstream: yes
    for-upstream: no
{% endfor %}";

#[derive(Debug, Default, Deserialize)]
struct UnboundOptions {
    #[serde(default)]
    zones: Vec<ZoneOption>,
}

/// `name`（正引き）または `reverse_ip`（逆引き）のどちらかを持つ
#[derive(Debug, Deserialize)]
struct ZoneOption {
    name: Option<String>,
    reverse_ip: Option<String>,
    file: String,
}

#[derive(Debug, Serialize)]
struct AuthZone {
    name: String,
    filename: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnboundRole;

impl RolePlugin for UnboundRole {
    fn name(&self) -> &'static str {
        ROLE
    }

    fn base_config(&self) -> Option<RoleBase> {
        Some(RoleBase {
            image: "localhost/unbound".to_string(),
            build: Some(BuildConfig::new("unbound", "Containerfile")),
            ..Default::default()
        })
    }

    fn gen_config(
        &self,
        input: &RoleInput<'_>,
        _node: &mut ServiceRecord,
        ctx: &mut GenerationContext,
    ) -> Result<()> {
        let options: UnboundOptions = input.options(ROLE)?;

        let mut domains = Vec::new();
        let mut networks = BTreeSet::from([input.subnet]);
        let mut zones = Vec::new();
        for zone in &options.zones {
            let name = match (&zone.name, &zone.reverse_ip) {
                (Some(name), _) => {
                    domains.push(name.clone());
                    name.clone()
                }
                (None, Some(reverse_ip)) => {
                    let network = parse_reverse_network(reverse_ip)?;
                    networks.insert(network);
                    reverse_zone_name(network.network())
                }
                (None, None) => {
                    return Err(LabError::InvalidRoleOptions {
                        role: ROLE.to_string(),
                        message: format!("zone '{}' needs 'name' or 'reverse_ip'", zone.file),
                    });
                }
            };
            let filename = Path::new(&zone.file)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| zone.file.clone());
            zones.push(AuthZone { name, filename });
        }

        let mut processor = TemplateProcessor::new();
        processor.insert("zones", &zones);
        ctx.push_artifact(Artifact::Helper("unbound".to_string()));
        ctx.push_artifact(Artifact::file(
            "unbound/zones.conf",
            processor.render_str(ZONES_TEMPLATE)?,
        ));
        ctx.push_artifact(Artifact::file(
            "unbound/domains",
            lines(domains.iter().map(|domain| format!("private-domain: {}", domain))),
        ));
        ctx.push_artifact(Artifact::file(
            "unbound/access_control",
            lines(
                networks
                    .iter()
                    .map(|network| format!("access-control: {} allow", network)),
            ),
        ));

        ctx.push_artifact(Artifact::Directory("unbound/zones".into()));
        for zone in &options.zones {
            let source = ctx.config_dir().join(&zone.file);
            ctx.push_artifact(Artifact::Copy {
                source,
                dest_dir: "unbound/zones".into(),
            });
        }

        debug!(zones = zones.len(), networks = networks.len(), "Generated unbound configuration");
        Ok(())
    }

    fn is_nameserver(&self) -> bool {
        true
    }
}

/// "a.b.c.d/nn" または "a.b.c.d"（/32 扱い）
fn parse_reverse_network(value: &str) -> Result<Ipv4Net> {
    if let Ok(network) = value.parse::<Ipv4Net>() {
        return Ok(network.trunc());
    }
    value
        .parse::<Ipv4Addr>()
        .ok()
        .and_then(|address| Ipv4Net::new(address, 32).ok())
        .ok_or_else(|| LabError::InvalidSubnet(value.to_string()))
}

/// ネットワークアドレスの逆引き名から先頭ラベルを落とした名前
fn reverse_zone_name(network: Ipv4Addr) -> String {
    let [a, b, c, _] = network.octets();
    format!("{}.{}.{}.in-addr.arpa", c, b, a)
}

fn lines(items: impl Iterator<Item = String>) -> String {
    items.map(|line| line + "\n").collect()
}
