//! 生成パイプライン
//!
//! compose → inventory → 補助ファイルの順に、1回分の生成を
//! 新しい [`GenerationContext`] で実行する。

use crate::compose::{ComposeDocument, gen_compose};
use crate::context::{Artifact, GenerationContext};
use crate::error::Result;
use crate::inventory::{InventoryDocument, gen_inventory};
use crate::model::LabModel;
use crate::node::log_dir;
use crate::resources::{DEFAULT_HELPERS, helper_dir};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// 依存する Ansible コレクション
const REQUIRED_COLLECTIONS: [&str; 2] = ["containers.podman", "freeipa.ansible_freeipa"];

#[derive(Debug, Serialize)]
struct Requirements {
    collections: Vec<Collection>,
}

#[derive(Debug, Serialize)]
struct Collection {
    name: &'static str,
}

/// 1回の生成結果
#[derive(Debug, Clone, PartialEq)]
pub struct LabOutput {
    pub compose: ComposeDocument,
    pub inventory: InventoryDocument,
    /// /etc/hosts に追記する内容
    pub hosts: String,
    /// 出力ディレクトリに展開するファイル（書き出し順）
    pub artifacts: Vec<Artifact>,
}

impl LabOutput {
    pub fn compose_yaml(&self) -> Result<String> {
        self.compose.to_yaml()
    }

    pub fn inventory_yaml(&self) -> Result<String> {
        self.inventory.to_yaml()
    }

    pub fn requirements_yaml(&self) -> Result<String> {
        requirements_yaml()
    }
}

/// requirements.yml の内容
pub fn requirements_yaml() -> Result<String> {
    let requirements = Requirements {
        collections: REQUIRED_COLLECTIONS
            .iter()
            .map(|&name| Collection { name })
            .collect(),
    };
    Ok(serde_yaml::to_string(&requirements)?)
}

/// hosts ファイルの内容（FQDN順）
fn hosts_file(lab_name: &str, ctx: &GenerationContext) -> String {
    let lines: String = ctx
        .nodes()
        .iter()
        .map(|(hostname, address)| format!("{:<18}{}\n", address.to_string(), hostname))
        .collect();
    format!("\n# ipalab-config hosts for '{}'\n{}", lab_name, lines)
}

/// ラボ定義から全成果物を生成
///
/// `config_dir` はラボ記述ファイルのディレクトリで、`containerfiles` や
/// `extra_data` の相対パスはここを基準に解決される。
#[instrument(skip(lab, config_dir), fields(lab = %lab.lab_name))]
pub fn generate(lab: &LabModel, config_dir: &Path) -> Result<LabOutput> {
    let mut ctx = GenerationContext::new(config_dir);

    let compose = gen_compose(lab, &mut ctx)?;
    debug!(
        services = compose.services.len(),
        networks = compose.networks.len(),
        "Compose document generated"
    );
    let inventory = gen_inventory(lab, &ctx)?;
    let hosts = hosts_file(&lab.lab_name, &ctx);

    let mut artifacts: Vec<Artifact> = DEFAULT_HELPERS
        .iter()
        .map(|name| Artifact::Helper(name.to_string()))
        .collect();
    for containerfile in &lab.containerfiles {
        artifacts.push(Artifact::Copy {
            source: config_dir.join(containerfile),
            dest_dir: PathBuf::from("containerfiles"),
        });
    }
    for entry in &lab.extra_data {
        if helper_dir(entry).is_some() {
            artifacts.push(Artifact::Helper(entry.trim_end_matches('/').to_string()));
        } else {
            artifacts.push(Artifact::Copy {
                source: config_dir.join(entry),
                dest_dir: PathBuf::from("."),
            });
        }
    }
    artifacts.extend(compose.services.values().filter_map(log_dir).map(Artifact::Directory));
    artifacts.extend(ctx.into_artifacts());

    info!(
        services = compose.services.len(),
        artifacts = artifacts.len(),
        "Lab generated"
    );
    Ok(LabOutput {
        compose,
        inventory,
        hosts,
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_lab;

    #[test]
    fn test_requirements_yaml() {
        assert_eq!(
            requirements_yaml().unwrap(),
            "collections:\n- name: containers.podman\n- name: freeipa.ansible_freeipa\n"
        );
    }

    #[test]
    fn test_hosts_file() {
        let lab = parse_lab(
            r#"
lab_name: demo
subnet: 10.0.0.0/24
ipa_deployments:
  - name: d1
    domain: d1.test
    cluster:
      servers: [{name: s1}]
      clients: [{name: a}]
"#,
        )
        .unwrap();
        let output = generate(&lab, Path::new(".")).unwrap();
        assert_eq!(
            output.hosts,
            "\n# ipalab-config hosts for 'demo'\n\
             10.0.0.3          a.d1.test\n\
             10.0.0.2          s1.d1.test\n"
        );
    }

    #[test]
    fn test_artifacts() {
        let lab = parse_lab(
            r#"
mount_varlog: true
containerfiles: [custom/rocky]
extra_data: [unbound, data/ldif]
ipa_deployments:
  - name: d1
    cluster:
      servers: [{name: s1}]
      clients: [{name: c1, nolog: true}]
"#,
        )
        .unwrap();
        let output = generate(&lab, Path::new("/labs")).unwrap();
        assert_eq!(
            output.artifacts,
            vec![
                Artifact::Helper("containerfiles".to_string()),
                Artifact::Helper("playbooks".to_string()),
                Artifact::Copy {
                    source: "/labs/custom/rocky".into(),
                    dest_dir: "containerfiles".into(),
                },
                Artifact::Helper("unbound".to_string()),
                Artifact::Copy {
                    source: "/labs/data/ldif".into(),
                    dest_dir: ".".into(),
                },
                Artifact::Directory("logs/s1".into()),
            ]
        );
    }
}
