//! 外部ノードのロール
//!
//! ロール名から実装を引く静的レジストリ。各ロールは基本設定
//! （イメージ・ビルド・環境変数など）と、設定ファイルを成果物として
//! 出力するフックを持つ。

mod addc;
mod keycloak;
mod unbound;

pub use addc::AddcRole;
pub use keycloak::KeycloakRole;
pub use unbound::UnboundRole;

use crate::context::GenerationContext;
use crate::error::{LabError, Result};
use crate::model::{BuildConfig, ExternalNode, LabModel, ServiceRecord};
use ipnet::Ipv4Net;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// ロールがノードへ与える基本設定
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleBase {
    pub image: String,
    pub build: Option<BuildConfig>,
    pub command: Option<String>,
    pub entrypoint: Option<String>,
    pub environment: BTreeMap<String, String>,
}

/// ロールのフックに渡される入力
#[derive(Debug, Clone, Copy)]
pub struct RoleInput<'a> {
    pub lab: &'a LabModel,
    /// ノードが接続するネットワークのサブネット
    pub subnet: Ipv4Net,
    pub options: &'a Mapping,
}

impl RoleInput<'_> {
    /// オプションを型付きで取り出す
    pub fn options<T: DeserializeOwned>(&self, role: &str) -> Result<T> {
        serde_yaml::from_value(Value::Mapping(self.options.clone())).map_err(|e| {
            LabError::InvalidRoleOptions {
                role: role.to_string(),
                message: e.to_string(),
            }
        })
    }
}

/// 外部ノードのロール実装
pub trait RolePlugin: Sync {
    fn name(&self) -> &'static str;

    fn base_config(&self) -> Option<RoleBase> {
        None
    }

    /// ノード設定の更新と成果物の出力
    fn gen_config(
        &self,
        _input: &RoleInput<'_>,
        _node: &mut ServiceRecord,
        _ctx: &mut GenerationContext,
    ) -> Result<()> {
        Ok(())
    }

    /// ラボ全体のネームサーバーになるロールか
    fn is_nameserver(&self) -> bool {
        false
    }
}

/// ロールなし
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRole;

impl RolePlugin for PlainRole {
    fn name(&self) -> &'static str {
        "none"
    }
}

static ROLES: &[&dyn RolePlugin] = &[&PlainRole, &UnboundRole, &AddcRole, &KeycloakRole];

/// ロール名から実装を解決（大文字小文字は区別しない）
pub fn resolve_role(name: &str) -> Result<&'static dyn RolePlugin> {
    ROLES
        .iter()
        .copied()
        .find(|role| role.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| LabError::InvalidRole(name.to_string()))
}

/// ロールの基本設定をノードへマージし、フックを実行する
///
/// ユーザーが明示したイメージはロールの設定で上書きしない。
pub fn apply_role(
    role: &dyn RolePlugin,
    input: &RoleInput<'_>,
    node: &mut ServiceRecord,
    user_image: bool,
    ctx: &mut GenerationContext,
) -> Result<()> {
    if let Some(base) = role.base_config() {
        merge_base(node, base, user_image);
    }
    role.gen_config(input, node, ctx)?;
    node.external_node = Some(ExternalNode {
        role: role.name().to_string(),
        options: input.options.clone(),
    });
    debug!(node = %node.container_name, role = role.name(), "Applied role");
    Ok(())
}

fn merge_base(node: &mut ServiceRecord, base: RoleBase, user_image: bool) {
    if !user_image {
        node.image = base.image;
        node.build = base.build;
    }
    if node.command.is_none() {
        node.command = base.command;
    }
    if node.entrypoint.is_none() {
        node.entrypoint = base.entrypoint;
    }
    for (key, value) in base.environment {
        node.environment.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_role() {
        assert_eq!(resolve_role("dns").unwrap().name(), "dns");
        assert_eq!(resolve_role("DNS").unwrap().name(), "dns");
        assert_eq!(resolve_role("addc").unwrap().name(), "addc");
        assert_eq!(resolve_role("Keycloak").unwrap().name(), "keycloak");
        assert_eq!(resolve_role("none").unwrap().name(), "none");
        assert!(resolve_role("dns").unwrap().is_nameserver());
        assert!(!resolve_role("addc").unwrap().is_nameserver());

        let result = resolve_role("ldap");
        assert!(matches!(result, Err(LabError::InvalidRole(name)) if name == "ldap"));
    }

    #[test]
    fn test_merge_base_keeps_user_image() {
        let mut node = ServiceRecord {
            image: "quay.io/custom:1".to_string(),
            ..Default::default()
        };
        let base = AddcRole.base_config().unwrap();
        merge_base(&mut node, base, true);
        assert_eq!(node.image, "quay.io/custom:1");
        assert!(node.build.is_none());
        assert_eq!(node.command.as_deref(), Some("/usr/sbin/init"));
    }

    #[test]
    fn test_merge_base_replaces_default_image() {
        let mut node = ServiceRecord {
            image: "localhost/fedora:latest".to_string(),
            build: Some(BuildConfig::new("containerfiles", "fedora")),
            ..Default::default()
        };
        merge_base(&mut node, AddcRole.base_config().unwrap(), false);
        assert_eq!(node.image, "localhost/samba-addc");
        let build = node.build.unwrap();
        assert_eq!(build.dockerfile, "external-nodes");
        assert_eq!(build.args.get("packages").map(String::as_str), Some("systemd"));
    }
}
