//! Keycloak ノード

use super::{RoleBase, RoleInput, RolePlugin};
use crate::context::{Artifact, GenerationContext};
use crate::error::Result;
use crate::model::{BuildConfig, ServiceRecord};
use crate::template::TemplateProcessor;
use serde::Deserialize;

const ROLE: &str = "keycloak";

const CONFIG_TEMPLATE: &str = r#"ADMIN="{{ admin_username }}"
PASSWORD="{{ admin_password }}"
OIDCPASSWORD="{{ oidc_password }}"
KEYCLOAK="{{ hostname }}"
KEYCLOAK_CONTAINER="{{ container_name }}"

KEYCLOAK_URL="https://${KEYCLOAK}:8443"
TRUSTPASSWORD="password"
"#;

#[derive(Debug, Deserialize)]
struct KeycloakOptions {
    #[serde(default = "default_admin_username")]
    admin_username: String,
    #[serde(default = "default_password")]
    admin_password: String,
    #[serde(default = "default_password")]
    oidc_password: String,
    /// ノードのホスト名を上書き
    #[serde(default)]
    hostname: Option<String>,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "secret123".to_string()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeycloakRole;

impl RolePlugin for KeycloakRole {
    fn name(&self) -> &'static str {
        ROLE
    }

    fn base_config(&self) -> Option<RoleBase> {
        Some(RoleBase {
            image: "localhost/keycloak".to_string(),
            build: Some(BuildConfig::new("keycloak", "Containerfile")),
            entrypoint: Some("/opt/keycloak/bin/kc.sh start".to_string()),
            ..Default::default()
        })
    }

    fn gen_config(
        &self,
        input: &RoleInput<'_>,
        node: &mut ServiceRecord,
        ctx: &mut GenerationContext,
    ) -> Result<()> {
        let options: KeycloakOptions = input.options(ROLE)?;
        let hostname = options
            .hostname
            .clone()
            .unwrap_or_else(|| node.hostname.clone());

        node.environment.insert(
            "KC_BOOTSTRAP_ADMIN_USERNAME".to_string(),
            options.admin_username.clone(),
        );
        node.environment.insert(
            "KC_BOOTSTRAP_ADMIN_PASSWORD".to_string(),
            options.admin_password.clone(),
        );
        node.environment
            .insert("KC_HOSTNAME".to_string(), hostname.clone());
        if let Some(build) = node.build.as_mut() {
            build.args.insert("hostname".to_string(), hostname.clone());
        }

        let mut processor = TemplateProcessor::new();
        processor.insert("admin_username", &options.admin_username);
        processor.insert("admin_password", &options.admin_password);
        processor.insert("oidc_password", &options.oidc_password);
        processor.insert("hostname", &hostname);
        processor.insert("container_name", &node.container_name);

        ctx.push_artifact(Artifact::Helper("keycloak".to_string()));
        ctx.push_artifact(Artifact::file(
            "keycloak/keycloak_config.sh",
            processor.render_str(CONFIG_TEMPLATE)?,
        ));
        Ok(())
    }
}
