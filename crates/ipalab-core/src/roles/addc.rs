//! Samba AD DC ノード

use super::{RoleBase, RoleInput, RolePlugin};
use crate::context::{Artifact, GenerationContext};
use crate::error::Result;
use crate::model::{BuildConfig, ServiceRecord};
use crate::resources::DEPLOY_ADDC_PLAYBOOK;

#[derive(Debug, Clone, Copy, Default)]
pub struct AddcRole;

impl RolePlugin for AddcRole {
    fn name(&self) -> &'static str {
        "addc"
    }

    fn base_config(&self) -> Option<RoleBase> {
        Some(RoleBase {
            image: "localhost/samba-addc".to_string(),
            build: Some(
                BuildConfig::new("containerfiles", "external-nodes").with_arg("packages", "systemd"),
            ),
            command: Some("/usr/sbin/init".to_string()),
            ..Default::default()
        })
    }

    fn gen_config(
        &self,
        _input: &RoleInput<'_>,
        _node: &mut ServiceRecord,
        ctx: &mut GenerationContext,
    ) -> Result<()> {
        ctx.push_artifact(Artifact::file(
            "playbooks/deploy_addc.yml",
            DEPLOY_ADDC_PLAYBOOK,
        ));
        Ok(())
    }
}
