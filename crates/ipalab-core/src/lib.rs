//! ipalab-core
//!
//! ラボ記述（YAML）から podman compose ファイルと Ansible インベントリを
//! 決定的に導出するコアライブラリ。ファイルへの書き出しは行わず、
//! 出力すべき成果物を [`Artifact`] として返す。

pub mod allocator;
pub mod compose;
pub mod context;
pub mod error;
pub mod inventory;
pub mod loader;
pub mod model;
pub mod naming;
pub mod network;
pub mod node;
pub mod pipeline;
pub mod resources;
pub mod roles;
pub mod template;

pub use allocator::{AddressAllocator, AllocatorCache, parse_subnet};
pub use compose::{ComposeAssembler, ComposeDocument, ComposeState, gen_compose};
pub use context::{Artifact, DeploymentFacts, GenerationContext};
pub use error::{LabError, Result};
pub use inventory::{InventoryDocument, InventoryGroup, gen_inventory};
pub use loader::{Overrides, apply_overrides, load_lab, parse_distro, parse_lab};
pub use model::*;
pub use naming::{
    deployment_group_name, ensure_fqdn, lab_group_name, resolve_container_name, resolve_hostname,
};
pub use pipeline::{LabOutput, generate, requirements_yaml};
pub use resources::{EmbeddedFile, helper_dir};
pub use roles::{RolePlugin, resolve_role};
