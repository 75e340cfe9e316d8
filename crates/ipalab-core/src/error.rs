use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabError {
    #[error("IO error: {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Cluster not defined for domain '{0}'")]
    MissingCluster(String),

    #[error("At least one server or client must be defined for '{0}'")]
    EmptyDeployment(String),

    #[error("Deployment names must be unique and differ from the lab name: '{0}'")]
    DuplicateDeployment(String),

    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),

    #[error("Invalid 'dns' value for network '{0}': must be false, an address, or a non-empty list of addresses")]
    InvalidNetworkDns(String),

    #[error("'subnet' is required for 'external' networks ('{0}')")]
    ExternalNetworkWithoutSubnet(String),

    #[error("Invalid subnet '{0}'")]
    InvalidSubnet(String),

    #[error("No more addresses available in subnet {0}")]
    AddressExhausted(String),

    #[error("Address {address} is already assigned in subnet {subnet}")]
    DuplicateAddress { address: Ipv4Addr, subnet: String },

    #[error("Address {address} is not usable in subnet {subnet}")]
    AddressOutsideSubnet { address: Ipv4Addr, subnet: String },

    #[error("Invalid role: '{0}'")]
    InvalidRole(String),

    #[error("Invalid options for role '{role}': {message}")]
    InvalidRoleOptions { role: String, message: String },

    #[error("Nameserver '{0}' does not match any node in the lab")]
    UnresolvedNameserver(String),

    #[error("Invalid distro '{0}': expected DISTRO or DISTRO:TAG")]
    InvalidDistro(String),
}

impl LabError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        LabError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LabError>;
