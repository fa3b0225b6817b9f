use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// How the transport authenticates. Opaque to everything except the channel
/// that hands it to `ssh`; never printed or serialized.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialRef {
    IdentityFile(PathBuf),
    /// Whatever the local ssh agent or default key files provide.
    Agent,
}

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialRef::IdentityFile(_) => f.write_str("IdentityFile(<redacted>)"),
            CredentialRef::Agent => f.write_str("Agent"),
        }
    }
}

impl Serialize for CredentialRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CredentialRef::IdentityFile(_) => serializer.serialize_str("identity_file"),
            CredentialRef::Agent => serializer.serialize_str("agent"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub credential: CredentialRef,
    pub remote_dir: Option<String>,
}

impl DeploymentTarget {
    pub fn address(&self) -> String {
        if self.user.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }

    pub fn is_local(&self) -> bool {
        is_local_host(&self.host)
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}
