//! Profile Data Model
//!
//! Typed representation of the profile document: two explicit maps (`ssh`,
//! `rdp`) of strongly-typed records. Documents written by older releases that
//! hold a bare name-to-record map (no `ssh`/`rdp` keys) still load, as an
//! all-SSH document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_ssh_port() -> u16 {
    22
}

fn default_rdp_port() -> u16 {
    3389
}

/// Which collection a profile lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Ssh,
    Rdp,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Ssh => "ssh",
            ProfileKind::Rdp => "rdp",
        }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(ProfileKind::Ssh),
            "rdp" => Ok(ProfileKind::Rdp),
            other => Err(format!("unknown profile kind: {other}")),
        }
    }
}

/// Saved SSH endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favorite: bool,
}

/// Saved RDP endpoint. `mac` enables wake-on-LAN before connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdpProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub host: String,
    #[serde(default = "default_rdp_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favorite: bool,
}

/// A profile of either kind, as handed to list/status/connect paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionProfile {
    Ssh(SshProfile),
    Rdp(RdpProfile),
}

impl ConnectionProfile {
    pub fn kind(&self) -> ProfileKind {
        match self {
            ConnectionProfile::Ssh(_) => ProfileKind::Ssh,
            ConnectionProfile::Rdp(_) => ProfileKind::Rdp,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ConnectionProfile::Ssh(p) => &p.host,
            ConnectionProfile::Rdp(p) => &p.host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            ConnectionProfile::Ssh(p) => p.port,
            ConnectionProfile::Rdp(p) => p.port,
        }
    }

    pub fn user(&self) -> Option<&str> {
        match self {
            ConnectionProfile::Ssh(p) => p.user.as_deref(),
            ConnectionProfile::Rdp(p) => p.user.as_deref(),
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            ConnectionProfile::Ssh(p) => &p.tags,
            ConnectionProfile::Rdp(p) => &p.tags,
        }
    }

    pub fn favorite(&self) -> bool {
        match self {
            ConnectionProfile::Ssh(p) => p.favorite,
            ConnectionProfile::Rdp(p) => p.favorite,
        }
    }
}

impl From<SshProfile> for ConnectionProfile {
    fn from(p: SshProfile) -> Self {
        ConnectionProfile::Ssh(p)
    }
}

impl From<RdpProfile> for ConnectionProfile {
    fn from(p: RdpProfile) -> Self {
        ConnectionProfile::Rdp(p)
    }
}

/// The full on-disk document. Name order is stable across round-trips.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileDocument {
    pub ssh: BTreeMap<String, SshProfile>,
    pub rdp: BTreeMap<String, RdpProfile>,
}

impl ProfileDocument {
    pub fn is_empty(&self) -> bool {
        self.ssh.is_empty() && self.rdp.is_empty()
    }

    pub fn contains(&self, kind: ProfileKind, name: &str) -> bool {
        match kind {
            ProfileKind::Ssh => self.ssh.contains_key(name),
            ProfileKind::Rdp => self.rdp.contains_key(name),
        }
    }

    pub fn get(&self, kind: ProfileKind, name: &str) -> Option<ConnectionProfile> {
        match kind {
            ProfileKind::Ssh => self.ssh.get(name).cloned().map(ConnectionProfile::Ssh),
            ProfileKind::Rdp => self.rdp.get(name).cloned().map(ConnectionProfile::Rdp),
        }
    }

    pub fn remove(&mut self, kind: ProfileKind, name: &str) -> Option<ConnectionProfile> {
        match kind {
            ProfileKind::Ssh => self.ssh.remove(name).map(ConnectionProfile::Ssh),
            ProfileKind::Rdp => self.rdp.remove(name).map(ConnectionProfile::Rdp),
        }
    }

    /// All profiles of both kinds, name order within each kind.
    pub fn iter_all(&self) -> impl Iterator<Item = (ProfileKind, &String, ConnectionProfile)> {
        let ssh = self
            .ssh
            .iter()
            .map(|(n, p)| (ProfileKind::Ssh, n, ConnectionProfile::Ssh(p.clone())));
        let rdp = self
            .rdp
            .iter()
            .map(|(n, p)| (ProfileKind::Rdp, n, ConnectionProfile::Rdp(p.clone())));
        ssh.chain(rdp)
    }
}

impl<'de> Deserialize<'de> for ProfileDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let value = serde_json::Value::deserialize(deserializer)?;
        let obj = match value {
            serde_json::Value::Object(map) => map,
            _ => return Err(D::Error::custom("profile document must be a JSON object")),
        };

        if obj.contains_key("ssh") || obj.contains_key("rdp") {
            let ssh = match obj.get("ssh") {
                Some(v) => serde_json::from_value(v.clone()).map_err(D::Error::custom)?,
                None => BTreeMap::new(),
            };
            let rdp = match obj.get("rdp") {
                Some(v) => serde_json::from_value(v.clone()).map_err(D::Error::custom)?,
                None => BTreeMap::new(),
            };
            return Ok(Self { ssh, rdp });
        }

        // Legacy layout: a bare name-to-record map, all SSH.
        let ssh = serde_json::from_value(serde_json::Value::Object(obj))
            .map_err(D::Error::custom)?;
        Ok(Self {
            ssh,
            rdp: BTreeMap::new(),
        })
    }
}
