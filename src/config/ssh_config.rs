//! SSH Config Generator
//!
//! Renders the saved SSH profiles as `~/.ssh/config` host blocks so the
//! plain `ssh <name>` command resolves them too. Rendering is pure; the
//! write path overwrites the target file and restricts it to the owner.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::model::SshProfile;
use super::store::StoreError;

/// Default private key offered during connects and referenced by generated
/// config blocks (`~/.ssh/id_ed25519`).
pub fn default_identity_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ssh").join("id_ed25519"))
}

/// The user's SSH client config (`~/.ssh/config`).
pub fn default_ssh_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ssh").join("config"))
}

/// Renders one `Host` block per profile, name order. The `User` line is
/// omitted for profiles without a username.
pub fn render(profiles: &BTreeMap<String, SshProfile>, identity_file: &Path) -> String {
    let mut lines = vec!["# Generated by hostlink".to_string(), String::new()];
    for (name, entry) in profiles {
        lines.push(format!("Host {}", name));
        lines.push(format!("    HostName {}", entry.host));
        if let Some(user) = &entry.user {
            lines.push(format!("    User {}", user));
        }
        lines.push(format!("    Port {}", entry.port));
        lines.push(format!("    IdentityFile {}", identity_file.display()));
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Writes rendered config to `path`, owner-only.
pub fn write(path: &Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
