//! Registry Operations
//!
//! The add/edit/remove/list layer over [`ProfileStore`]. Input is validated
//! before any document mutation; `add` refuses to overwrite an existing
//! name; `edit` touches only the mutable fields (tags, favorite, MAC).

use crate::validate::{self, ValidationError};

use super::model::{ConnectionProfile, ProfileKind, RdpProfile, SshProfile};
use super::store::{ProfileStore, StoreError};

/// One listing row, already resolved to a concrete profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRow {
    pub name: String,
    pub kind: ProfileKind,
    pub profile: ConnectionProfile,
}

/// Listing filter. `text` matches name or host (case-insensitive substring),
/// `tag` matches a tag exactly (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub text: Option<String>,
    pub tag: Option<String>,
}

impl ListFilter {
    fn matches(&self, row: &ProfileRow) -> bool {
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let hit = row.name.to_lowercase().contains(&needle)
                || row.profile.host().to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            let hit = row
                .profile
                .tags()
                .iter()
                .any(|t| t.eq_ignore_ascii_case(tag));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Field changes applied by `edit`. Host, user and port are fixed at
/// creation; only classification fields move afterwards.
#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub tags: Option<Vec<String>>,
    pub favorite: Option<bool>,
    /// `Some(None)` clears the MAC, `Some(Some(..))` replaces it.
    pub mac: Option<Option<String>>,
}

fn validate_profile(profile: &ConnectionProfile) -> Result<(), ValidationError> {
    validate::validate_hostname(profile.host())?;
    validate::validate_port(profile.port())?;
    if let ConnectionProfile::Rdp(rdp) = profile {
        if let Some(mac) = &rdp.mac {
            validate::parse_mac(mac)?;
        }
    }
    Ok(())
}

/// Adds a new SSH profile. Fails on an existing name or invalid target.
pub fn add_ssh(store: &ProfileStore, name: &str, profile: SshProfile) -> Result<(), StoreError> {
    add(store, name, ConnectionProfile::Ssh(profile))
}

/// Adds a new RDP profile. Fails on an existing name or invalid target.
pub fn add_rdp(store: &ProfileStore, name: &str, profile: RdpProfile) -> Result<(), StoreError> {
    add(store, name, ConnectionProfile::Rdp(profile))
}

fn add(store: &ProfileStore, name: &str, profile: ConnectionProfile) -> Result<(), StoreError> {
    validate_profile(&profile)?;
    let kind = profile.kind();
    store.update(|doc| {
        if doc.contains(kind, name) {
            return Err(StoreError::AlreadyExists {
                kind,
                name: name.to_string(),
            });
        }
        match profile {
            ConnectionProfile::Ssh(p) => {
                doc.ssh.insert(name.to_string(), p);
            }
            ConnectionProfile::Rdp(p) => {
                doc.rdp.insert(name.to_string(), p);
            }
        }
        Ok(())
    })
}

/// Applies an [`EditRequest`] to an existing profile.
pub fn edit(
    store: &ProfileStore,
    kind: ProfileKind,
    name: &str,
    changes: EditRequest,
) -> Result<(), StoreError> {
    if let Some(Some(mac)) = &changes.mac {
        validate::parse_mac(mac)?;
    }
    if changes.mac.is_some() && kind != ProfileKind::Rdp {
        return Err(StoreError::Validation(ValidationError::Mac(
            "only RDP profiles carry a MAC address".to_string(),
        )));
    }

    store.update(|doc| {
        let not_found = || StoreError::NotFound {
            kind,
            name: name.to_string(),
        };
        match kind {
            ProfileKind::Ssh => {
                let p = doc.ssh.get_mut(name).ok_or_else(not_found)?;
                if let Some(tags) = changes.tags {
                    p.tags = tags;
                }
                if let Some(favorite) = changes.favorite {
                    p.favorite = favorite;
                }
            }
            ProfileKind::Rdp => {
                let p = doc.rdp.get_mut(name).ok_or_else(not_found)?;
                if let Some(tags) = changes.tags {
                    p.tags = tags;
                }
                if let Some(favorite) = changes.favorite {
                    p.favorite = favorite;
                }
                if let Some(mac) = changes.mac {
                    p.mac = mac;
                }
            }
        }
        Ok(())
    })
}

/// Removes one profile by kind and name.
pub fn remove(store: &ProfileStore, kind: ProfileKind, name: &str) -> Result<(), StoreError> {
    store.delete(kind, name)
}

/// Lists profiles, favorites first, then case-insensitive name order.
/// `kind = None` lists both collections (SSH before RDP).
pub fn list(
    store: &ProfileStore,
    kind: Option<ProfileKind>,
    filter: &ListFilter,
) -> Result<Vec<ProfileRow>, StoreError> {
    let doc = store.load()?;
    let mut rows: Vec<ProfileRow> = doc
        .iter_all()
        .filter(|(k, _, _)| kind.map_or(true, |want| *k == want))
        .map(|(k, name, profile)| ProfileRow {
            name: name.clone(),
            kind: k,
            profile,
        })
        .filter(|row| filter.matches(row))
        .collect();
    sort_rows(&mut rows);
    Ok(rows)
}

/// The dashboard strip: up to `per_kind` favorites of each kind.
pub fn favorites(store: &ProfileStore, per_kind: usize) -> Result<Vec<ProfileRow>, StoreError> {
    let all = list(store, None, &ListFilter::default())?;
    let mut ssh_left = per_kind;
    let mut rdp_left = per_kind;
    Ok(all
        .into_iter()
        .filter(|row| row.profile.favorite())
        .filter(|row| match row.kind {
            ProfileKind::Ssh => {
                if ssh_left == 0 {
                    false
                } else {
                    ssh_left -= 1;
                    true
                }
            }
            ProfileKind::Rdp => {
                if rdp_left == 0 {
                    false
                } else {
                    rdp_left -= 1;
                    true
                }
            }
        })
        .collect())
}

fn sort_rows(rows: &mut [ProfileRow]) {
    rows.sort_by(|a, b| {
        b.profile
            .favorite()
            .cmp(&a.profile.favorite())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ssh(host: &str, favorite: bool, tags: &[&str]) -> SshProfile {
        SshProfile {
            user: Some("ops".to_string()),
            host: host.to_string(),
            port: 22,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            favorite,
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> ProfileStore {
        ProfileStore::with_path(dir.path().join("profiles.json"))
    }

    #[test]
    fn add_then_list_shows_exactly_one_entry() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        add_ssh(&store, "lab1", ssh("10.0.0.5", false, &[])).unwrap();

        let rows = list(&store, Some(ProfileKind::Ssh), &ListFilter::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "lab1");
        assert_eq!(rows[0].kind, ProfileKind::Ssh);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        add_ssh(&store, "lab1", ssh("10.0.0.5", false, &[])).unwrap();

        let err = add_ssh(&store, "lab1", ssh("10.0.0.6", false, &[])).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        // First profile untouched.
        let got = store.get_one(ProfileKind::Ssh, "lab1").unwrap();
        assert_eq!(got.host(), "10.0.0.5");
    }

    #[test]
    fn same_name_in_both_kinds_is_allowed() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        add_ssh(&store, "box", ssh("10.0.0.5", false, &[])).unwrap();
        add_rdp(
            &store,
            "box",
            RdpProfile {
                user: None,
                host: "10.0.0.5".to_string(),
                port: 3389,
                mac: None,
                tags: vec![],
                favorite: false,
            },
        )
        .unwrap();

        assert!(store.get_one(ProfileKind::Ssh, "box").is_ok());
        assert!(store.get_one(ProfileKind::Rdp, "box").is_ok());
    }

    #[test]
    fn injection_host_is_rejected_before_any_write() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let err = add_ssh(&store, "evil", ssh("10.0.0.5; rm -rf /", false, &[])).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(!store.path().exists());
    }

    #[test]
    fn bad_rdp_mac_is_rejected_on_add() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let err = add_rdp(
            &store,
            "desk",
            RdpProfile {
                user: None,
                host: "desk.local".to_string(),
                port: 3389,
                mac: Some("not-a-mac".to_string()),
                tags: vec![],
                favorite: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn edit_touches_only_classification_fields() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        add_ssh(&store, "lab1", ssh("10.0.0.5", false, &["old"])).unwrap();

        edit(
            &store,
            ProfileKind::Ssh,
            "lab1",
            EditRequest {
                tags: Some(vec!["prod".to_string(), "eu".to_string()]),
                favorite: Some(true),
                mac: None,
            },
        )
        .unwrap();

        let got = store.get_one(ProfileKind::Ssh, "lab1").unwrap();
        assert_eq!(got.tags(), ["prod".to_string(), "eu".to_string()]);
        assert!(got.favorite());
        assert_eq!(got.host(), "10.0.0.5");
    }

    #[test]
    fn mac_edit_on_ssh_profile_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        add_ssh(&store, "lab1", ssh("10.0.0.5", false, &[])).unwrap();

        let err = edit(
            &store,
            ProfileKind::Ssh,
            "lab1",
            EditRequest {
                mac: Some(Some("AA:BB:CC:DD:EE:FF".to_string())),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn edit_missing_profile_is_not_found() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let err = edit(&store, ProfileKind::Ssh, "ghost", EditRequest::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn listing_sorts_favorites_first_then_name() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        add_ssh(&store, "zeta", ssh("h1", true, &[])).unwrap();
        add_ssh(&store, "Alpha", ssh("h2", false, &[])).unwrap();
        add_ssh(&store, "beta", ssh("h3", true, &[])).unwrap();

        let rows = list(&store, Some(ProfileKind::Ssh), &ListFilter::default()).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["beta", "zeta", "Alpha"]);
    }

    #[test]
    fn filters_match_text_and_tag() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        add_ssh(&store, "web1", ssh("10.0.0.5", false, &["prod"])).unwrap();
        add_ssh(&store, "db1", ssh("10.0.0.6", false, &["staging"])).unwrap();

        let by_text = list(
            &store,
            None,
            &ListFilter {
                text: Some("WEB".to_string()),
                tag: None,
            },
        )
        .unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].name, "web1");

        let by_tag = list(
            &store,
            None,
            &ListFilter {
                text: None,
                tag: Some("Staging".to_string()),
            },
        )
        .unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].name, "db1");
    }

    #[test]
    fn favorites_caps_each_kind() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        for i in 0..5 {
            add_ssh(&store, &format!("s{i}"), ssh("h", true, &[])).unwrap();
        }
        let rows = favorites(&store, 3).unwrap();
        assert_eq!(rows.len(), 3);
    }
}
