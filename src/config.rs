use anyhow::Result;
use claimguard_claims::{Permission, Permissions};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/claims.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClaimsConfig {
    /// Directory holding `claims.dat`.
    pub store_dir: PathBuf,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Permission names granted to everyone on newly created claims.
    pub default_permissions: Vec<String>,
    /// Accept imports that only carry the legacy nested claim tree.
    pub migrate_legacy: bool,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("world"),
            log_filter: "warn".to_string(),
            default_permissions: Vec::new(),
            migrate_legacy: true,
        }
    }
}

impl ClaimsConfig {
    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ClaimsConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    ClaimsConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                ClaimsConfig::default()
            }
        }
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }

    /// Parsed `default_permissions`; unknown names are skipped with a warning.
    pub fn permissions(&self) -> Permissions {
        self.default_permissions
            .iter()
            .filter_map(|name| match name.parse::<Permission>() {
                Ok(permission) => Some(permission),
                Err(err) => {
                    warn!("Ignoring default permission: {err}");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ClaimsConfig::load_from_path(&dir.path().join("absent.toml"));
        assert_eq!(cfg, ClaimsConfig::default());
        assert!(cfg.permissions().is_empty());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.toml");
        fs::write(
            &path,
            "store_dir = \"/srv/world\"\ndefault_permissions = [\"door_interact\", \"bogus\", \"Interact\"]\n",
        )
        .unwrap();

        let cfg = ClaimsConfig::load_from_path(&path);
        assert_eq!(cfg.store_dir, PathBuf::from("/srv/world"));
        assert_eq!(cfg.log_filter, "warn");
        assert!(cfg.migrate_legacy);
        assert_eq!(
            cfg.permissions(),
            Permissions::DOOR_INTERACT | Permissions::INTERACT
        );
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.toml");
        fs::write(&path, "store_dir = [").unwrap();
        assert_eq!(ClaimsConfig::load_from_path(&path), ClaimsConfig::default());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("claims.toml");
        let cfg = ClaimsConfig {
            store_dir: PathBuf::from("saves/alpha"),
            log_filter: "claimguard_claims=debug".into(),
            default_permissions: vec!["block_break".into()],
            migrate_legacy: false,
        };
        cfg.save_to_path(&path).unwrap();
        assert_eq!(ClaimsConfig::load_from_path(&path), cfg);
    }
}
