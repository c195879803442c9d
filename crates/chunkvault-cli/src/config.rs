use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chunkvault_list::ListConfig;
use chunkvault_store::FileStoreConfig;
use chunkvault_types::RecordId;
use serde::{Deserialize, Serialize};

/// Record log used when neither `--store` nor the config file names one.
pub const DEFAULT_STORE_PATH: &str = "chunkvault.log";

/// List operated on when neither `--list` nor the config file names one.
pub const DEFAULT_LIST_ID: RecordId = RecordId::from_u128(1);

/// Settings read from the optional `--config` TOML file.
///
/// ```toml
/// store_path = "data/items.log"
/// list_id = "01890a5d-ac96-774b-bcce-b302099a8057"
///
/// [list]
/// chunk_size = 500
///
/// [store]
/// sync_mode = "EveryWrite"
/// auto_compact_bytes = 1048576
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub store_path: Option<PathBuf>,
    pub list_id: Option<RecordId>,
    pub list: ListConfig,
    pub store: FileStoreConfig,
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        config.list.validate()?;
        Ok(config)
    }

    /// Store path, preferring the command-line value.
    pub fn resolve_store_path(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.store_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }

    /// List id, preferring the command-line value.
    pub fn resolve_list_id(&self, flag: Option<RecordId>) -> RecordId {
        flag.or(self.list_id).unwrap_or(DEFAULT_LIST_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkvault_store::SyncMode;

    #[test]
    fn defaults_when_file_is_empty() {
        let config: CliConfig = toml::from_str("").unwrap();
        assert_eq!(config.list.chunk_size, 1000);
        assert!(config.store.auto_compact_bytes.is_none());
        assert_eq!(config.resolve_store_path(None), PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.resolve_list_id(None), DEFAULT_LIST_ID);
    }

    #[test]
    fn full_file_is_parsed() {
        let config: CliConfig = toml::from_str(
            r#"
            store_path = "data/items.log"
            list_id = "01890a5d-ac96-774b-bcce-b302099a8057"

            [list]
            chunk_size = 500

            [store]
            sync_mode = "EveryWrite"
            auto_compact_bytes = 4096
            "#,
        )
        .unwrap();
        assert_eq!(config.list.chunk_size, 500);
        assert!(matches!(config.store.sync_mode, SyncMode::EveryWrite));
        assert_eq!(config.store.auto_compact_bytes, Some(4096));
        assert_eq!(
            config.resolve_list_id(None).to_string(),
            "01890a5d-ac96-774b-bcce-b302099a8057"
        );
    }

    #[test]
    fn flags_override_file() {
        let config = CliConfig {
            store_path: Some("from-file.log".into()),
            list_id: Some(RecordId::from_u128(7)),
            ..CliConfig::default()
        };
        let flag_id = RecordId::from_u128(9);
        assert_eq!(
            config.resolve_store_path(Some("flag.log".into())),
            PathBuf::from("flag.log")
        );
        assert_eq!(config.resolve_list_id(Some(flag_id)), flag_id);
        assert_eq!(config.resolve_store_path(None), PathBuf::from("from-file.log"));
    }

    #[test]
    fn zero_chunk_size_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunkvault.toml");
        fs::write(&path, "[list]\nchunk_size = 0\n").unwrap();
        assert!(CliConfig::load(&path).is_err());
    }
}
