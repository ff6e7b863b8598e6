use lore_protocol::PROTOCOL_VERSION;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Discovery record written by the daemon so local clients can find and
/// authenticate against it without any configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonMetadata {
    pub port: u16,
    pub secret: String,
    pub pid: u32,
    pub schema_version: u32,
    pub created_at: OffsetDateTime,
}

impl DaemonMetadata {
    pub fn new(port: u16, secret: String, pid: u32) -> Self {
        Self {
            port,
            secret,
            pid,
            schema_version: PROTOCOL_VERSION,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut file = fs::File::open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let meta = serde_json::from_slice(&buf)?;
        Ok(meta)
    }

    pub fn write_atomic(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            let data = serde_json::to_vec_pretty(self)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    pub fn is_compatible(&self) -> bool {
        self.schema_version == PROTOCOL_VERSION
    }
}

/// `<local data dir>/lore/daemon.json`, falling back to the current
/// directory when the platform has no data dir.
pub fn default_metadata_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lore")
        .join("daemon.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_metadata_roundtrip() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("nested").join("daemon.json");

        let metadata = DaemonMetadata::new(43210, "secret".to_string(), 1234);
        metadata.write_atomic(&path).expect("write");

        let loaded = DaemonMetadata::load(&path).expect("load");
        assert_eq!(loaded.port, 43210);
        assert_eq!(loaded.secret, "secret");
        assert_eq!(loaded.schema_version, PROTOCOL_VERSION);
        assert!(loaded.is_compatible());
    }

    #[test]
    fn test_incompatible_version_detected() {
        let mut metadata = DaemonMetadata::new(1, "s".to_string(), 1);
        metadata.schema_version = PROTOCOL_VERSION + 1;
        assert!(!metadata.is_compatible());
    }

    #[test]
    fn test_write_replaces_existing() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("daemon.json");

        DaemonMetadata::new(1, "old".to_string(), 1)
            .write_atomic(&path)
            .expect("write old");
        DaemonMetadata::new(2, "new".to_string(), 2)
            .write_atomic(&path)
            .expect("write new");

        let loaded = DaemonMetadata::load(&path).expect("load");
        assert_eq!(loaded.port, 2);
        assert_eq!(loaded.secret, "new");
    }
}
