// Per-symbol reconciliation watermark persisted across restarts

use crate::error::{BotError, BotResult};
use std::fs;
use std::path::PathBuf;

/// Durable record of the highest exchange trade id already reconciled for a
/// symbol. Stored in its own small file so a crash between cycles never loses
/// more than one batch (replays are absorbed by the ledger's idempotent
/// inserts).
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(dir: &str, symbol: &str) -> Self {
        let file = format!("{}_last_trade_id.txt", symbol.to_lowercase());
        Self {
            path: PathBuf::from(dir).join(file),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read the persisted watermark; a missing file means no trade has ever
    /// been reconciled and yields 0.
    pub fn load(&self) -> BotResult<i64> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => contents.trim().parse::<i64>().map_err(|e| {
                BotError::Persistence(format!(
                    "corrupt watermark file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(BotError::Io(e)),
        }
    }

    /// Persist a new watermark via write-to-temp-then-rename so a crash
    /// mid-write cannot leave a truncated file behind.
    pub fn store(&self, trade_id: i64) -> BotResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, trade_id.to_string())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_zero() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().to_str().unwrap(), "BTCUSDT");
        assert_eq!(store.load().unwrap(), 0);
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().to_str().unwrap(), "BTCUSDT");

        store.store(12345).unwrap();
        assert_eq!(store.load().unwrap(), 12345);

        store.store(67890).unwrap();
        assert_eq!(store.load().unwrap(), 67890);
    }

    #[test]
    fn test_file_name_is_symbol_scoped() {
        let dir = tempdir().unwrap();
        let btc = WatermarkStore::new(dir.path().to_str().unwrap(), "BTCUSDT");
        let sol = WatermarkStore::new(dir.path().to_str().unwrap(), "SOLUSDT");

        btc.store(1).unwrap();
        sol.store(2).unwrap();

        assert_eq!(btc.load().unwrap(), 1);
        assert_eq!(sol.load().unwrap(), 2);
        assert!(btc.path().ends_with("btcusdt_last_trade_id.txt"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().to_str().unwrap(), "BTCUSDT");

        fs::write(store.path(), "not-a-number").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().to_str().unwrap(), "BTCUSDT");

        store.store(99).unwrap();
        assert!(!store.path().with_extension("tmp").exists());
    }
}
