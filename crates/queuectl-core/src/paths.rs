use std::path::{Path, PathBuf};

pub const APP_DIRNAME: &str = ".queuectl";
pub const DB_FILENAME: &str = "queue.db";
pub const STOP_FLAG_FILENAME: &str = "stop.flag";

pub fn resolve_data_dir() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("QUEUECTL_HOME") {
        let dir = PathBuf::from(dir);
        if dir.as_os_str().is_empty() {
            anyhow::bail!("QUEUECTL_HOME is set but empty");
        }
        return Ok(dir);
    }

    let home = std::env::var_os("HOME").ok_or_else(|| anyhow::anyhow!("HOME is not set"))?;
    let home = PathBuf::from(home);
    if home.as_os_str().is_empty() {
        anyhow::bail!("HOME is set but empty");
    }
    Ok(home.join(APP_DIRNAME))
}

pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILENAME)
}

pub fn stop_flag_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STOP_FLAG_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_the_data_dir() {
        let dir = Path::new("/tmp/qdir");
        assert_eq!(db_path(dir), Path::new("/tmp/qdir/queue.db"));
        assert_eq!(stop_flag_path(dir), Path::new("/tmp/qdir/stop.flag"));
    }
}
