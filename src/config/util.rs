//! Configuration utility functions.

use std::path::{Path, PathBuf};

use super::ConfigError;

/// Find config file by searching upward from current directory
///
/// Starts from cwd and walks up parent directories until finding `config_name`.
///
/// ```text
/// /home/user/app/templates/greet/  ← cwd
/// /home/user/app/soyloader.toml    ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_file_from(&cwd, config_name)
}

pub(super) fn find_config_file_from(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Deserialize TOML, collecting any unknown keys and rejecting them.
pub(super) fn parse_strict<T>(content: &str) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned,
{
    let mut ignored = Vec::new();
    let deserializer = toml::Deserializer::new(content);
    let value = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
        ignored.push(path.to_string());
    })?;

    if ignored.is_empty() {
        Ok(value)
    } else {
        Err(ConfigError::UnknownKeys(ignored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("soyloader.toml"), "").unwrap();

        let found = find_config_file_from(&nested, Path::new("soyloader.toml"));
        assert_eq!(found, Some(dir.path().join("soyloader.toml")));
    }

    #[test]
    fn test_find_config_file_missing() {
        let dir = TempDir::new().unwrap();
        let found = find_config_file_from(dir.path(), Path::new("no-such-config-file.toml"));
        assert_eq!(found, None);
    }
}
