//! Operator configuration, layered from a TOML file and `FORMWORK_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Duration;
use formwork_core::service::ServicePolicy;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
  /// SQLite database file. A leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path:                    PathBuf,
  #[serde(default = "default_window_days")]
  pub submission_delete_window_days: i64,
}

fn default_store_path() -> PathBuf { PathBuf::from("formwork.db") }

fn default_window_days() -> i64 { 7 }

impl AdminConfig {
  /// Read `path` if it exists, then apply `FORMWORK_*` overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("FORMWORK"))
      .build()
      .context("failed to read config file")?;
    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise AdminConfig")?;
    if cfg.submission_delete_window_days < 0 {
      anyhow::bail!("submission_delete_window_days must not be negative");
    }
    Ok(cfg)
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn policy(&self) -> ServicePolicy {
    ServicePolicy {
      submission_delete_window: Duration::days(self.submission_delete_window_days),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let cfg = AdminConfig::load(Path::new("/nonexistent/formwork.toml")).unwrap();
    assert_eq!(cfg.submission_delete_window_days, 7);
    assert_eq!(cfg.policy().submission_delete_window, Duration::days(7));
  }

  #[test]
  fn absolute_paths_are_left_alone() {
    assert_eq!(expand_tilde(Path::new("/var/lib/formwork.db")), PathBuf::from("/var/lib/formwork.db"));
  }
}
