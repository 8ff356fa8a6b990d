// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base directory for session workspaces.
    pub temp_dir: PathBuf,
    /// Files and session directories older than this are removed by the
    /// cleanup sweep.
    pub max_file_age_hours: u64,
    /// Advisory upload ceiling in megabytes; oversized uploads are logged,
    /// not rejected at the transformer layer.
    pub max_upload_mb: u64,
    /// Hard ceiling on a single URL fetch.
    pub fetch_timeout_secs: u64,
    /// Default paper size for rendered documents (URL conversion, zero-page
    /// watermark fallback).
    pub default_paper_size: crate::PaperSize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            max_file_age_hours: 24,
            max_upload_mb: 100,
            fetch_timeout_secs: 30,
            default_paper_size: crate::PaperSize::A4,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), raw)?;
        Ok(())
    }

    /// Advisory upload ceiling in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.max_file_age_hours, 24);
        assert_eq!(config.max_upload_mb, 100);
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn json_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: AppConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.temp_dir, config.temp_dir);
        assert_eq!(back.max_upload_mb, config.max_upload_mb);
    }
}
