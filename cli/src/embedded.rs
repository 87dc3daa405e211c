// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedded mode execution
//!
//! Every CLI command runs the question loop in-process against the
//! configured data directory.

use anyhow::{Context, Result};
use std::path::PathBuf;

use answerloop_core::application::loop_factory::{build_loop, LoopRuntime};
use answerloop_core::domain::loop_config::LoopConfigManifest;

/// Options shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl GlobalOptions {
    /// Load the configuration and apply command-line overrides.
    pub fn load_config(&self) -> Result<LoopConfigManifest> {
        let mut config = LoopConfigManifest::load_or_default(self.config.clone())
            .context("Failed to load configuration")?;
        if let Some(data_dir) = &self.data_dir {
            config.spec.storage.data_dir = data_dir.clone();
        }
        Ok(config)
    }

    /// Load, validate and wire the loop.
    pub async fn start(&self) -> Result<LoopRuntime> {
        let config = self.load_config()?;
        start_with(&config).await
    }
}

pub async fn start_with(config: &LoopConfigManifest) -> Result<LoopRuntime> {
    config
        .validate()
        .context("Configuration validation failed")?;
    build_loop(config)
        .await
        .context("Failed to initialize the question loop")
}

#[cfg(test)]
mod tests {
    use super::*;
    use answerloop_core::domain::loop_config::StorageBackendKind;

    #[test]
    fn test_data_dir_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("answerloop-config.yaml");
        std::fs::write(
            &config_path,
            "apiVersion: answerloop/v1\nkind: LoopConfig\nmetadata:\n  name: test\nspec:\n  storage:\n    data_dir: /nonexistent\n",
        )
        .unwrap();

        let options = GlobalOptions {
            config: Some(config_path),
            data_dir: Some(dir.path().join("data")),
        };
        let config = options.load_config().unwrap();
        assert_eq!(config.metadata.name, "test");
        assert_eq!(config.spec.storage.backend, StorageBackendKind::File);
        assert_eq!(config.spec.storage.data_dir, dir.path().join("data"));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let options = GlobalOptions {
            config: Some(PathBuf::from("/nonexistent/answerloop.yaml")),
            data_dir: None,
        };
        assert!(options.load_config().is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_wiring() {
        let mut config = LoopConfigManifest::default();
        config.spec.confidence_threshold = 2.0;
        assert!(start_with(&config).await.is_err());
    }
}
