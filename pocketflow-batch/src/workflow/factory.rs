//! Pipeline construction
//!
//! A [`PipelineFactory`] is asked exactly once per batch for the pipeline
//! shared by every worker. Resolving external tools happens here, so a
//! missing installation is reported before any structure is touched.

use super::pipeline::{PipelineSettings, StructurePipeline};
use crate::services::{FpocketDetector, OverlapClusterer, P2RankRescorer, ToolError, ToolLocator};
use pocketflow_common::config::TomlConfig;
use std::path::PathBuf;
use std::sync::Arc;

pub trait PipelineFactory: Send + Sync {
    fn create(&self) -> Result<StructurePipeline, ToolError>;
}

/// An already-built pipeline hands out clones of itself
impl PipelineFactory for StructurePipeline {
    fn create(&self) -> Result<StructurePipeline, ToolError> {
        Ok(self.clone())
    }
}

/// Builds the fpocket + P2Rank pipeline
#[derive(Debug, Clone)]
pub struct ExternalToolFactory {
    locator: ToolLocator,
    p2rank_home: Option<PathBuf>,
    fpocket_binary: PathBuf,
    clusterer: OverlapClusterer,
    settings: PipelineSettings,
}

impl ExternalToolFactory {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            locator: ToolLocator::new(),
            p2rank_home: config.tools.p2rank_home.clone(),
            fpocket_binary: config.tools.fpocket_binary.clone(),
            clusterer: OverlapClusterer::from_config(&config.dedup),
            settings: PipelineSettings::from_config(&config.batch),
        }
    }

    pub fn with_locator(mut self, locator: ToolLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }
}

impl PipelineFactory for ExternalToolFactory {
    fn create(&self) -> Result<StructurePipeline, ToolError> {
        let home = self.locator.resolve(self.p2rank_home.as_deref())?;
        Ok(StructurePipeline::new(
            Arc::new(FpocketDetector::new(self.fpocket_binary.clone())),
            Arc::new(P2RankRescorer::new(home)),
            self.clusterer.clone(),
            self.settings.clone(),
        ))
    }
}
