//! Declarative decision pipelines.
//!
//! A pipeline definition is three ordered lists of `{type, parameters}`
//! entries (filters, position rules, portfolio rules) plus the manager
//! settings. `build` resolves every entry through the registries before any
//! simulation starts and reports all problems together.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ResolutionError;
use crate::filter::{Filter, FilterPipeline};
use crate::params::{ParamError, Params};
use crate::portfolio::{PortfolioManager, PortfolioManagerConfig, PortfolioRule};
use crate::position::{PositionManager, PositionManagerConfig, PositionRule};
use crate::registry::{Registries, Registry};
use crate::strategy::Strategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEntry {
    #[serde(alias = "type")]
    pub type_identifier: String,
    #[serde(default)]
    pub parameters: Params,
}

impl PipelineEntry {
    pub fn new(type_identifier: impl Into<String>, parameters: Params) -> Self {
        Self {
            type_identifier: type_identifier.into(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub filters: Vec<PipelineEntry>,
    pub position_rules: Vec<PipelineEntry>,
    pub portfolio_rules: Vec<PipelineEntry>,
    pub position_manager: PositionManagerConfig,
    pub portfolio: PortfolioManagerConfig,
}

/// Which of the three lists an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Strategy,
    Filter,
    PositionRule,
    PortfolioRule,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strategy => "strategy",
            Self::Filter => "filters",
            Self::PositionRule => "position_rules",
            Self::PortfolioRule => "portfolio_rules",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineIssue {
    #[error("{stage}[{index}]: {source}")]
    Unresolved {
        stage: Stage,
        index: usize,
        #[source]
        source: ResolutionError,
    },

    #[error("{stage}[{index}] ({identifier}): {source}")]
    Malformed {
        stage: Stage,
        index: usize,
        identifier: String,
        #[source]
        source: ParamError,
    },
}

/// Every unresolved or malformed entry of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct PipelineBuildError {
    pub issues: Vec<PipelineIssue>,
}

impl fmt::Display for PipelineBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline has {} invalid entr", self.issues.len())?;
        f.write_str(if self.issues.len() == 1 { "y" } else { "ies" })?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

/// Assembled, ready-to-run decision stages.
#[derive(Debug, Default)]
pub struct Pipeline {
    pub filters: FilterPipeline,
    pub position: PositionManager,
    pub portfolio: PortfolioManager,
}

impl PipelineConfig {
    pub fn build(&self, registries: &Registries) -> Result<Pipeline, PipelineBuildError> {
        let mut issues = Vec::new();

        let filters: Vec<Box<dyn Filter>> =
            build_stage(Stage::Filter, &self.filters, &registries.filters, &mut issues);
        let position_rules: Vec<Box<dyn PositionRule>> = build_stage(
            Stage::PositionRule,
            &self.position_rules,
            &registries.position_rules,
            &mut issues,
        );
        let portfolio_rules: Vec<Box<dyn PortfolioRule>> = build_stage(
            Stage::PortfolioRule,
            &self.portfolio_rules,
            &registries.portfolio_rules,
            &mut issues,
        );

        if !issues.is_empty() {
            return Err(PipelineBuildError { issues });
        }
        Ok(Pipeline {
            filters: FilterPipeline::new(filters),
            position: PositionManager::new(position_rules, self.position_manager),
            portfolio: PortfolioManager::new(portfolio_rules, self.portfolio),
        })
    }
}

/// Resolve and construct the strategy named by `entry`.
pub fn build_strategy(
    entry: &PipelineEntry,
    registries: &Registries,
) -> Result<Box<dyn Strategy>, PipelineIssue> {
    build_entry(Stage::Strategy, 0, entry, &registries.strategies)
}

fn build_stage<T: ?Sized>(
    stage: Stage,
    entries: &[PipelineEntry],
    registry: &Registry<fn(&Params) -> Result<Box<T>, ParamError>>,
    issues: &mut Vec<PipelineIssue>,
) -> Vec<Box<T>> {
    let mut built = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match build_entry(stage, index, entry, registry) {
            Ok(component) => built.push(component),
            Err(issue) => issues.push(issue),
        }
    }
    built
}

fn build_entry<T: ?Sized>(
    stage: Stage,
    index: usize,
    entry: &PipelineEntry,
    registry: &Registry<fn(&Params) -> Result<Box<T>, ParamError>>,
) -> Result<Box<T>, PipelineIssue> {
    let factory = registry
        .resolve(&entry.type_identifier)
        .map_err(|source| PipelineIssue::Unresolved {
            stage,
            index,
            source,
        })?;
    factory(&entry.parameters).map_err(|source| PipelineIssue::Malformed {
        stage,
        index,
        identifier: entry.type_identifier.clone(),
        source,
    })
}
