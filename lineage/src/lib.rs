//! Deployment lineage correlation.
//!
//! A deployment passes through three pipelines that never see each other: a
//! source build, a config-repository update and a manifest generation. Each
//! stage reports what it knows to a [`DeploymentTracker`], which stitches the
//! reports into one [`DeploymentEntry`] per deployment using domain keys
//! (`imageTag` between stages 1 and 2, `hldCommitId` or `pr` between stages 2
//! and 3). When no predecessor can be found the tracker records a partial
//! lineage instead of failing the pipeline.

pub mod config;
mod error;
mod model;
pub mod policy;
mod tracker;

pub use config::ConfigError;
pub use config::LineageConfig;
pub use error::LineageError;
pub use error::Result;
pub use error::StoreStep;
pub use model::DeploymentEntry;
pub use model::DeploymentField;
pub use tracker::DeploymentTracker;
