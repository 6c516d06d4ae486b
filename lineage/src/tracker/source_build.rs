use tracing::info;

use super::DeploymentTracker;
use super::lowercase;
use crate::DeploymentEntry;
use crate::DeploymentField;
use crate::Result;
use crate::error::optional;
use crate::error::require;

impl DeploymentTracker {
    /// Start a new lineage for a source-build pipeline run.
    ///
    /// Always inserts: a source build is the first stage of every lineage.
    pub fn record_source_build(
        &self,
        pipeline_id: &str,
        image_tag: &str,
        service_name: &str,
        commit_id: &str,
        source_repo: Option<&str>,
    ) -> Result<DeploymentEntry> {
        const OPERATION: &str = "record_source_build";
        let pipeline_id = require(OPERATION, "pipelineId", pipeline_id)?;
        let image_tag = require(OPERATION, "imageTag", image_tag)?;
        let service_name = require(OPERATION, "service", service_name)?;
        let commit_id = require(OPERATION, "commitId", commit_id)?;

        let mut entry = self.new_entry();
        entry.set_field(DeploymentField::P1, pipeline_id);
        entry.set_field(DeploymentField::ImageTag, image_tag);
        entry.set_field(DeploymentField::Service, service_name);
        entry.set_field(DeploymentField::CommitId, commit_id);
        entry.set_optional(
            DeploymentField::SourceRepo,
            lowercase(optional(source_repo)),
        );

        self.insert(OPERATION, &entry)?;
        info!(
            "started lineage {} for source build {pipeline_id} ({image_tag})",
            entry.row_key
        );
        Ok(entry)
    }
}
