use tracing::info;

use super::DeploymentTracker;
use super::lowercase;
use crate::DeploymentEntry;
use crate::DeploymentField;
use crate::Result;
use crate::error::optional;
use crate::error::require;
use crate::policy::CorrelationOutcome;
use crate::policy::MatchCriterion;
use crate::policy::correlate;

/// Stage-1 facts a synthesized stage-2 entry borrows from its donor.
const CONFIG_UPDATE_DONOR_FIELDS: [DeploymentField; 4] = [
    DeploymentField::CommitId,
    DeploymentField::P1,
    DeploymentField::Service,
    DeploymentField::SourceRepo,
];

struct ConfigUpdate<'a> {
    pipeline_id: &'a str,
    image_tag: &'a str,
    target_commit_id: &'a str,
    env: String,
    pr: Option<&'a str>,
    repo: Option<String>,
}

impl ConfigUpdate<'_> {
    fn apply(&self, entry: &mut DeploymentEntry) {
        entry.set_field(DeploymentField::P2, self.pipeline_id);
        entry.set_field(DeploymentField::HldCommitId, self.target_commit_id);
        entry.set_field(DeploymentField::Env, self.env.as_str());
        entry.set_optional(DeploymentField::Pr, self.pr);
        entry.set_optional(DeploymentField::HldRepo, self.repo.as_deref());
    }
}

impl DeploymentTracker {
    /// Link a config-repository update to the source build that produced
    /// `image_tag`.
    ///
    /// Updates the first entry for the image tag whose `p2`, `hldCommitId` and
    /// `env` are unset or already agree. Failing that, a new entry is created,
    /// seeded from the most recent entry for the image tag when there is one.
    pub fn record_config_update(
        &self,
        pipeline_id: &str,
        image_tag: &str,
        target_commit_id: &str,
        env: &str,
        pr: Option<&str>,
        repo: Option<&str>,
    ) -> Result<DeploymentEntry> {
        const OPERATION: &str = "record_config_update";
        let update = ConfigUpdate {
            pipeline_id: require(OPERATION, "pipelineId", pipeline_id)?,
            image_tag: require(OPERATION, "imageTag", image_tag)?,
            target_commit_id: require(OPERATION, "hldCommitId", target_commit_id)?,
            env: require(OPERATION, "env", env)?.to_lowercase(),
            pr: optional(pr),
            repo: lowercase(optional(repo)),
        };

        let mut candidates = self.query(OPERATION, DeploymentField::ImageTag, update.image_tag)?;
        let criteria = [
            MatchCriterion::exact(DeploymentField::P2, Some(update.pipeline_id)),
            MatchCriterion::exact(DeploymentField::HldCommitId, Some(update.target_commit_id)),
            MatchCriterion::case_insensitive(DeploymentField::Env, Some(update.env.as_str())),
        ];

        match correlate(&candidates, &criteria) {
            CorrelationOutcome::Matched(index) => {
                let mut entry = candidates.swap_remove(index);
                update.apply(&mut entry);
                self.replace(OPERATION, &entry)?;
                info!(
                    "config update {} joined lineage {} ({})",
                    update.pipeline_id, entry.row_key, update.image_tag
                );
                Ok(entry)
            }
            CorrelationOutcome::Donor(index) => {
                let donor = &candidates[index];
                let mut entry = self.new_entry();
                entry.inherit(donor, &CONFIG_UPDATE_DONOR_FIELDS);
                entry.set_field(DeploymentField::ImageTag, update.image_tag);
                update.apply(&mut entry);
                self.insert(OPERATION, &entry)?;
                info!(
                    "config update {} started lineage {} from donor {} ({})",
                    update.pipeline_id, entry.row_key, donor.row_key, update.image_tag
                );
                Ok(entry)
            }
            CorrelationOutcome::Orphan => {
                let mut entry = self.new_entry();
                entry.set_field(DeploymentField::ImageTag, update.image_tag);
                update.apply(&mut entry);
                self.insert(OPERATION, &entry)?;
                info!(
                    "config update {} has no source build for {}; started orphan lineage {}",
                    update.pipeline_id, update.image_tag, entry.row_key
                );
                Ok(entry)
            }
        }
    }
}
