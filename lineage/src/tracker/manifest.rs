use tracing::info;
use tracing::warn;

use super::DeploymentTracker;
use super::lowercase;
use crate::DeploymentEntry;
use crate::DeploymentField;
use crate::LineageError;
use crate::Result;
use crate::error::optional;
use crate::error::require;
use crate::policy::CorrelationOutcome;
use crate::policy::MatchCriterion;
use crate::policy::correlate;

/// Earlier-stage facts a synthesized stage-3 entry borrows from its donor.
const MANIFEST_DONOR_FIELDS: [DeploymentField; 9] = [
    DeploymentField::CommitId,
    DeploymentField::Env,
    DeploymentField::P1,
    DeploymentField::P2,
    DeploymentField::Service,
    DeploymentField::SourceRepo,
    DeploymentField::HldRepo,
    DeploymentField::ImageTag,
    DeploymentField::Pr,
];

struct ManifestGeneration<'a> {
    hld_commit_id: &'a str,
    pipeline_id: &'a str,
    manifest_commit_id: Option<&'a str>,
    pr: Option<&'a str>,
    repo: Option<String>,
}

impl ManifestGeneration<'_> {
    fn apply(&self, entry: &mut DeploymentEntry) {
        entry.set_field(DeploymentField::P3, self.pipeline_id);
        entry.set_field(DeploymentField::HldCommitId, self.hld_commit_id);
        entry.set_optional(DeploymentField::ManifestCommitId, self.manifest_commit_id);
        entry.set_optional(DeploymentField::ManifestRepo, self.repo.as_deref());
        entry.set_optional(DeploymentField::Pr, self.pr);
    }
}

impl DeploymentTracker {
    /// Link a manifest-generation run to the config update that produced
    /// `hld_commit_id`.
    ///
    /// Candidates are looked up by `hldCommitId`, then by `pr` when the commit
    /// is unknown. A commit made straight to the config repository has no
    /// predecessor; that is not an error and yields an orphan entry.
    pub fn record_manifest_generation(
        &self,
        hld_commit_id: &str,
        pipeline_id: &str,
        manifest_commit_id: Option<&str>,
        pr: Option<&str>,
        repo: Option<&str>,
    ) -> Result<DeploymentEntry> {
        const OPERATION: &str = "record_manifest_generation";
        let generation = ManifestGeneration {
            hld_commit_id: require(OPERATION, "hldCommitId", hld_commit_id)?,
            pipeline_id: require(OPERATION, "pipelineId", pipeline_id)?,
            manifest_commit_id: optional(manifest_commit_id),
            pr: optional(pr),
            repo: lowercase(optional(repo)),
        };

        let mut candidates = self.query(
            OPERATION,
            DeploymentField::HldCommitId,
            generation.hld_commit_id,
        )?;
        if candidates.is_empty()
            && let Some(pr) = generation.pr
        {
            warn!(
                "no deployment carries hld commit {}; falling back to pr {pr}",
                generation.hld_commit_id
            );
            candidates = self.query(OPERATION, DeploymentField::Pr, pr)?;
        }

        let criteria = [
            MatchCriterion::exact(DeploymentField::P3, Some(generation.pipeline_id)),
            MatchCriterion::exact(
                DeploymentField::ManifestCommitId,
                generation.manifest_commit_id,
            ),
        ];

        match correlate(&candidates, &criteria) {
            CorrelationOutcome::Matched(index) => {
                let mut entry = candidates.swap_remove(index);
                generation.apply(&mut entry);
                self.replace(OPERATION, &entry)?;
                info!(
                    "manifest generation {} closed lineage {} (hld {})",
                    generation.pipeline_id, entry.row_key, generation.hld_commit_id
                );
                Ok(entry)
            }
            CorrelationOutcome::Donor(index) => {
                let donor = &candidates[index];
                let mut entry = self.new_entry();
                entry.inherit(donor, &MANIFEST_DONOR_FIELDS);
                generation.apply(&mut entry);
                self.insert(OPERATION, &entry)?;
                info!(
                    "manifest generation {} started lineage {} from donor {} (hld {})",
                    generation.pipeline_id, entry.row_key, donor.row_key, generation.hld_commit_id
                );
                Ok(entry)
            }
            CorrelationOutcome::Orphan => {
                let mut entry = self.new_entry();
                generation.apply(&mut entry);
                self.insert(OPERATION, &entry)?;
                warn!(
                    "manifest generation {} found no predecessor for hld {}; orphan {}",
                    generation.pipeline_id, generation.hld_commit_id, entry.row_key
                );
                Ok(entry)
            }
        }
    }

    /// Record the manifest commit on the entry written by manifest pipeline
    /// `pipeline_id`.
    ///
    /// The first entry carrying that `p3` is patched. Unlike the correlators
    /// this never creates a row: an unknown `p3` is [`LineageError::NotFound`].
    pub fn patch_manifest_commit(
        &self,
        pipeline_id: &str,
        manifest_commit_id: &str,
        repo: Option<&str>,
    ) -> Result<DeploymentEntry> {
        const OPERATION: &str = "patch_manifest_commit";
        let pipeline_id = require(OPERATION, "pipelineId", pipeline_id)?;
        let manifest_commit_id = require(OPERATION, "manifestCommitId", manifest_commit_id)?;

        let Some(mut entry) = self
            .query(OPERATION, DeploymentField::P3, pipeline_id)?
            .into_iter()
            .next()
        else {
            return Err(LineageError::NotFound {
                pipeline_id: pipeline_id.to_string(),
            });
        };

        entry.set_field(DeploymentField::ManifestCommitId, manifest_commit_id);
        entry.set_optional(DeploymentField::ManifestRepo, lowercase(optional(repo)));
        self.replace(OPERATION, &entry)?;
        info!(
            "patched manifest commit {manifest_commit_id} onto lineage {}",
            entry.row_key
        );
        Ok(entry)
    }
}
