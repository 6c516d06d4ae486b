use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use trail_store::TableEntity;

/// Every property a deployment entry can carry, named as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentField {
    /// Source-build pipeline run.
    P1,
    /// Config-update pipeline run.
    P2,
    /// Manifest-generation pipeline run.
    P3,
    ImageTag,
    CommitId,
    Service,
    SourceRepo,
    Env,
    HldCommitId,
    HldRepo,
    Pr,
    ManifestCommitId,
    ManifestRepo,
}

impl DeploymentField {
    pub const ALL: [DeploymentField; 13] = [
        DeploymentField::P1,
        DeploymentField::P2,
        DeploymentField::P3,
        DeploymentField::ImageTag,
        DeploymentField::CommitId,
        DeploymentField::Service,
        DeploymentField::SourceRepo,
        DeploymentField::Env,
        DeploymentField::HldCommitId,
        DeploymentField::HldRepo,
        DeploymentField::Pr,
        DeploymentField::ManifestCommitId,
        DeploymentField::ManifestRepo,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            DeploymentField::P1 => "p1",
            DeploymentField::P2 => "p2",
            DeploymentField::P3 => "p3",
            DeploymentField::ImageTag => "imageTag",
            DeploymentField::CommitId => "commitId",
            DeploymentField::Service => "service",
            DeploymentField::SourceRepo => "sourceRepo",
            DeploymentField::Env => "env",
            DeploymentField::HldCommitId => "hldCommitId",
            DeploymentField::HldRepo => "hldRepo",
            DeploymentField::Pr => "pr",
            DeploymentField::ManifestCommitId => "manifestCommitId",
            DeploymentField::ManifestRepo => "manifestRepo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == value)
    }
}

impl std::fmt::Display for DeploymentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deployment's lineage across the three pipeline stages.
///
/// All lineage fields are optional and accumulate as stages report in. An empty
/// string is treated the same as an absent field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEntry {
    pub partition_key: String,
    pub row_key: String,
    /// Last write time reported by the store. `None` until the entry has been
    /// read back from the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hld_commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hld_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_repo: Option<String>,
    /// Properties written by other producers; carried through replaces untouched.
    #[serde(skip)]
    pub extra: BTreeMap<String, String>,
}

impl DeploymentEntry {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            ..Self::default()
        }
    }

    pub fn field(&self, field: DeploymentField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Set `field`. Empty values are ignored so a set field is never cleared.
    pub fn set_field(&mut self, field: DeploymentField, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            *self.slot_mut(field) = Some(value);
        }
    }

    pub fn set_optional(&mut self, field: DeploymentField, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.set_field(field, value);
        }
    }

    /// Copy `fields` from `donor` where the donor has them.
    pub fn inherit(&mut self, donor: &DeploymentEntry, fields: &[DeploymentField]) {
        for field in fields {
            if let Some(value) = donor.field(*field) {
                self.set_field(*field, value);
            }
        }
    }

    pub fn to_entity(&self) -> TableEntity {
        let mut entity = TableEntity::new(self.partition_key.as_str(), self.row_key.as_str());
        entity.properties = self.extra.clone();
        for field in DeploymentField::ALL {
            if let Some(value) = self.field(field) {
                entity
                    .properties
                    .insert(field.as_str().to_string(), value.to_string());
            }
        }
        entity
    }

    fn slot(&self, field: DeploymentField) -> &Option<String> {
        match field {
            DeploymentField::P1 => &self.p1,
            DeploymentField::P2 => &self.p2,
            DeploymentField::P3 => &self.p3,
            DeploymentField::ImageTag => &self.image_tag,
            DeploymentField::CommitId => &self.commit_id,
            DeploymentField::Service => &self.service,
            DeploymentField::SourceRepo => &self.source_repo,
            DeploymentField::Env => &self.env,
            DeploymentField::HldCommitId => &self.hld_commit_id,
            DeploymentField::HldRepo => &self.hld_repo,
            DeploymentField::Pr => &self.pr,
            DeploymentField::ManifestCommitId => &self.manifest_commit_id,
            DeploymentField::ManifestRepo => &self.manifest_repo,
        }
    }

    fn slot_mut(&mut self, field: DeploymentField) -> &mut Option<String> {
        match field {
            DeploymentField::P1 => &mut self.p1,
            DeploymentField::P2 => &mut self.p2,
            DeploymentField::P3 => &mut self.p3,
            DeploymentField::ImageTag => &mut self.image_tag,
            DeploymentField::CommitId => &mut self.commit_id,
            DeploymentField::Service => &mut self.service,
            DeploymentField::SourceRepo => &mut self.source_repo,
            DeploymentField::Env => &mut self.env,
            DeploymentField::HldCommitId => &mut self.hld_commit_id,
            DeploymentField::HldRepo => &mut self.hld_repo,
            DeploymentField::Pr => &mut self.pr,
            DeploymentField::ManifestCommitId => &mut self.manifest_commit_id,
            DeploymentField::ManifestRepo => &mut self.manifest_repo,
        }
    }
}

impl From<TableEntity> for DeploymentEntry {
    fn from(entity: TableEntity) -> Self {
        let mut entry = DeploymentEntry::new(entity.partition_key, entity.row_key);
        entry.timestamp = entity.timestamp;
        for (name, value) in entity.properties {
            match DeploymentField::parse(&name) {
                Some(field) => entry.set_field(field, value),
                None => {
                    entry.extra.insert(name, value);
                }
            }
        }
        entry
    }
}
