use pretty_assertions::assert_eq;
use trail_lineage::LineageError;
use trail_lineage::StoreStep;
use trail_store::StoreError;
use trail_test_support::StoreOp;
use trail_test_support::test_tracker;

fn storage_step(err: &LineageError) -> Option<(&'static str, StoreStep)> {
    match err {
        LineageError::Storage {
            operation, step, ..
        } => Some((*operation, *step)),
        _ => None,
    }
}

#[test]
fn failed_insert_surfaces_as_storage_error() -> anyhow::Result<()> {
    let (tracker, store) = test_tracker();
    store.fail(StoreOp::Insert);

    let err = tracker
        .record_source_build("1", "svc:1", "svc", "abc", None)
        .expect_err("insert failure must surface");
    assert_eq!(
        storage_step(&err),
        Some(("record_source_build", StoreStep::Insert))
    );
    assert!(
        matches!(
            &err,
            LineageError::Storage {
                source: StoreError::Backend(_),
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(store.rows()?, 0);
    Ok(())
}

#[test]
fn failed_query_aborts_before_any_write() {
    let (tracker, store) = test_tracker();
    store.fail(StoreOp::Query);

    let err = tracker
        .record_config_update("2", "svc:1", "hld", "dev", None, None)
        .expect_err("query failure must surface");
    assert_eq!(
        storage_step(&err),
        Some(("record_config_update", StoreStep::Query))
    );
    assert_eq!(store.writes(), 0);
}

#[test]
fn failed_replace_on_match_path_is_not_retried_as_insert() -> anyhow::Result<()> {
    let (tracker, store) = test_tracker();
    tracker.record_source_build("1", "svc:1", "svc", "abc", None)?;
    tracker.record_config_update("2", "svc:1", "hld", "dev", None, None)?;
    store.fail(StoreOp::Replace);

    let err = tracker
        .record_manifest_generation("hld", "3", None, None, None)
        .expect_err("replace failure must surface");
    assert_eq!(
        storage_step(&err),
        Some(("record_manifest_generation", StoreStep::Replace))
    );
    assert_eq!(store.rows()?, 1);

    // Once the store recovers the same call succeeds against the same row.
    store.heal();
    let entry = tracker.record_manifest_generation("hld", "3", None, None, None)?;
    assert_eq!(entry.p1.as_deref(), Some("1"));
    assert_eq!(store.rows()?, 1);
    Ok(())
}

#[test]
fn patch_surfaces_storage_errors_distinct_from_not_found() -> anyhow::Result<()> {
    let (tracker, store) = test_tracker();
    tracker.record_manifest_generation("hld", "3", None, None, None)?;
    store.fail(StoreOp::Replace);

    let err = tracker
        .patch_manifest_commit("3", "m1", None)
        .expect_err("replace failure must surface");
    assert!(!err.is_not_found());
    assert_eq!(
        storage_step(&err),
        Some(("patch_manifest_commit", StoreStep::Replace))
    );
    Ok(())
}

#[test]
fn validation_happens_before_the_store_is_touched() {
    let (tracker, store) = test_tracker();
    store.fail(StoreOp::Query);
    store.fail(StoreOp::Insert);

    let cases = [
        tracker.record_source_build("", "svc:1", "svc", "abc", None),
        tracker.record_config_update("2", "svc:1", "hld", " ", None, None),
        tracker.record_manifest_generation("", "3", None, Some("9"), None),
        tracker.patch_manifest_commit("3", "", None),
    ];
    let fields: Vec<Option<&'static str>> = cases
        .iter()
        .map(|result| match result {
            Err(LineageError::Validation { field, .. }) => Some(*field),
            _ => None,
        })
        .collect();
    assert_eq!(
        fields,
        vec![
            Some("pipelineId"),
            Some("env"),
            Some("hldCommitId"),
            Some("manifestCommitId"),
        ]
    );
    assert_eq!(store.writes(), 0);
}

#[test]
fn list_failure_is_wrapped() {
    let (tracker, store) = test_tracker();
    store.fail(StoreOp::List);
    let err = tracker.deployments().expect_err("list failure must surface");
    assert_eq!(storage_step(&err), Some(("deployments", StoreStep::List)));
}
