use std::sync::Arc;

use pretty_assertions::assert_eq;
use trail_lineage::DeploymentField;
use trail_lineage::DeploymentTracker;
use trail_lineage::LineageError;
use trail_store::QueryOrder;
use trail_test_support::FaultyEntityStore;
use trail_test_support::TEST_PARTITION;
use trail_test_support::init_test_logging;
use trail_test_support::test_tracker;

#[test]
fn source_build_then_config_update_leaves_no_orphan() -> anyhow::Result<()> {
    let (tracker, store) = test_tracker();
    for (index, tag) in ["svc:1", "svc:2", "other:master-9"].iter().enumerate() {
        let p1 = format!("build-{index}");
        let p2 = format!("release-{index}");
        tracker.record_source_build(&p1, tag, "svc", "abc", None)?;
        let entry = tracker.record_config_update(&p2, tag, "hld", "dev", None, None)?;
        assert_eq!(entry.p1.as_deref(), Some(p1.as_str()));
        assert_eq!(entry.p2.as_deref(), Some(p2.as_str()));
    }
    assert_eq!(store.rows()?, 3);
    Ok(())
}

#[test]
fn unknown_image_tag_creates_exactly_one_orphan() -> anyhow::Result<()> {
    let (tracker, store) = test_tracker();
    tracker.record_source_build("1", "svc:known", "svc", "abc", None)?;

    let orphan = tracker.record_config_update("2", "svc:unknown", "hld", "dev", None, None)?;
    assert_eq!(orphan.p1, None);
    assert_eq!(orphan.p2.as_deref(), Some("2"));
    assert_eq!(store.rows()?, 2);
    assert_eq!(
        tracker
            .deployments_by(DeploymentField::ImageTag, "svc:unknown")?
            .len(),
        1
    );
    Ok(())
}

#[test]
fn manifest_generation_for_known_commit_keeps_row_count() -> anyhow::Result<()> {
    let (tracker, store) = test_tracker();
    tracker.record_source_build("1", "svc:1", "svc", "abc", None)?;
    tracker.record_config_update("2", "svc:1", "hld-1", "dev", None, None)?;
    let before = store.rows()?;

    tracker.record_manifest_generation("hld-1", "3", None, None, None)?;
    assert_eq!(store.rows()?, before);

    let orphan = tracker.record_manifest_generation("hld-unknown", "4", None, None, None)?;
    assert_eq!(orphan.p2, None);
    assert_eq!(store.rows()?, before + 1);
    Ok(())
}

#[test]
fn patch_of_unknown_p3_writes_nothing() -> anyhow::Result<()> {
    let (tracker, store) = test_tracker();
    tracker.record_source_build("1", "svc:1", "svc", "abc", None)?;
    let writes = store.writes();

    let err = tracker
        .patch_manifest_commit("no-such-run", "m", None)
        .expect_err("patch must not invent a row");
    assert!(
        matches!(&err, LineageError::NotFound { pipeline_id } if pipeline_id == "no-such-run"),
        "{err}"
    );
    assert_eq!(store.writes(), writes);
    Ok(())
}

#[test]
fn identical_config_updates_are_idempotent() -> anyhow::Result<()> {
    let (tracker, store) = test_tracker();
    let first = tracker.record_config_update("2", "svc:1", "hld", "Dev", None, None)?;
    let second = tracker.record_config_update("2", "svc:1", "hld", "Dev", None, None)?;
    assert_eq!(first.row_key, second.row_key);
    assert_eq!(store.rows()?, 1);
    Ok(())
}

#[test]
fn donor_is_most_recent_write_in_any_result_order() -> anyhow::Result<()> {
    init_test_logging();
    for order in [QueryOrder::Insertion, QueryOrder::Reversed] {
        let store = Arc::new(FaultyEntityStore::with_query_order(order));
        let tracker = DeploymentTracker::new(store.clone(), TEST_PARTITION);

        tracker.record_config_update("a", "svc:1", "hld-a", "dev", None, None)?;
        tracker.record_source_build("late-build", "svc:1", "svc", "c9", None)?;
        let donor_seed = tracker.record_config_update("b", "svc:1", "hld-b", "dev", None, None)?;
        assert_eq!(donor_seed.p1.as_deref(), Some("late-build"), "{order:?}");

        // Every row now disagrees with `c`; the most recently written row donates.
        let entry = tracker.record_config_update("c", "svc:1", "hld-c", "dev", None, None)?;
        assert_eq!(entry.p1.as_deref(), Some("late-build"), "{order:?}");
        assert_eq!(store.rows()?, 3, "{order:?}");
    }
    Ok(())
}

#[test]
fn deployments_are_scoped_to_the_partition() -> anyhow::Result<()> {
    init_test_logging();
    let store = Arc::new(FaultyEntityStore::new());
    let team_a = DeploymentTracker::new(store.clone(), "team-a");
    let team_b = DeploymentTracker::new(store.clone(), "team-b");

    team_a.record_source_build("1", "svc:1", "svc", "abc", None)?;
    let orphan = team_b.record_config_update("2", "svc:1", "hld", "dev", None, None)?;

    assert_eq!(orphan.p1, None);
    assert_eq!(team_a.deployments()?.len(), 1);
    assert_eq!(team_b.deployments()?.len(), 1);
    assert_eq!(store.rows()?, 2);
    Ok(())
}

#[test]
fn concurrent_config_updates_both_insert_without_deduplication() -> anyhow::Result<()> {
    let (tracker, store) = test_tracker();
    store.hold_queries(2);

    let joined = std::thread::scope(|scope| {
        let first =
            scope.spawn(|| tracker.record_config_update("2", "svc:1", "hld", "dev", None, None));
        let second =
            scope.spawn(|| tracker.record_config_update("2", "svc:1", "hld", "dev", None, None));
        [first.join(), second.join()]
    });
    store.release_queries();
    let [first, second] = joined.map(|result| result.expect("stage-2 call panicked"));
    let (first, second) = (first?, second?);

    // Both calls saw an empty result, so the race leaves two rows behind.
    assert_ne!(first.row_key, second.row_key);
    assert_eq!(store.rows()?, 2);
    assert_eq!(
        tracker
            .deployments_by(DeploymentField::ImageTag, "svc:1")?
            .len(),
        2
    );

    // Later calls match one of the racing rows instead of adding a third.
    let rerun = tracker.record_config_update("2", "svc:1", "hld", "dev", None, None)?;
    assert!(
        [first.row_key.as_str(), second.row_key.as_str()].contains(&rerun.row_key.as_str()),
        "{rerun:?}"
    );
    assert_eq!(store.rows()?, 2);
    Ok(())
}
