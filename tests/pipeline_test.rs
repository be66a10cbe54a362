//! Integration tests for the clustering pipeline.

use proptest::prelude::*;
use stream_clusters::config::{CompressionConfig, GroupingStrategy, Settings};
use stream_clusters::core::{
    aggregate, aggregate_with_fallback, cluster_over_time, common_boring_timestamps,
    BoringRegionDetector, ClusterAssigner, ClusterSession, DataCompressor, Group, Row,
};

fn names(dimensions: &[&str]) -> Vec<String> {
    dimensions.iter().map(|d| d.to_string()).collect()
}

fn group_names(groups: &[Group]) -> Vec<Vec<String>> {
    groups.iter().map(|g| g.dimensions.clone()).collect()
}

#[test]
fn test_count_grouping_by_latest_values() {
    let dimensions = names(&["A", "B", "C", "D"]);
    let rows = vec![
        Row::from_values(0, [("A", 1.0), ("B", 2.0), ("C", 3.0), ("D", 4.0)]),
        Row::from_values(1000, [("A", 10.0), ("B", 5.0), ("C", 8.0), ("D", 1.0)]),
    ];
    let settings = Settings::new(GroupingStrategy::Count(2));

    let view = aggregate(&rows, &dimensions, &settings);

    assert_eq!(
        group_names(&view.groups),
        vec![names(&["A", "C"]), names(&["B", "D"])]
    );
    assert_eq!(view.assignment.group_of("C"), Some(0));
    assert_eq!(view.assignment.group_of("D"), Some(1));
    assert!(view.anomaly.is_none());
}

#[test]
fn test_flat_interior_is_boring() {
    let values = [5.0, 5.01, 5.02, 5.0, 5.01];
    let rows: Vec<Row> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| Row::from_values(i as i64 * 100, [("x", v)]))
        .collect();
    let group = Group::from_window(&rows, names(&["x"]));

    let detector = BoringRegionDetector::new(0.1, 3);
    assert_eq!(detector.ticks_before(), 1);
    assert_eq!(detector.ticks_after(), 2);
    assert_eq!(detector.detect(&group), vec![100, 200]);
}

#[test]
fn test_boring_run_collapses_to_one_placeholder() {
    let rows: Vec<Row> = (0..6)
        .map(|i| Row::from_values(i * 100, [("x", i as f64), ("y", 2.0)]))
        .collect();
    let groups = vec![
        Group::from_window(&rows, names(&["x"])),
        Group::from_window(&rows, names(&["y"])),
    ];

    let compressed = DataCompressor::new(true).compress(&groups, &[100, 200, 300]);

    for group in &compressed {
        assert_eq!(group.timestamps(), vec![0, 100, 400, 500]);
        let placeholder = &group.rows[1];
        assert!(group.dimensions.iter().all(|d| placeholder.value(d).is_none()));
    }
}

#[test]
fn test_density_separates_distant_series() {
    let dimensions = names(&["twin_a", "twin_b", "far"]);
    let rows: Vec<Row> = (0..10)
        .map(|i| {
            let v = (i as f64).sin() * 3.0 + 10.0;
            Row::from_values(i * 1000, [("twin_a", v), ("twin_b", v), ("far", v + 1000.0)])
        })
        .collect();

    let clustering = ClusterAssigner::new(GroupingStrategy::Density(0.01)).assign(&rows, &dimensions);

    // Every seed forms a group, so the distant series is isolated rather than
    // reported as noise.
    assert_eq!(
        group_names(&clustering.groups),
        vec![names(&["twin_a", "twin_b"]), names(&["far"])]
    );
    assert!(clustering.anomaly.is_none());
}

#[test]
fn test_compressed_groups_stay_aligned() {
    let dimensions = names(&["flat", "also_flat", "moving"]);
    let rows: Vec<Row> = (0..20)
        .map(|i| {
            let moving = if i < 10 { 50.0 } else { 50.0 + i as f64 * 5.0 };
            Row::from_values(i * 1000, [("flat", 3.0), ("also_flat", 7.0), ("moving", moving)])
        })
        .collect();
    let settings = Settings::new(GroupingStrategy::Count(2))
        .with_data_ticks(None)
        .with_compression(CompressionConfig {
            mean_range: 0.05,
            tick_range: 3,
            save_screen_space: false,
        });

    let view = aggregate(&rows, &dimensions, &settings);

    assert!(!view.boring_timestamps.is_empty());
    let reference = view.groups[0].timestamps();
    assert_eq!(reference.len(), rows.len());
    for group in &view.groups {
        assert_eq!(group.timestamps(), reference);
    }
    // Only stretches flat in every group are suppressed.
    assert!(view.boring_timestamps.iter().all(|&t| t < 10_000));
}

#[test]
fn test_fallback_leaves_consistent_grouping_alone() {
    let rows: Vec<Row> = (0..5)
        .map(|i| Row::from_values(i, [("a", 1.0), ("b", 2.0), ("c", 40.0)]))
        .collect();
    let dimensions = names(&["a", "b", "c"]);
    let settings = Settings::new(GroupingStrategy::Density(5.0));

    let plain = aggregate(&rows, &dimensions, &settings);
    let guarded = aggregate_with_fallback(&rows, &dimensions, &settings);

    assert!(!guarded.fell_back);
    assert_eq!(plain, guarded);
    assert_eq!(
        group_names(&guarded.groups),
        vec![names(&["a", "b"]), names(&["c"])]
    );
}

#[test]
fn test_session_tracks_reassignment_over_passes() {
    let dimensions = names(&["a", "b", "c", "d"]);
    let settings = Settings::new(GroupingStrategy::Count(2))
        .with_data_ticks(Some(1))
        .with_history_depth(4);
    let mut session = ClusterSession::new(settings, 20);

    let mut rows = Vec::new();
    for i in 0..4 {
        rows.push(Row::from_values(
            i * 1000,
            [("a", 10.0), ("b", 9.0), ("c", 2.0), ("d", 1.0)],
        ));
        let update = session.process(&rows, &dimensions);
        assert!(update.highlights.is_empty());
    }

    // "d" overtakes everything and moves into group 0, pushing "b" down.
    rows.push(Row::from_values(
        4000,
        [("a", 10.0), ("b", 1.5), ("c", 2.0), ("d", 20.0)],
    ));
    let update = session.process(&rows, &dimensions);

    let d = update
        .highlights
        .iter()
        .find(|h| h.dimension == "d")
        .expect("d was reassigned");
    assert_eq!(d.opacity, 1.0);
    assert_eq!(d.last_different_group, Some(1));

    let b = update
        .highlights
        .iter()
        .find(|h| h.dimension == "b")
        .expect("b was reassigned");
    assert_eq!(b.last_different_group, Some(0));
    assert!(update.highlights.iter().all(|h| h.dimension != "a"));

    // One pass later "d" has been in group 0 once, so it fades.
    rows.push(Row::from_values(
        5000,
        [("a", 10.0), ("b", 1.5), ("c", 2.0), ("d", 20.0)],
    ));
    let update = session.process(&rows, &dimensions);
    let d = update.highlights.iter().find(|h| h.dimension == "d").unwrap();
    assert_eq!(d.opacity, 0.75);
}

#[test]
fn test_timeline_matches_windowed_passes() {
    let dimensions = names(&["a", "b", "c"]);
    let rows: Vec<Row> = (0..12)
        .map(|i| {
            let t = i as f64;
            Row::from_values(i * 1000, [("a", t), ("b", 12.0 - t), ("c", 6.0)])
        })
        .collect();
    let settings = Settings::new(GroupingStrategy::Count(3));

    let views = cluster_over_time(&rows, &dimensions, &settings, Some(4));
    assert_eq!(views.len(), 8);

    for (offset, view) in views.iter().enumerate() {
        let index = offset + 4;
        assert_eq!(view.timestamp, rows[index].timestamp);
        let expected = ClusterAssigner::new(settings.grouping)
            .assign(&rows[index - 4..index], &dimensions)
            .assignment(&dimensions);
        assert_eq!(view.assignment, expected);
    }
}

fn arb_rows(max_dims: usize, max_rows: usize) -> impl Strategy<Value = (Vec<String>, Vec<Row>)> {
    (1..=max_dims, 1..=max_rows).prop_flat_map(|(dims, rows)| {
        proptest::collection::vec(proptest::collection::vec(1.0f64..100.0, dims), rows).prop_map(
            move |matrix| {
                let dimensions: Vec<String> = (0..dims).map(|i| format!("d{i}")).collect();
                let rows = matrix
                    .into_iter()
                    .enumerate()
                    .map(|(t, values)| {
                        Row::from_values(
                            t as i64 * 1000,
                            dimensions.iter().cloned().zip(values),
                        )
                    })
                    .collect();
                (dimensions, rows)
            },
        )
    })
}

proptest! {
    #[test]
    fn prop_count_grouping_is_a_partition((dimensions, rows) in arb_rows(12, 20), k in 1u32..6) {
        let clustering = ClusterAssigner::new(GroupingStrategy::Count(k)).assign(&rows, &dimensions);

        prop_assert_eq!(clustering.groups.len(), k as usize);
        prop_assert!(clustering.anomaly.is_none());
        for dimension in &dimensions {
            let holders = clustering.groups.iter().filter(|g| g.contains(dimension)).count();
            prop_assert_eq!(holders, 1);
        }
    }

    #[test]
    fn prop_density_grouping_is_a_partition((dimensions, rows) in arb_rows(10, 15), eps in 0.5f64..200.0) {
        let clustering = ClusterAssigner::new(GroupingStrategy::Density(eps)).assign(&rows, &dimensions);

        prop_assert!(clustering.anomaly.is_none());
        let assigned: usize = clustering.groups.iter().map(|g| g.dimensions.len()).sum();
        prop_assert_eq!(assigned, dimensions.len());
    }

    #[test]
    fn prop_groups_share_timestamps(
        (dimensions, rows) in arb_rows(8, 30),
        k in 1u32..4,
        mean_range in 0.01f64..2.0,
        tick_range in 1usize..6,
        save_screen_space in any::<bool>(),
    ) {
        let settings = Settings::new(GroupingStrategy::Count(k))
            .with_data_ticks(None)
            .with_compression(CompressionConfig { mean_range, tick_range, save_screen_space });

        let view = aggregate(&rows, &dimensions, &settings);
        let reference = view.groups[0].timestamps();
        for group in &view.groups {
            prop_assert_eq!(group.timestamps(), reference.clone());
        }
        if !save_screen_space {
            prop_assert_eq!(reference.len(), rows.len());
        }
    }

    #[test]
    fn prop_boring_set_grows_with_threshold(
        (dimensions, rows) in arb_rows(4, 25),
        low in 0.01f64..1.0,
        extra in 0.0f64..1.0,
        tick_range in 1usize..6,
    ) {
        let group = Group::from_window(&rows, dimensions);
        let strict = BoringRegionDetector::new(low, tick_range).detect(&group);
        let loose = BoringRegionDetector::new(low + extra, tick_range).detect(&group);

        prop_assert!(strict.iter().all(|t| loose.contains(t)));
        let common = common_boring_timestamps(&[strict.clone(), loose]);
        prop_assert_eq!(common, strict);
    }

    #[test]
    fn prop_history_never_exceeds_bound(
        (dimensions, rows) in arb_rows(5, 30),
        depth in 1usize..10,
        bound in 1usize..10,
    ) {
        let settings = Settings::new(GroupingStrategy::Count(2))
            .with_data_ticks(Some(5))
            .with_history_depth(depth);
        let mut session = ClusterSession::new(settings, bound);

        for end in 1..=rows.len() {
            let update = session.process(&rows[..end], &dimensions);
            prop_assert!(session.history().len() <= depth.min(bound));
            for highlight in &update.highlights {
                prop_assert!(highlight.opacity > 0.0 && highlight.opacity <= 1.0);
            }
        }
    }
}
