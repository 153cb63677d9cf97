//! Registry Scenarios Worldtest
//!
//! Drives the protection registry the way block interaction hooks and claim
//! commands do. Focus areas:
//! - ownership isolation and permission gating
//! - claim conflicts on face-touching and overlapping boxes
//! - legacy save migration and corrupt-entry tolerance
//! - concurrent readers next to a writer
//! - claims laid out in sorted order along a road surviving a reload
//! - query and save/load cost on a populated world (metrics and an event
//!   log exported)

use claimguard_claims::{
    BlockBox, BlockPos, ClaimStore, Compound, Permission, ProtectionRegistry, Tag,
    LEGACY_CLAIMS_KEY, PROPERTIES_KEY,
};
use claimguard_testkit::{
    arb_permission, cube, player, JsonlSink, MetricsReportBuilder, MetricsSink,
    PersistenceMetrics, RegistryMetrics, TestExecutionMetrics, TestResult,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use uuid::Uuid;

const GRID: i32 = 20; // 20x20 claims
const SPACING: i32 = 32;
const CLAIM_EDGE: i32 = 16;
const ROAD_PLOTS: i32 = 10_000;

#[test]
fn owner_is_never_protected_against() {
    let registry = ProtectionRegistry::new();
    let owner = player("Owner");
    let stranger = player("Stranger");
    let region = registry.add_protection(cube(0, 0, 0, 10, 10, 10), owner.clone());

    for permission in Permission::ALL {
        for pos in [region.bounds.min(), region.bounds.max(), BlockPos::new(5, 5, 5)] {
            assert!(!registry.is_protected_against(pos, owner.id, permission));
            assert!(registry.is_protected_against(pos, stranger.id, permission));
        }
        // Outside every claim nobody is blocked.
        assert!(!registry.is_protected_against(BlockPos::new(11, 5, 5), stranger.id, permission));
    }
}

#[test]
fn face_touching_boxes_only_count_with_borders() {
    let registry = ProtectionRegistry::new();
    registry.add_protection(cube(0, 0, 0, 10, 10, 10), player("A"));

    let touching = (BlockPos::new(10, 0, 0), BlockPos::new(20, 10, 10));
    assert!(registry.is_protected_range(touching.0, touching.1));
    assert_eq!(registry.overlapping_boxes(touching.0, touching.1, false, true).len(), 1);
    assert!(registry
        .overlapping_boxes(touching.0, touching.1, false, false)
        .is_empty());
    assert!(!registry.is_protected_range(BlockPos::new(11, 0, 0), BlockPos::new(20, 10, 10)));

    // A one-block claim is found by, and removable through, its own box.
    let speck = cube(50, 50, 50, 50, 50, 50);
    registry.add_protection(speck, player("B"));
    assert_eq!(registry.overlapping_boxes(speck.min(), speck.max(), true, false), vec![speck]);
    assert_eq!(registry.remove_protection(speck).len(), 1);
    assert!(!registry.is_protected(speck.min()));
}

#[test]
fn legacy_tree_is_migrated_on_load() {
    fn node(a: [i32; 3], b: [i32; 3], name: &str) -> Compound {
        let owner = player(name);
        let mut data = Compound::new();
        data.insert("uuid", Tag::String(owner.id.to_string()));
        data.insert("name", Tag::String(owner.name));
        let mut node = Compound::new();
        node.insert("coords1", Tag::IntArray(a.to_vec()));
        node.insert("coords2", Tag::IntArray(b.to_vec()));
        node.insert("data", Tag::Compound(data));
        node
    }

    let mut root = node([40, 0, 0], [50, 10, 10], "Root");
    root.insert("left", Tag::Compound(node([0, 0, 0], [10, 10, 10], "Left")));
    root.insert("right", Tag::Compound(node([90, 0, 0], [80, 10, 10], "Right")));
    let mut container = Compound::new();
    container.insert(LEGACY_CLAIMS_KEY, Tag::Compound(root));

    let registry = ProtectionRegistry::new();
    assert_eq!(registry.load(&mut container), 3);
    assert!(!container.contains_key(LEGACY_CLAIMS_KEY));
    assert_eq!(registry.protections_of(player("Right").id).len(), 1);
    assert_eq!(
        registry
            .region_at_min_corner(BlockPos::new(80, 0, 0))
            .map(|region| region.bounds.max()),
        Some(BlockPos::new(90, 10, 10))
    );

    // The next save writes the flat layout only.
    registry.save(&mut container);
    assert_eq!(container.get_list(PROPERTIES_KEY).map(<[Tag]>::len), Some(3));
    assert!(!container.contains_key(LEGACY_CLAIMS_KEY));
}

#[test]
fn corrupt_entry_does_not_block_the_rest() {
    let registry = ProtectionRegistry::new();
    registry.add_protection(cube(0, 0, 0, 4, 4, 4), player("A"));
    registry.add_protection(cube(10, 0, 0, 14, 4, 4), player("B"));
    let mut container = Compound::new();
    registry.save(&mut container);

    let mut entries = container
        .get_list(PROPERTIES_KEY)
        .map(<[Tag]>::to_vec)
        .unwrap_or_default();
    entries.insert(1, Tag::String("garbage".into()));
    let mut half_written = Compound::new();
    half_written.put_pos("min", BlockPos::new(30, 0, 0));
    half_written.insert("owner", Tag::Int(3));
    entries.push(Tag::Compound(half_written));
    container.insert(PROPERTIES_KEY, Tag::List(entries));

    let restored = ProtectionRegistry::new();
    // The half-written entry decodes with defaults; only the string is dropped.
    assert_eq!(restored.load(&mut container), 3);
    assert_eq!(restored.protections_of(player("A").id).len(), 1);
    assert_eq!(restored.protections_of(player("B").id).len(), 1);
}

proptest! {
    /// Property: toggling one bit changes the answer for that permission and
    /// a plain stranger only.
    #[test]
    fn permission_bit_gates_strangers_only(
        granted in arb_permission(),
        asked in arb_permission(),
    ) {
        let registry = ProtectionRegistry::new();
        let owner = player("Owner");
        let friend = player("Friend");
        let stranger = player("Stranger");
        let region = registry.add_protection(cube(0, 0, 0, 8, 8, 8), owner.clone());
        registry.add_to_whitelist(region.id, friend.clone()).expect("region exists");
        let pos = BlockPos::new(4, 4, 4);

        prop_assert!(registry.is_protected_against(pos, stranger.id, asked));
        registry.set_permission(region.id, granted, true).expect("region exists");

        prop_assert_eq!(
            registry.is_protected_against(pos, stranger.id, asked),
            asked != granted
        );
        prop_assert!(!registry.is_protected_against(pos, owner.id, asked));
        prop_assert!(!registry.is_protected_against(pos, friend.id, asked));

        registry.set_permission(region.id, granted, false).expect("region exists");
        prop_assert!(registry.is_protected_against(pos, stranger.id, asked));
    }
}

#[test]
fn readers_see_consistent_state_while_a_writer_runs() {
    let registry = Arc::new(ProtectionRegistry::new());
    let anchor = player("Anchor");
    registry.add_protection(cube(-100, 0, -100, -90, 10, -90), anchor.clone());

    let writer = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let owner = player("Writer");
            for i in 0..200 {
                let bounds = cube(i * 4, 0, 0, i * 4 + 2, 2, 2);
                registry
                    .try_add_protection(bounds, owner.clone())
                    .expect("writer claims never overlap");
                if i % 2 == 0 {
                    assert_eq!(registry.remove_protection(bounds).len(), 1);
                }
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let anchor = anchor.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    assert!(registry.is_protected(BlockPos::new(-95, 5, -95)));
                    assert!(!registry.is_protected_against(
                        BlockPos::new(-95, 5, -95),
                        anchor.id,
                        Permission::BlockBreak
                    ));
                    let listed = registry.list().len();
                    assert!(listed >= 1);
                }
            })
        })
        .collect();

    writer.join().expect("writer panicked");
    for reader in readers {
        reader.join().expect("reader panicked");
    }
    assert_eq!(registry.len(), 101);
    assert_eq!(registry.protections_of(player("Writer").id).len(), 100);
}

#[test]
fn sorted_road_claims_survive_a_reload() {
    // Every plot sorts after the previous one, so the tree is one long chain.
    let registry = ProtectionRegistry::new();
    let owner = player("Surveyor");
    for i in 0..ROAD_PLOTS {
        registry.add_protection(cube(i * 8, 60, 0, i * 8 + 4, 70, 4), owner.clone());
    }
    assert_eq!(registry.tree_depth(), ROAD_PLOTS as usize);

    let mut container = Compound::new();
    registry.save(&mut container);
    let restored = ProtectionRegistry::new();
    assert_eq!(restored.load(&mut container), ROAD_PLOTS as usize);
    assert_eq!(restored.tree_depth(), registry.tree_depth());

    let far_end = BlockPos::new((ROAD_PLOTS - 1) * 8 + 2, 65, 2);
    assert!(restored.is_protected(far_end));
    assert!(!restored.is_protected(BlockPos::new((ROAD_PLOTS - 1) * 8 + 6, 65, 2)));
    let last = restored.region_at_min_corner(BlockPos::new((ROAD_PLOTS - 1) * 8, 60, 0));
    let last = last.expect("last plot indexed");
    assert_eq!(restored.remove_protection(last.bounds).len(), 1);
    assert!(!restored.is_protected(far_end));
    assert_eq!(restored.len(), ROAD_PLOTS as usize - 1);
}

#[test]
fn registry_scenarios_worldtest() {
    let test_start = Instant::now();
    let mut assertions = 0usize;
    let log_path = std::env::current_dir()
        .unwrap()
        .join("target/metrics/registry_scenarios_worldtest.jsonl");
    let mut events = JsonlSink::create(&log_path).expect("Failed to create event log");

    println!("\n=== Registry Scenarios Worldtest ===");
    println!("  Claims: {}x{} grid, edge {}", GRID, GRID, CLAIM_EDGE);

    // Phase 1: claim a grid of plots, one owner per row.
    let registry = ProtectionRegistry::new();
    let owners: Vec<_> = (0..GRID).map(|row| player(&format!("Row{}", row))).collect();
    for gz in 0..GRID {
        for gx in 0..GRID {
            let min = BlockPos::new(gx * SPACING, 60, gz * SPACING);
            let bounds = BlockBox::new(
                min,
                BlockPos::new(min.x + CLAIM_EDGE, 80, min.z + CLAIM_EDGE),
            );
            registry
                .try_add_protection(bounds, owners[gz as usize].clone())
                .expect("grid plots are disjoint");
        }
        events
            .record("claim", registry.len(), format!("row {} by {}", gz, owners[gz as usize]))
            .expect("event written");
    }
    assert_eq!(registry.len(), (GRID * GRID) as usize);
    assertions += 1;

    // Phase 2: point queries across the whole grid.
    let query_start = Instant::now();
    let mut point_queries = 0usize;
    let mut protected_hits = 0usize;
    for x in (0..GRID * SPACING).step_by(3) {
        for z in (0..GRID * SPACING).step_by(3) {
            point_queries += 1;
            let inside = x % SPACING <= CLAIM_EDGE && z % SPACING <= CLAIM_EDGE;
            let protected = registry.is_protected(BlockPos::new(x, 70, z));
            assert_eq!(protected, inside, "query at ({}, 70, {})", x, z);
            assertions += 1;
            if protected {
                protected_hits += 1;
            }
        }
    }
    let avg_query_time_us = query_start.elapsed().as_micros() as f64 / point_queries as f64;
    events
        .record(
            "check",
            registry.len(),
            format!("{} points, {} protected", point_queries, protected_hits),
        )
        .expect("event written");
    println!(
        "  {} point queries, {} protected, {:.2}us avg, depth {}",
        point_queries,
        protected_hits,
        avg_query_time_us,
        registry.tree_depth()
    );

    // Phase 3: wipe one row and check its plots are open again.
    let removed = registry.remove_protections_of(owners[3].id);
    assert_eq!(removed.len(), GRID as usize);
    events
        .record("remove", registry.len(), format!("{} plots of {}", removed.len(), owners[3]))
        .expect("event written");
    assert!(!registry.is_protected(BlockPos::new(5, 70, 3 * SPACING + 5)));
    assert!(registry
        .try_add_protection(
            cube(0, 60, 3 * SPACING, 8, 80, 3 * SPACING + 8),
            player("Newcomer")
        )
        .is_ok());
    assertions += 3;

    // Phase 4: save and reload through the claim file.
    let dir = tempfile::tempdir().expect("temp dir");
    let store = ClaimStore::new(dir.path()).expect("store");
    let save_start = Instant::now();
    store.save(&registry).expect("save");
    let save_time_us = save_start.elapsed().as_micros();
    let bytes_written = std::fs::metadata(store.path()).map(|m| m.len()).unwrap_or(0);

    let restored = ProtectionRegistry::new();
    let load_start = Instant::now();
    let regions_loaded = store.load(&restored).expect("load");
    let load_time_us = load_start.elapsed().as_micros();
    assert_eq!(regions_loaded, registry.len());
    assert!(restored.is_protected_against(
        BlockPos::new(5, 70, 5),
        Uuid::new_v4(),
        Permission::BlockBreak
    ));
    assertions += 2;
    events
        .record("load", restored.len(), format!("{} bytes", bytes_written))
        .expect("event written");
    assert_eq!(events.steps(), GRID as u64 + 3);
    assertions += 1;

    let metrics = MetricsReportBuilder::new("registry_scenarios_worldtest")
        .result(TestResult::Pass)
        .registry(RegistryMetrics {
            regions: registry.len(),
            tree_depth: registry.tree_depth(),
            point_queries,
            protected_hits,
            avg_query_time_us,
            removals: removed.len(),
        })
        .persistence(PersistenceMetrics {
            regions_saved: registry.len(),
            regions_loaded,
            save_time_us,
            load_time_us,
            bytes_written,
        })
        .execution(TestExecutionMetrics {
            duration_seconds: test_start.elapsed().as_secs_f64(),
            assertions_checked: Some(assertions),
            validations_passed: Some(assertions),
        })
        .build();

    let metrics_path = std::env::current_dir()
        .unwrap()
        .join("target/metrics/registry_scenarios_worldtest.json");
    let sink = MetricsSink::create(&metrics_path).expect("Failed to create metrics sink");
    sink.write(&metrics).expect("Failed to write metrics");
    assert!(metrics_path.exists(), "Metrics file should exist");
    assert!(log_path.exists(), "Event log should exist");
}
