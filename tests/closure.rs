use chrono::{DateTime, TimeZone, Utc};
use oxapi::closure::{group_backfill, point_backfill};
use oxapi::model::{Group, Line, Member, MemberKind, Point, TagMap};
use oxapi::stage::StagingStore;
use oxapi::store::{Selection, Session, Store};

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()
}

fn point(id: i64, lon: f64, lat: f64) -> Point {
    Point {
        id,
        version: 1,
        changeset: 9,
        uid: 7,
        user: None,
        timestamp: ts(),
        lon,
        lat,
        tags: TagMap::new(),
    }
}

fn line(id: i64, refs: &[i64]) -> Line {
    Line {
        id,
        version: 1,
        changeset: 9,
        uid: 7,
        user: None,
        timestamp: ts(),
        tags: TagMap::new(),
        refs: refs.to_vec(),
    }
}

fn group(id: i64, members: Vec<Member>) -> Group {
    Group {
        id,
        version: 1,
        changeset: 9,
        uid: 7,
        user: None,
        timestamp: ts(),
        tags: TagMap::new(),
        members,
    }
}

fn member(kind: MemberKind, target: i64) -> Member {
    Member { kind, target, role: String::new() }
}

fn setup() -> (Store, Session) {
    let store = Store::open_in_memory().expect("open store");
    let session = store.session().expect("session");
    (store, session)
}

#[test]
fn point_backfill_completes_line_geometry() {
    let (_store, session) = setup();
    for id in 1..=3 {
        session.insert_point(&point(id, id as f64, 0.0)).expect("insert point");
    }
    // repeats in the geometry must not confuse the backfill
    session.insert_line(&line(10, &[1, 2, 3, 2])).expect("insert line");

    let mut staging = StagingStore::new();
    staging
        .materialize_lines(&session, &Selection::Ids(&[10]))
        .expect("materialize");
    assert_eq!(staging.point_count(), 0);

    let added = point_backfill(&session, &mut staging).expect("backfill");
    assert_eq!(added, 3);
    for line in staging.lines() {
        for id in &line.refs {
            assert!(staging.contains_point(*id), "point {id} missing after backfill");
        }
    }
}

#[test]
fn point_backfill_skips_already_staged_points() {
    let (_store, session) = setup();
    for id in 1..=2 {
        session.insert_point(&point(id, id as f64, 0.0)).expect("insert point");
    }
    session.insert_line(&line(10, &[1, 2])).expect("insert line");

    let mut staging = StagingStore::new();
    staging
        .materialize_points(&session, &Selection::Ids(&[1]))
        .expect("materialize points");
    staging
        .materialize_lines(&session, &Selection::Ids(&[10]))
        .expect("materialize lines");
    let added = point_backfill(&session, &mut staging).expect("backfill");
    assert_eq!(added, 1, "only the missing point is fetched");
}

#[test]
fn group_fixpoint_follows_membership_chain() {
    let (_store, session) = setup();
    session.insert_point(&point(1, 0.0, 0.0)).expect("insert point");
    // G101 references the point, G102 references G101, G103 references G102
    session
        .insert_group(&group(101, vec![member(MemberKind::Point, 1)]))
        .expect("insert group");
    session
        .insert_group(&group(102, vec![member(MemberKind::Group, 101)]))
        .expect("insert group");
    session
        .insert_group(&group(103, vec![member(MemberKind::Group, 102)]))
        .expect("insert group");

    let mut staging = StagingStore::new();
    staging
        .materialize_points(&session, &Selection::Ids(&[1]))
        .expect("materialize");
    let added = group_backfill(&session, &mut staging).expect("backfill");
    assert_eq!(added, 3);
    for id in [101, 102, 103] {
        assert!(staging.contains_group(id), "group {id} missing");
    }
}

#[test]
fn group_cycle_terminates() {
    let (_store, session) = setup();
    session.insert_point(&point(1, 0.0, 0.0)).expect("insert point");
    // mutual membership: 201 <-> 202; only 201 references the point
    session
        .insert_group(&group(
            201,
            vec![member(MemberKind::Point, 1), member(MemberKind::Group, 202)],
        ))
        .expect("insert group");
    session
        .insert_group(&group(202, vec![member(MemberKind::Group, 201)]))
        .expect("insert group");

    let mut staging = StagingStore::new();
    staging
        .materialize_points(&session, &Selection::Ids(&[1]))
        .expect("materialize");
    let added = group_backfill(&session, &mut staging).expect("backfill must terminate");
    assert_eq!(added, 2);
    assert!(staging.contains_group(201));
    assert!(staging.contains_group(202));
}

#[test]
fn group_backfill_adds_each_row_at_most_once() {
    let (_store, session) = setup();
    session.insert_point(&point(1, 0.0, 0.0)).expect("insert point");
    session
        .insert_group(&group(101, vec![member(MemberKind::Point, 1)]))
        .expect("insert group");
    session
        .insert_group(&group(102, vec![member(MemberKind::Group, 101)]))
        .expect("insert group");

    let mut staging = StagingStore::new();
    staging
        .materialize_points(&session, &Selection::Ids(&[1]))
        .expect("materialize");
    assert_eq!(group_backfill(&session, &mut staging).expect("first run"), 2);
    // a second run over the same staging finds nothing new
    assert_eq!(group_backfill(&session, &mut staging).expect("second run"), 0);
    assert_eq!(staging.group_count(), 2);
}

#[test]
fn groups_referencing_lines_are_seeded_in_stage_one() {
    let (_store, session) = setup();
    session.insert_point(&point(1, 0.0, 0.0)).expect("insert point");
    session.insert_line(&line(10, &[1])).expect("insert line");
    session
        .insert_group(&group(301, vec![member(MemberKind::Line, 10)]))
        .expect("insert group");

    let mut staging = StagingStore::new();
    staging
        .materialize_lines(&session, &Selection::Ids(&[10]))
        .expect("materialize");
    group_backfill(&session, &mut staging).expect("backfill");
    assert!(staging.contains_group(301));
}
