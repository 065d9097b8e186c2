use chrono::{TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use oxapi::closure::group_backfill;
use oxapi::model::{Group, Member, MemberKind, Point, TagMap};
use oxapi::predicate::Predicate;
use oxapi::stage::StagingStore;
use oxapi::store::{Selection, Store};

fn compile_input(groups: usize) -> String {
    let mut text = String::new();
    for n in 0..groups {
        text.push_str(&format!("[key{n}=value{n}|*]"));
    }
    text
}

fn seeded_chain(depth: usize) -> Store {
    let store = Store::open_in_memory().expect("open store");
    let session = store.session().expect("session");
    session
        .insert_point(&Point {
            id: 1,
            version: 1,
            changeset: 1,
            uid: 1,
            user: None,
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            lon: 0.0,
            lat: 0.0,
            tags: TagMap::new(),
        })
        .expect("insert point");
    // group n references group n-1; the first references the point
    for n in 0..depth {
        let member = if n == 0 {
            Member { kind: MemberKind::Point, target: 1, role: String::new() }
        } else {
            Member { kind: MemberKind::Group, target: 100 + n as i64 - 1, role: String::new() }
        };
        session
            .insert_group(&Group {
                id: 100 + n as i64,
                version: 1,
                changeset: 1,
                uid: 1,
                user: None,
                timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                tags: TagMap::new(),
                members: vec![member],
            })
            .expect("insert group");
    }
    store
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("compile 1", |b| {
        let text = compile_input(1);
        b.iter(|| Predicate::compile(black_box(&text)))
    });
    c.bench_function("compile 16", |b| {
        let text = compile_input(16);
        b.iter(|| Predicate::compile(black_box(&text)))
    });
    c.bench_function("compile 64", |b| {
        let text = compile_input(64);
        b.iter(|| Predicate::compile(black_box(&text)))
    });

    for depth in [4usize, 32, 128] {
        let store = seeded_chain(depth);
        let session = store.session().expect("session");
        c.bench_function(&format!("group closure depth {depth}"), |b| {
            b.iter(|| {
                let mut staging = StagingStore::new();
                staging
                    .materialize_points(&session, &Selection::Ids(&[1]))
                    .expect("materialize");
                group_backfill(&session, &mut staging).expect("backfill")
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
