use oxapi::error::OxapiError;
use oxapi::predicate::Clause;
use oxapi::resolver::{RootQuery, SearchKind};
use oxapi::server::{capabilities_document, parse_query_path};

#[test]
fn id_lookup_routes_parse() {
    match parse_query_path("node/1,2,3").expect("parse") {
        RootQuery::ByPointIds(ids) => assert_eq!(ids, vec![1, 2, 3]),
        other => panic!("expected point ids, got {other:?}"),
    }
    match parse_query_path("way/10").expect("parse") {
        RootQuery::ByLineIds(ids) => assert_eq!(ids, vec![10]),
        other => panic!("expected line ids, got {other:?}"),
    }
    match parse_query_path("relation/7,8").expect("parse") {
        RootQuery::ByGroupIds(ids) => assert_eq!(ids, vec![7, 8]),
        other => panic!("expected group ids, got {other:?}"),
    }
}

#[test]
fn malformed_id_list_is_invalid_input() {
    let err = parse_query_path("node/1,x,3").unwrap_err();
    assert!(matches!(err, OxapiError::InvalidInput(_)), "got {err:?}");
}

#[test]
fn predicate_routes_parse_per_kind() {
    let cases = [
        ("node[amenity=cafe]", SearchKind::Point),
        ("way[highway=*]", SearchKind::Line),
        ("relation[type=route]", SearchKind::Group),
        ("*[@uid=42]", SearchKind::Any),
    ];
    for (path, expected) in cases {
        match parse_query_path(path).expect("parse") {
            RootQuery::ByPredicate { kind, predicate } => {
                assert_eq!(kind, expected, "kind for {path}");
                assert_eq!(predicate.len(), 1);
            }
            other => panic!("expected predicate query for {path}, got {other:?}"),
        }
    }
}

#[test]
fn any_kind_uid_clause_compiles() {
    match parse_query_path("*[@uid=42]").expect("parse") {
        RootQuery::ByPredicate { predicate, .. } => {
            assert!(matches!(predicate.clauses()[0], Clause::UserEquals(42)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unrecognized_paths_are_rejected() {
    for path in ["changeset/1", "node", "nodes/1", "node(amenity=cafe)"] {
        let err = parse_query_path(path).unwrap_err();
        assert!(matches!(err, OxapiError::InvalidInput(_)), "{path} -> {err:?}");
    }
}

#[test]
fn capabilities_document_advertises_version_bounds() {
    let document = capabilities_document();
    assert!(document.contains("<version minimum=\"0.6\" maximum=\"0.6\"/>"));
    assert!(document.contains("<area maximum=\"0.25\"/>"));
    assert!(document.contains("<timeout seconds=\"300\"/>"));
    assert!(document.contains("generator=\"oxapi\""));
}
