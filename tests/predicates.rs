use oxapi::error::OxapiError;
use oxapi::predicate::{Clause, Predicate};

#[test]
fn clause_count_matches_bracket_groups() {
    let cases = [
        ("", 0),
        ("[amenity=cafe]", 1),
        ("[@uid=42][amenity=cafe]", 2),
        ("[@uid=42][@changeset=7][highway=*]", 3),
    ];
    for (text, expected) in cases {
        let predicate = Predicate::compile(text).expect("compile ok");
        assert_eq!(predicate.len(), expected, "clause count for {text:?}");
    }
}

#[test]
fn clause_order_matches_bracket_order() {
    let predicate = Predicate::compile("[@uid=42][@changeset=7][amenity=cafe]").expect("compile ok");
    assert!(matches!(predicate.clauses()[0], Clause::UserEquals(42)));
    assert!(matches!(predicate.clauses()[1], Clause::ChangesetEquals(7)));
    match &predicate.clauses()[2] {
        Clause::TagMatch { keys, values } => {
            assert_eq!(keys, &["amenity"]);
            assert_eq!(values, &["cafe"]);
        }
        other => panic!("expected tag clause, got {other:?}"),
    }
}

#[test]
fn tag_clause_key_value_lists() {
    let predicate = Predicate::compile("[amenity|shop=cafe|*]").expect("compile ok");
    match &predicate.clauses()[0] {
        Clause::TagMatch { keys, values } => {
            assert_eq!(keys, &["amenity", "shop"]);
            assert_eq!(values, &["cafe", "*"]);
        }
        other => panic!("expected tag clause, got {other:?}"),
    }
}

#[test]
fn bbox_clause_parses_and_is_echoed() {
    let predicate = Predicate::compile("[bbox=-0.5,51.2,0.5,51.8]").expect("compile ok");
    let bbox = predicate.bbox().expect("bbox clause present");
    assert_eq!(bbox.minlon(), -0.5);
    assert_eq!(bbox.minlat(), 51.2);
    assert_eq!(bbox.maxlon(), 0.5);
    assert_eq!(bbox.maxlat(), 51.8);
}

#[test]
fn bbox_left_greater_than_right() {
    let err = Predicate::compile("[bbox=10,20,5,30]").unwrap_err();
    assert!(matches!(err, OxapiError::BBox(_)), "got {err:?}");
    assert!(format!("{err}").contains("left>right"));
}

#[test]
fn bbox_latitude_out_of_range() {
    let err = Predicate::compile("[bbox=10,100,20,30]").unwrap_err();
    assert!(matches!(err, OxapiError::BBox(_)), "got {err:?}");
    assert!(format!("{err}").contains("latitude out of range"));
}

#[test]
fn bbox_longitude_out_of_range() {
    let err = Predicate::compile("[bbox=-200,10,20,30]").unwrap_err();
    assert!(format!("{err}").contains("longitude out of range"));
}

#[test]
fn bbox_bottom_greater_than_top() {
    let err = Predicate::compile("[bbox=10,40,20,30]").unwrap_err();
    assert!(format!("{err}").contains("bottom>top"));
}

#[test]
fn bbox_wrong_arity_is_invalid_input() {
    for text in ["[bbox=1,2,3]", "[bbox=1,2,3,4,5]", "[bbox=a,2,3,4]"] {
        let err = Predicate::compile(text).unwrap_err();
        assert!(matches!(err, OxapiError::InvalidInput(_)), "{text} -> {err:?}");
    }
}

#[test]
fn non_numeric_uid_and_changeset_rejected() {
    for text in ["[@uid=abc]", "[@changeset=1.5]"] {
        let err = Predicate::compile(text).unwrap_err();
        assert!(matches!(err, OxapiError::InvalidInput(_)), "{text} -> {err:?}");
    }
}

#[test]
fn text_outside_bracket_groups_rejected() {
    for text in ["amenity=cafe", "[amenity=cafe]junk", "junk[amenity=cafe]"] {
        let err = Predicate::compile(text).unwrap_err();
        assert!(matches!(err, OxapiError::InvalidInput(_)), "{text} -> {err:?}");
    }
}

#[test]
fn clause_missing_equals_rejected() {
    let err = Predicate::compile("[amenity]").unwrap_err();
    assert!(format!("{err}").contains("missing '='"));
}
