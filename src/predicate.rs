//! The predicate compiler.
//!
//! A client filter arrives as bracketed clause groups, `[k1=v1][k2=v2]...`,
//! implicitly ANDed. Each group splits on the first `=`; the left side
//! selects the clause kind (`@uid`, `@changeset`, `bbox`, or a tag key
//! list) and the right side carries its literal(s). A tag group such as
//! `[amenity|shop=cafe|*]` is a disjunction over the cross product of its
//! `|`-separated keys and values, where `*` means "key present with any
//! value". Clauses keep their left-to-right discovery order so the lowered
//! filter is deterministic.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{OxapiError, Result};
use crate::model::BoundingBox;

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    UserEquals(i64),
    ChangesetEquals(i64),
    BBoxIntersects(BoundingBox),
    /// OR over every (key, value) pair of keys x values; a value of `*`
    /// matches any value for that key.
    TagMatch { keys: Vec<String>, values: Vec<String> },
}

/// An ordered conjunction of clauses, ready for lowering by the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// Compiles a raw predicate string into clauses.
    pub fn compile(text: &str) -> Result<Self> {
        lazy_static! {
            static ref GROUP: Regex = Regex::new(r"\[([^\[\]]*)\]").expect("static regex");
        }
        let mut clauses = Vec::new();
        let mut consumed = 0;
        for captures in GROUP.captures_iter(text) {
            let whole = captures.get(0).expect("whole match");
            consumed += whole.len();
            let body = captures.get(1).expect("group body").as_str();
            clauses.push(parse_clause(body)?);
        }
        // Anything outside the bracket groups is a syntax error, not
        // something to silently skip.
        if consumed != text.len() {
            return Err(OxapiError::InvalidInput(format!(
                "malformed predicate '{text}': expected only [key=value] groups"
            )));
        }
        Ok(Self { clauses })
    }

    /// The predicate a bare map query boils down to.
    pub fn from_bbox(bbox: BoundingBox) -> Self {
        Self { clauses: vec![Clause::BBoxIntersects(bbox)] }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The bbox of the first bbox clause, if any. The serializer echoes it
    /// back in the document header.
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.clauses.iter().find_map(|clause| match clause {
            Clause::BBoxIntersects(bbox) => Some(*bbox),
            _ => None,
        })
    }
}

fn parse_clause(body: &str) -> Result<Clause> {
    let (left, right) = body.split_once('=').ok_or_else(|| {
        OxapiError::InvalidInput(format!("clause '{body}' is missing '='"))
    })?;
    match left {
        "@uid" => {
            let uid = right.parse().map_err(|_| {
                OxapiError::InvalidInput(format!("non-numeric uid '{right}'"))
            })?;
            Ok(Clause::UserEquals(uid))
        }
        "@changeset" => {
            let id = right.parse().map_err(|_| {
                OxapiError::InvalidInput(format!("non-numeric changeset '{right}'"))
            })?;
            Ok(Clause::ChangesetEquals(id))
        }
        "bbox" => Ok(Clause::BBoxIntersects(BoundingBox::parse(right)?)),
        _ => {
            if left.is_empty() {
                return Err(OxapiError::InvalidInput(format!(
                    "clause '{body}' has an empty key"
                )));
            }
            Ok(Clause::TagMatch {
                keys: left.split('|').map(str::to_owned).collect(),
                values: right.split('|').map(str::to_owned).collect(),
            })
        }
    }
}
