//! The entity resolver.
//!
//! Given a root query it drives the staging store and the closure engine
//! through the stage sequence for that root kind, yielding either one
//! fully populated staging store or a typed error, never something half
//! built.

use tracing::info;

use crate::closure::{group_backfill, point_backfill};
use crate::error::{OxapiError, Result};
use crate::model::{BoundingBox, EntityId};
use crate::predicate::Predicate;
use crate::stage::StagingStore;
use crate::store::{Selection, Session};

/// Which entity kind a predicate search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Point,
    Line,
    Group,
    Any,
}

#[derive(Debug)]
pub enum RootQuery {
    ByPointIds(Vec<EntityId>),
    ByLineIds(Vec<EntityId>),
    ByGroupIds(Vec<EntityId>),
    ByPredicate { kind: SearchKind, predicate: Predicate },
    ByBoundingBox(BoundingBox),
}

pub fn resolve(session: &Session, query: &RootQuery) -> Result<StagingStore> {
    let mut staging = StagingStore::new();
    match query {
        RootQuery::ByPointIds(ids) => {
            let matched = staging.materialize_points(session, &Selection::Ids(ids))?;
            if matched == 0 {
                return Err(OxapiError::NotFound(format!("node {} not found", join(ids))));
            }
        }
        RootQuery::ByLineIds(ids) => {
            let matched = staging.materialize_lines(session, &Selection::Ids(ids))?;
            if matched == 0 {
                return Err(OxapiError::NotFound(format!("way {} not found", join(ids))));
            }
            point_backfill(session, &mut staging)?;
        }
        RootQuery::ByGroupIds(ids) => {
            // groups are listed by reference; their members stay unresolved
            let matched = staging.materialize_groups(session, &Selection::Ids(ids))?;
            if matched == 0 {
                return Err(OxapiError::NotFound(format!(
                    "relation {} not found",
                    join(ids)
                )));
            }
        }
        RootQuery::ByPredicate { kind, predicate } => {
            // an empty predicate result is a valid, empty document
            let selection = Selection::Matching(predicate);
            if matches!(kind, SearchKind::Point | SearchKind::Any) {
                staging.materialize_points(session, &selection)?;
            }
            if matches!(kind, SearchKind::Line | SearchKind::Any) {
                staging.materialize_lines(session, &selection)?;
                point_backfill(session, &mut staging)?;
            }
            if matches!(kind, SearchKind::Group | SearchKind::Any) {
                staging.materialize_groups(session, &selection)?;
            }
        }
        RootQuery::ByBoundingBox(bbox) => {
            // the only path that runs the full closure engine
            let predicate = Predicate::from_bbox(*bbox);
            let selection = Selection::Matching(&predicate);
            staging.materialize_points(session, &selection)?;
            staging.materialize_lines(session, &selection)?;
            point_backfill(session, &mut staging)?;
            group_backfill(session, &mut staging)?;
        }
    }
    info!(
        points = staging.point_count(),
        lines = staging.line_count(),
        groups = staging.group_count(),
        "query resolved"
    );
    Ok(staging)
}

fn join(ids: &[EntityId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
