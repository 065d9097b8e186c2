//! Closure expansion over staged results.
//!
//! Two algorithms run after the resolver's explicit stage: a single-pass
//! backfill of the points every staged line references, and the transitive
//! backfill of groups referencing anything staged. The group fixpoint is
//! frontier-based: each pass only looks at parents of the ids added by the
//! previous pass and drops candidates that are already staged before they
//! are counted, so a membership cycle contributes nothing new and the loop
//! terminates.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::MemberKind;
use crate::stage::StagingStore;
use crate::store::{Selection, Session};

/// Fetches every point referenced by a staged line but not yet staged.
/// One pass suffices: points reference nothing themselves.
pub fn point_backfill(session: &Session, staging: &mut StagingStore) -> Result<usize> {
    let mut missing = BTreeSet::new();
    for line in staging.lines() {
        for id in &line.refs {
            if !staging.contains_point(*id) {
                missing.insert(*id);
            }
        }
    }
    if missing.is_empty() {
        return Ok(0);
    }
    let ids: Vec<_> = missing.into_iter().collect();
    staging.union_points(session, &Selection::Ids(&ids))
}

/// Stages every group reachable from the staged sets by following "is
/// referenced by" over the membership graph.
///
/// Stage 1 seeds from staged points and lines; stage 2 iterates parent
/// groups of the previous pass's additions until a pass adds nothing.
pub fn group_backfill(session: &Session, staging: &mut StagingStore) -> Result<usize> {
    let mut total = 0;

    let mut frontier = Vec::new();
    for (kind, ids) in [
        (MemberKind::Point, staging.point_ids()),
        (MemberKind::Line, staging.line_ids()),
    ] {
        if ids.is_empty() {
            continue;
        }
        let candidates = session.groups_referencing(kind, &ids)?;
        frontier.extend(staging.union_group_rows(candidates));
    }
    total += frontier.len();

    // fixpoint over group-in-group membership
    while !frontier.is_empty() {
        let candidates = session.groups_referencing(MemberKind::Group, &frontier)?;
        frontier = staging.union_group_rows(candidates);
        total += frontier.len();
    }
    Ok(total)
}
