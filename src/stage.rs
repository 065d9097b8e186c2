//! Per-request staging sets.
//!
//! One request materializes its matched and derived rows into a
//! [`StagingStore`]: three id-keyed sets, append-only for the lifetime of
//! the request and discarded with it. A row that is already staged is
//! never replaced, so closure passes cannot mutate earlier results, and
//! `BTreeMap` keying hands the serializer its ascending-id order.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{EntityId, Group, Line, Point};
use crate::store::{Selection, Session};

#[derive(Debug, Default)]
pub struct StagingStore {
    points: BTreeMap<EntityId, Point>,
    lines: BTreeMap<EntityId, Line>,
    groups: BTreeMap<EntityId, Group>,
}

impl StagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------- Materialize (create from filter) -------------

    /// Replaces the point set with the rows matching `selection`,
    /// returning the match count. Zero is a valid outcome; the resolver
    /// decides whether it means not-found.
    pub fn materialize_points(
        &mut self,
        session: &Session,
        selection: &Selection,
    ) -> Result<usize> {
        self.points.clear();
        self.union_points(session, selection)
    }

    pub fn materialize_lines(
        &mut self,
        session: &Session,
        selection: &Selection,
    ) -> Result<usize> {
        self.lines.clear();
        self.union_lines(session, selection)
    }

    pub fn materialize_groups(
        &mut self,
        session: &Session,
        selection: &Selection,
    ) -> Result<usize> {
        self.groups.clear();
        self.union_groups(session, selection)
    }

    // ------------- Union (add rows matching filter) -------------

    pub fn union_points(
        &mut self,
        session: &Session,
        selection: &Selection,
    ) -> Result<usize> {
        let rows = session.points(selection)?;
        Ok(Self::merge(&mut self.points, rows, |point| point.id))
    }

    pub fn union_lines(
        &mut self,
        session: &Session,
        selection: &Selection,
    ) -> Result<usize> {
        let rows = session.lines(selection)?;
        Ok(Self::merge(&mut self.lines, rows, |line| line.id))
    }

    pub fn union_groups(
        &mut self,
        session: &Session,
        selection: &Selection,
    ) -> Result<usize> {
        let rows = session.groups(selection)?;
        Ok(Self::merge(&mut self.groups, rows, |group| group.id))
    }

    /// Unions pre-fetched group rows, returning the ids actually added.
    /// The closure engine uses the added set as the next pass frontier.
    pub fn union_group_rows(&mut self, rows: Vec<Group>) -> Vec<EntityId> {
        let mut added = Vec::new();
        for group in rows {
            if !self.groups.contains_key(&group.id) {
                added.push(group.id);
                self.groups.insert(group.id, group);
            }
        }
        added
    }

    fn merge<T>(
        set: &mut BTreeMap<EntityId, T>,
        rows: Vec<T>,
        id_of: impl Fn(&T) -> EntityId,
    ) -> usize {
        let mut added = 0;
        for row in rows {
            let id = id_of(&row);
            if !set.contains_key(&id) {
                set.insert(id, row);
                added += 1;
            }
        }
        added
    }

    // ------------- Membership & iteration -------------

    pub fn contains_point(&self, id: EntityId) -> bool {
        self.points.contains_key(&id)
    }

    pub fn contains_group(&self, id: EntityId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Staged points in ascending-id order.
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.values()
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn point_ids(&self) -> Vec<EntityId> {
        self.points.keys().copied().collect()
    }

    pub fn line_ids(&self) -> Vec<EntityId> {
        self.lines.keys().copied().collect()
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
