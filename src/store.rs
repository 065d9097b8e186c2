//! SQLite storage adapter.
//!
//! The snapshot lives in the osmosis-style tables created by
//! [`Store::open`]. Every request gets its own [`Session`] (its own
//! connection), scoped to the request and released on drop. Compiled
//! predicates are lowered here, and only here, into SQL text with `?`
//! parameter slots; client-supplied literals never reach the SQL text.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params, params_from_iter, types::Value};

use crate::error::{OxapiError, Result};
use crate::model::{EntityId, Group, Line, Member, MemberKind, Point, TagMap};
use crate::predicate::{Clause, Predicate};

/// Upper bound on ids per `in (...)` list, well below SQLite's variable
/// limit. Larger id sets are queried in chunks.
const ID_BATCH: usize = 500;

// ------------- Store -------------
pub struct Store {
    path: String,
    // keeps a shared in-memory database alive across sessions; the mutex
    // exists only so `Store` is `Sync` for the server state
    _anchor: Mutex<Connection>,
}

static MEMORY_SEQ: AtomicU64 = AtomicU64::new(0);

impl Store {
    /// Opens (and if necessary bootstraps) a file-backed snapshot.
    pub fn open(path: &str) -> Result<Self> {
        let anchor = Connection::open(path)?;
        bootstrap(&anchor)?;
        Ok(Self { path: path.to_owned(), _anchor: Mutex::new(anchor) })
    }

    /// Opens a private in-memory snapshot, shared between the sessions of
    /// this store only. Used by tests and ad hoc runs.
    pub fn open_in_memory() -> Result<Self> {
        let seq = MEMORY_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = format!("file:oxapi_mem_{seq}?mode=memory&cache=shared");
        Self::open(&path)
    }

    /// Acquires a session holding its own connection. Dropping the session
    /// releases the connection, whether or not the request succeeded.
    pub fn session(&self) -> Result<Session> {
        Ok(Session { conn: Connection::open(&self.path)? })
    }
}

fn bootstrap(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        create table if not exists nodes (
            id integer not null primary key,
            version integer not null,
            changeset_id integer not null,
            user_id integer not null,
            user_name text null,
            tstamp text not null,
            lon real not null,
            lat real not null
        );
        create table if not exists node_tags (
            node_id integer not null references nodes(id),
            k text not null,
            v text not null
        );
        create table if not exists ways (
            id integer not null primary key,
            version integer not null,
            changeset_id integer not null,
            user_id integer not null,
            user_name text null,
            tstamp text not null
        );
        create table if not exists way_nodes (
            way_id integer not null references ways(id),
            node_id integer not null,
            sequence_id integer not null
        );
        create table if not exists way_tags (
            way_id integer not null references ways(id),
            k text not null,
            v text not null
        );
        create table if not exists relations (
            id integer not null primary key,
            version integer not null,
            changeset_id integer not null,
            user_id integer not null,
            user_name text null,
            tstamp text not null
        );
        create table if not exists relation_members (
            relation_id integer not null references relations(id),
            member_type text not null,
            member_id integer not null,
            member_role text not null,
            sequence_id integer not null
        );
        create table if not exists relation_tags (
            relation_id integer not null references relations(id),
            k text not null,
            v text not null
        );
        create table if not exists replication_state (
            tstamp text not null
        );
        create index if not exists idx_way_nodes_way on way_nodes(way_id);
        create index if not exists idx_way_nodes_node on way_nodes(node_id);
        create index if not exists idx_relation_members_rel on relation_members(relation_id);
        create index if not exists idx_relation_members_target on relation_members(member_type, member_id);
        ",
    )?;
    Ok(())
}

// ------------- Selection -------------
/// What to pull from a table: an explicit id set or a compiled predicate.
#[derive(Debug)]
pub enum Selection<'a> {
    Ids(&'a [EntityId]),
    Matching(&'a Predicate),
}

// storage encoding of member kinds; used nowhere else
fn kind_to_code(kind: MemberKind) -> &'static str {
    match kind {
        MemberKind::Point => "N",
        MemberKind::Line => "W",
        MemberKind::Group => "R",
    }
}

fn code_to_kind(code: &str) -> Result<MemberKind> {
    match code {
        "N" => Ok(MemberKind::Point),
        "W" => Ok(MemberKind::Line),
        "R" => Ok(MemberKind::Group),
        other => Err(OxapiError::Store(format!("unknown member type code '{other}'"))),
    }
}

// ------------- Predicate lowering -------------
/// Lowers a predicate into a WHERE fragment plus its bound parameters for
/// one entity kind. Clauses keep compile order, ANDed together.
fn lower(kind: MemberKind, predicate: &Predicate) -> (String, Vec<Value>) {
    let mut fragments = Vec::new();
    let mut bound = Vec::new();
    for clause in predicate.clauses() {
        match clause {
            Clause::UserEquals(uid) => {
                fragments.push("user_id = ?".to_owned());
                bound.push(Value::from(*uid));
            }
            Clause::ChangesetEquals(id) => {
                fragments.push("changeset_id = ?".to_owned());
                bound.push(Value::from(*id));
            }
            Clause::BBoxIntersects(bbox) => match kind {
                MemberKind::Point => {
                    fragments.push(
                        "(lon between ? and ? and lat between ? and ?)".to_owned(),
                    );
                    bound.push(Value::from(bbox.minlon()));
                    bound.push(Value::from(bbox.maxlon()));
                    bound.push(Value::from(bbox.minlat()));
                    bound.push(Value::from(bbox.maxlat()));
                }
                MemberKind::Line => {
                    // a line intersects when any of its points does
                    fragments.push(
                        "exists (select 1 from way_nodes wn \
                         join nodes n on n.id = wn.node_id \
                         where wn.way_id = ways.id \
                         and n.lon between ? and ? and n.lat between ? and ?)"
                            .to_owned(),
                    );
                    bound.push(Value::from(bbox.minlon()));
                    bound.push(Value::from(bbox.maxlon()));
                    bound.push(Value::from(bbox.minlat()));
                    bound.push(Value::from(bbox.maxlat()));
                }
                // groups only reach a bbox result through closure
                MemberKind::Group => fragments.push("0 = 1".to_owned()),
            },
            Clause::TagMatch { keys, values } => {
                let (table, fk, id_col) = match kind {
                    MemberKind::Point => ("node_tags", "node_id", "nodes.id"),
                    MemberKind::Line => ("way_tags", "way_id", "ways.id"),
                    MemberKind::Group => ("relation_tags", "relation_id", "relations.id"),
                };
                let mut pairs = Vec::new();
                for key in keys {
                    for value in values {
                        if value == "*" {
                            pairs.push("t.k = ?".to_owned());
                            bound.push(Value::from(key.clone()));
                        } else {
                            pairs.push("(t.k = ? and t.v = ?)".to_owned());
                            bound.push(Value::from(key.clone()));
                            bound.push(Value::from(value.clone()));
                        }
                    }
                }
                fragments.push(format!(
                    "exists (select 1 from {table} t where t.{fk} = {id_col} and ({}))",
                    pairs.join(" or ")
                ));
            }
        }
    }
    if fragments.is_empty() {
        fragments.push("1 = 1".to_owned());
    }
    (fragments.join(" and "), bound)
}

fn id_list_fragment(count: usize) -> String {
    let slots = vec!["?"; count].join(",");
    format!("id in ({slots})")
}

// ------------- Session -------------
/// One logical session against the snapshot, held for at most one request.
pub struct Session {
    conn: Connection,
}

impl Session {
    pub fn points(&self, selection: &Selection) -> Result<Vec<Point>> {
        self.each_batch(selection, MemberKind::Point, |session, fragment, bound| {
            session.query_points(fragment, bound)
        })
    }

    pub fn lines(&self, selection: &Selection) -> Result<Vec<Line>> {
        self.each_batch(selection, MemberKind::Line, |session, fragment, bound| {
            session.query_lines(fragment, bound)
        })
    }

    pub fn groups(&self, selection: &Selection) -> Result<Vec<Group>> {
        self.each_batch(selection, MemberKind::Group, |session, fragment, bound| {
            session.query_groups(fragment, bound)
        })
    }

    /// Groups holding a member of the given kind referencing any of `ids`.
    pub fn groups_referencing(
        &self,
        kind: MemberKind,
        ids: &[EntityId],
    ) -> Result<Vec<Group>> {
        let mut found = Vec::new();
        for chunk in ids.chunks(ID_BATCH) {
            let slots = vec!["?"; chunk.len()].join(",");
            let fragment = format!(
                "exists (select 1 from relation_members m \
                 where m.relation_id = relations.id \
                 and m.member_type = ? and m.member_id in ({slots}))"
            );
            let mut bound = vec![Value::from(kind_to_code(kind).to_owned())];
            bound.extend(chunk.iter().map(|id| Value::from(*id)));
            found.extend(self.query_groups(&fragment, &bound)?);
        }
        Ok(found)
    }

    /// The replication timestamp of the snapshot, when one was recorded.
    pub fn replication_timestamp(&self) -> Result<Option<String>> {
        let mut statement = self
            .conn
            .prepare("select tstamp from replication_state limit 1")?;
        let mut rows = statement.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn each_batch<T>(
        &self,
        selection: &Selection,
        kind: MemberKind,
        run: impl Fn(&Self, &str, &[Value]) -> Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        match selection {
            Selection::Matching(predicate) => {
                let (fragment, bound) = lower(kind, predicate);
                run(self, &fragment, &bound)
            }
            Selection::Ids(ids) => {
                let mut found = Vec::new();
                for chunk in ids.chunks(ID_BATCH) {
                    let fragment = id_list_fragment(chunk.len());
                    let bound: Vec<Value> =
                        chunk.iter().map(|id| Value::from(*id)).collect();
                    found.extend(run(self, &fragment, &bound)?);
                }
                Ok(found)
            }
        }
    }

    fn query_points(&self, fragment: &str, bound: &[Value]) -> Result<Vec<Point>> {
        let sql = format!(
            "select id, version, changeset_id, user_id, user_name, tstamp, lon, lat \
             from nodes where {fragment}"
        );
        let mut statement = self.conn.prepare(&sql)?;
        let mut points = Vec::new();
        let mut rows = statement.query(params_from_iter(bound.iter()))?;
        while let Some(row) = rows.next()? {
            let timestamp: DateTime<Utc> = row.get(5)?;
            points.push(Point {
                id: row.get(0)?,
                version: row.get(1)?,
                changeset: row.get(2)?,
                uid: row.get(3)?,
                user: row.get(4)?,
                timestamp,
                lon: row.get(6)?,
                lat: row.get(7)?,
                tags: TagMap::new(),
            });
        }
        for point in &mut points {
            point.tags = self.tags("node_tags", "node_id", point.id)?;
        }
        Ok(points)
    }

    fn query_lines(&self, fragment: &str, bound: &[Value]) -> Result<Vec<Line>> {
        let sql = format!(
            "select id, version, changeset_id, user_id, user_name, tstamp \
             from ways where {fragment}"
        );
        let mut statement = self.conn.prepare(&sql)?;
        let mut lines = Vec::new();
        let mut rows = statement.query(params_from_iter(bound.iter()))?;
        while let Some(row) = rows.next()? {
            let timestamp: DateTime<Utc> = row.get(5)?;
            lines.push(Line {
                id: row.get(0)?,
                version: row.get(1)?,
                changeset: row.get(2)?,
                uid: row.get(3)?,
                user: row.get(4)?,
                timestamp,
                tags: TagMap::new(),
                refs: Vec::new(),
            });
        }
        let mut refs_statement = self.conn.prepare(
            "select node_id from way_nodes where way_id = ? order by sequence_id",
        )?;
        for line in &mut lines {
            line.tags = self.tags("way_tags", "way_id", line.id)?;
            let mut rows = refs_statement.query(params![line.id])?;
            while let Some(row) = rows.next()? {
                line.refs.push(row.get(0)?);
            }
        }
        Ok(lines)
    }

    fn query_groups(&self, fragment: &str, bound: &[Value]) -> Result<Vec<Group>> {
        let sql = format!(
            "select id, version, changeset_id, user_id, user_name, tstamp \
             from relations where {fragment}"
        );
        let mut statement = self.conn.prepare(&sql)?;
        let mut groups = Vec::new();
        let mut rows = statement.query(params_from_iter(bound.iter()))?;
        while let Some(row) = rows.next()? {
            let timestamp: DateTime<Utc> = row.get(5)?;
            groups.push(Group {
                id: row.get(0)?,
                version: row.get(1)?,
                changeset: row.get(2)?,
                uid: row.get(3)?,
                user: row.get(4)?,
                timestamp,
                tags: TagMap::new(),
                members: Vec::new(),
            });
        }
        let mut members_statement = self.conn.prepare(
            "select member_type, member_id, member_role \
             from relation_members where relation_id = ? order by sequence_id",
        )?;
        for group in &mut groups {
            group.tags = self.tags("relation_tags", "relation_id", group.id)?;
            let mut rows = members_statement.query(params![group.id])?;
            while let Some(row) = rows.next()? {
                let code: String = row.get(0)?;
                group.members.push(Member {
                    kind: code_to_kind(&code)?,
                    target: row.get(1)?,
                    role: row.get(2)?,
                });
            }
        }
        Ok(groups)
    }

    fn tags(&self, table: &str, fk: &str, id: EntityId) -> Result<TagMap> {
        let mut statement = self
            .conn
            .prepare(&format!("select k, v from {table} where {fk} = ?"))?;
        let mut tags = TagMap::new();
        let mut rows = statement.query(params![id])?;
        while let Some(row) = rows.next()? {
            tags.insert(row.get(0)?, row.get(1)?);
        }
        Ok(tags)
    }

    // ------------- Write API -------------
    // The service itself is read-only; these feed the snapshot from an
    // import and seed the integration tests.

    pub fn insert_point(&self, point: &Point) -> Result<()> {
        self.conn.execute(
            "insert into nodes (id, version, changeset_id, user_id, user_name, tstamp, lon, lat) \
             values (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                point.id,
                point.version,
                point.changeset,
                point.uid,
                point.user,
                point.timestamp,
                point.lon,
                point.lat
            ],
        )?;
        self.insert_tags("node_tags", "node_id", point.id, &point.tags)
    }

    pub fn insert_line(&self, line: &Line) -> Result<()> {
        self.conn.execute(
            "insert into ways (id, version, changeset_id, user_id, user_name, tstamp) \
             values (?, ?, ?, ?, ?, ?)",
            params![
                line.id,
                line.version,
                line.changeset,
                line.uid,
                line.user,
                line.timestamp
            ],
        )?;
        for (sequence, node_id) in line.refs.iter().enumerate() {
            self.conn.execute(
                "insert into way_nodes (way_id, node_id, sequence_id) values (?, ?, ?)",
                params![line.id, node_id, sequence as i64],
            )?;
        }
        self.insert_tags("way_tags", "way_id", line.id, &line.tags)
    }

    pub fn insert_group(&self, group: &Group) -> Result<()> {
        self.conn.execute(
            "insert into relations (id, version, changeset_id, user_id, user_name, tstamp) \
             values (?, ?, ?, ?, ?, ?)",
            params![
                group.id,
                group.version,
                group.changeset,
                group.uid,
                group.user,
                group.timestamp
            ],
        )?;
        for (sequence, member) in group.members.iter().enumerate() {
            self.conn.execute(
                "insert into relation_members \
                 (relation_id, member_type, member_id, member_role, sequence_id) \
                 values (?, ?, ?, ?, ?)",
                params![
                    group.id,
                    kind_to_code(member.kind),
                    member.target,
                    member.role,
                    sequence as i64
                ],
            )?;
        }
        self.insert_tags("relation_tags", "relation_id", group.id, &group.tags)
    }

    pub fn set_replication_timestamp(&self, tstamp: &str) -> Result<()> {
        self.conn.execute("delete from replication_state", [])?;
        self.conn.execute(
            "insert into replication_state (tstamp) values (?)",
            params![tstamp],
        )?;
        Ok(())
    }

    fn insert_tags(&self, table: &str, fk: &str, id: EntityId, tags: &TagMap) -> Result<()> {
        let mut statement = self
            .conn
            .prepare(&format!("insert into {table} ({fk}, k, v) values (?, ?, ?)"))?;
        for (key, value) in tags {
            statement.execute(params![id, key, value])?;
        }
        Ok(())
    }
}
