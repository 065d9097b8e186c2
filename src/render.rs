//! Streaming serialization of a staged result set.
//!
//! Both renderers make a single pass over the staging store, writing
//! row-by-row to the sink: points, then lines, then groups, ascending id
//! within each kind. Line references and group members keep their stored
//! order; tag order carries no meaning. The external representation uses
//! the OSM names `node`/`way`/`relation`.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use crate::error::Result;
use crate::model::{BoundingBox, Group, Line, MemberKind, Point, TagMap};
use crate::stage::StagingStore;

pub const WIRE_VERSION: &str = "0.6";
pub const GENERATOR: &str = "oxapi";
pub const COPYRIGHT: &str = "OpenStreetMap and contributors";
pub const ATTRIBUTION: &str = "http://www.openstreetmap.org/copyright";
pub const LICENSE: &str = "http://opendatacommons.org/licenses/odbl/1-0/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Xml,
    Json,
}

impl Format {
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Xml => "text/xml; charset=utf-8",
            Format::Json => "application/json; charset=utf-8",
        }
    }
}

/// Header metadata gathered by the caller before rendering starts.
#[derive(Debug, Default, Clone)]
pub struct DocumentMeta {
    /// Replication timestamp of the snapshot, echoed when present.
    pub timestamp: Option<String>,
    /// Bounding box echo for map queries.
    pub bounds: Option<BoundingBox>,
}

pub fn render(
    staging: &StagingStore,
    meta: &DocumentMeta,
    format: Format,
    sink: &mut dyn Write,
) -> Result<()> {
    match format {
        Format::Xml => render_xml(staging, meta, sink),
        Format::Json => render_json(staging, meta, sink),
    }
}

fn wire_kind(kind: MemberKind) -> &'static str {
    match kind {
        MemberKind::Point => "node",
        MemberKind::Line => "way",
        MemberKind::Group => "relation",
    }
}

fn wire_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ------------- XML -------------

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_xml(staging: &StagingStore, meta: &DocumentMeta, sink: &mut dyn Write) -> Result<()> {
    writeln!(sink, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    write!(
        sink,
        "<osm version=\"{WIRE_VERSION}\" generator=\"{GENERATOR}\" copyright=\"{COPYRIGHT}\" \
         attribution=\"{ATTRIBUTION}\" license=\"{LICENSE}\""
    )?;
    if let Some(timestamp) = &meta.timestamp {
        write!(sink, " timestamp=\"{}\"", escape(timestamp))?;
    }
    writeln!(sink, ">")?;
    if let Some(bounds) = &meta.bounds {
        writeln!(
            sink,
            "<bounds minlon=\"{}\" minlat=\"{}\" maxlon=\"{}\" maxlat=\"{}\"/>",
            bounds.minlon(),
            bounds.minlat(),
            bounds.maxlon(),
            bounds.maxlat()
        )?;
    }
    for point in staging.points() {
        xml_point(point, sink)?;
    }
    for line in staging.lines() {
        xml_line(line, sink)?;
    }
    for group in staging.groups() {
        xml_group(group, sink)?;
    }
    writeln!(sink, "</osm>")?;
    Ok(())
}

fn xml_common_attributes(
    sink: &mut dyn Write,
    id: i64,
    version: i64,
    changeset: i64,
    uid: i64,
    user: Option<&str>,
    timestamp: &DateTime<Utc>,
) -> Result<()> {
    write!(
        sink,
        "id=\"{id}\" version=\"{version}\" changeset=\"{changeset}\" uid=\"{uid}\""
    )?;
    if let Some(user) = user {
        write!(sink, " user=\"{}\"", escape(user))?;
    }
    write!(
        sink,
        " visible=\"true\" timestamp=\"{}\"",
        wire_timestamp(timestamp)
    )?;
    Ok(())
}

fn xml_tags(tags: &TagMap, sink: &mut dyn Write) -> Result<()> {
    for (key, value) in tags {
        writeln!(sink, "<tag k=\"{}\" v=\"{}\"/>", escape(key), escape(value))?;
    }
    Ok(())
}

fn xml_point(point: &Point, sink: &mut dyn Write) -> Result<()> {
    write!(sink, "<node ")?;
    xml_common_attributes(
        sink,
        point.id,
        point.version,
        point.changeset,
        point.uid,
        point.user.as_deref(),
        &point.timestamp,
    )?;
    write!(sink, " lat=\"{}\" lon=\"{}\"", point.lat, point.lon)?;
    if point.tags.is_empty() {
        writeln!(sink, "/>")?;
    } else {
        writeln!(sink, ">")?;
        xml_tags(&point.tags, sink)?;
        writeln!(sink, "</node>")?;
    }
    Ok(())
}

fn xml_line(line: &Line, sink: &mut dyn Write) -> Result<()> {
    write!(sink, "<way ")?;
    xml_common_attributes(
        sink,
        line.id,
        line.version,
        line.changeset,
        line.uid,
        line.user.as_deref(),
        &line.timestamp,
    )?;
    if line.refs.is_empty() && line.tags.is_empty() {
        writeln!(sink, "/>")?;
        return Ok(());
    }
    writeln!(sink, ">")?;
    for node_id in &line.refs {
        writeln!(sink, "<nd ref=\"{node_id}\"/>")?;
    }
    xml_tags(&line.tags, sink)?;
    writeln!(sink, "</way>")?;
    Ok(())
}

fn xml_group(group: &Group, sink: &mut dyn Write) -> Result<()> {
    write!(sink, "<relation ")?;
    xml_common_attributes(
        sink,
        group.id,
        group.version,
        group.changeset,
        group.uid,
        group.user.as_deref(),
        &group.timestamp,
    )?;
    if group.members.is_empty() && group.tags.is_empty() {
        writeln!(sink, "/>")?;
        return Ok(());
    }
    writeln!(sink, ">")?;
    for member in &group.members {
        writeln!(
            sink,
            "<member type=\"{}\" ref=\"{}\" role=\"{}\"/>",
            wire_kind(member.kind),
            member.target,
            escape(&member.role)
        )?;
    }
    xml_tags(&group.tags, sink)?;
    writeln!(sink, "</relation>")?;
    Ok(())
}

// ------------- JSON -------------

fn render_json(staging: &StagingStore, meta: &DocumentMeta, sink: &mut dyn Write) -> Result<()> {
    write!(
        sink,
        "{{\"version\":{},\"generator\":{},\"copyright\":{},\"attribution\":{},\"license\":{}",
        json!(WIRE_VERSION),
        json!(GENERATOR),
        json!(COPYRIGHT),
        json!(ATTRIBUTION),
        json!(LICENSE)
    )?;
    if let Some(timestamp) = &meta.timestamp {
        write!(sink, ",\"timestamp\":{}", json!(timestamp))?;
    }
    if let Some(bounds) = &meta.bounds {
        write!(
            sink,
            ",\"bounds\":{}",
            json!({
                "minlon": bounds.minlon(),
                "minlat": bounds.minlat(),
                "maxlon": bounds.maxlon(),
                "maxlat": bounds.maxlat(),
            })
        )?;
    }
    write!(sink, ",\"nodes\":[")?;
    for (index, point) in staging.points().enumerate() {
        if index > 0 {
            write!(sink, ",")?;
        }
        write!(sink, "{}", json_point(point))?;
    }
    write!(sink, "],\"ways\":[")?;
    for (index, line) in staging.lines().enumerate() {
        if index > 0 {
            write!(sink, ",")?;
        }
        write!(sink, "{}", json_line(line))?;
    }
    write!(sink, "],\"relations\":[")?;
    for (index, group) in staging.groups().enumerate() {
        if index > 0 {
            write!(sink, ",")?;
        }
        write!(sink, "{}", json_group(group))?;
    }
    writeln!(sink, "]}}")?;
    Ok(())
}

fn json_common(
    object: &mut serde_json::Map<String, serde_json::Value>,
    id: i64,
    version: i64,
    changeset: i64,
    uid: i64,
    user: Option<&str>,
    timestamp: &DateTime<Utc>,
    tags: &TagMap,
) {
    object.insert("id".into(), json!(id));
    object.insert("version".into(), json!(version));
    object.insert("changeset".into(), json!(changeset));
    object.insert("uid".into(), json!(uid));
    if let Some(user) = user {
        object.insert("user".into(), json!(user));
    }
    object.insert("visible".into(), json!(true));
    object.insert("timestamp".into(), json!(wire_timestamp(timestamp)));
    object.insert("tags".into(), json!(tags));
}

fn json_point(point: &Point) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    json_common(
        &mut object,
        point.id,
        point.version,
        point.changeset,
        point.uid,
        point.user.as_deref(),
        &point.timestamp,
        &point.tags,
    );
    object.insert("lat".into(), json!(point.lat));
    object.insert("lon".into(), json!(point.lon));
    serde_json::Value::Object(object)
}

fn json_line(line: &Line) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    json_common(
        &mut object,
        line.id,
        line.version,
        line.changeset,
        line.uid,
        line.user.as_deref(),
        &line.timestamp,
        &line.tags,
    );
    object.insert("nds".into(), json!(line.refs));
    serde_json::Value::Object(object)
}

fn json_group(group: &Group) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    json_common(
        &mut object,
        group.id,
        group.version,
        group.changeset,
        group.uid,
        group.user.as_deref(),
        &group.timestamp,
        &group.tags,
    );
    let members: Vec<_> = group
        .members
        .iter()
        .map(|member| {
            json!({
                "type": wire_kind(member.kind),
                "ref": member.target,
                "role": member.role,
            })
        })
        .collect();
    object.insert("members".into(), json!(members));
    serde_json::Value::Object(object)
}
