use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{OxapiError, Result};

// ------------- Entities -------------
pub type EntityId = i64;

/// Unordered string-to-string attributes attached to every entity. A
/// `BTreeMap` keeps iteration deterministic even though tag order carries
/// no meaning on the wire.
pub type TagMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: EntityId,
    pub version: i64,
    pub changeset: i64,
    pub uid: i64,
    // only present when the user table has been joined in
    pub user: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub tags: TagMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: EntityId,
    pub version: i64,
    pub changeset: i64,
    pub uid: i64,
    pub user: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub tags: TagMap,
    /// Referenced point ids in stored order. Repeats are allowed; this is
    /// geometry, not a set.
    pub refs: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: EntityId,
    pub version: i64,
    pub changeset: i64,
    pub uid: i64,
    pub user: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub tags: TagMap,
    /// Members in ascending sequence position, exactly as stored.
    pub members: Vec<Member>,
}

// ------------- Members -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Point,
    Line,
    Group,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub kind: MemberKind,
    pub target: EntityId,
    pub role: String,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemberKind::Point => write!(f, "point"),
            MemberKind::Line => write!(f, "line"),
            MemberKind::Group => write!(f, "group"),
        }
    }
}

// ------------- Bounding box -------------
/// A WGS84 bounding box. Construction validates the box, so a held value
/// is always geometrically sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    minlon: f64,
    minlat: f64,
    maxlon: f64,
    maxlat: f64,
}

impl BoundingBox {
    pub fn new(minlon: f64, minlat: f64, maxlon: f64, maxlat: f64) -> Result<Self> {
        if minlon > maxlon {
            return Err(OxapiError::BBox("left>right".into()));
        }
        for lat in [minlat, maxlat] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(OxapiError::BBox(format!("latitude out of range: {lat}")));
            }
        }
        for lon in [minlon, maxlon] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(OxapiError::BBox(format!("longitude out of range: {lon}")));
            }
        }
        if minlat > maxlat {
            return Err(OxapiError::BBox("bottom>top".into()));
        }
        Ok(Self { minlon, minlat, maxlon, maxlat })
    }

    /// Parses the `minlon,minlat,maxlon,maxlat` form used by both the
    /// `bbox` clause and the map query string.
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(',').collect();
        if parts.len() != 4 {
            return Err(OxapiError::InvalidInput(format!(
                "bbox needs four comma separated values, got {}",
                parts.len()
            )));
        }
        let mut coords = [0f64; 4];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = part.trim().parse().map_err(|_| {
                OxapiError::InvalidInput(format!("non-numeric bbox value '{part}'"))
            })?;
        }
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    pub fn minlon(&self) -> f64 { self.minlon }
    pub fn minlat(&self) -> f64 { self.minlat }
    pub fn maxlon(&self) -> f64 { self.maxlon }
    pub fn maxlat(&self) -> f64 { self.maxlat }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{},{},{}", self.minlon, self.minlat, self.maxlon, self.maxlat)
    }
}

/// Parses a comma separated id list such as `1,42,17`.
pub fn parse_id_list(text: &str) -> Result<Vec<EntityId>> {
    let mut ids = Vec::new();
    for part in text.split(',') {
        let id = part.trim().parse().map_err(|_| {
            OxapiError::InvalidInput(format!("non-numeric id '{part}'"))
        })?;
        ids.push(id);
    }
    Ok(ids)
}
