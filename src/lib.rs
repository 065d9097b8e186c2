//! oxapi – a read-only OSM XAPI-style query service.
//!
//! A request names a root entity kind and either an id list, a predicate
//! in the XAPI bracket mini-language, or a bounding box. oxapi compiles
//! the predicate, resolves it against a SQLite snapshot of osmosis-style
//! tables into a per-request staging store, expands the staged sets to
//! structural closure (points referenced by matched lines, groups
//! transitively referencing anything staged), and streams the result as
//! OSM XML or JSON.
//!
//! ## Modules
//! * [`model`] – Typed `Point`/`Line`/`Group`/`Member` records, tag maps
//!   and the validated [`model::BoundingBox`].
//! * [`predicate`] – The predicate compiler: `[k=v]` bracket groups into
//!   an ordered clause list.
//! * [`store`] – SQLite adapter: schema, per-request sessions, lowering of
//!   predicates into parameterized SQL, and the write API that loads a
//!   snapshot.
//! * [`stage`] – The per-request staging store (three append-only,
//!   id-keyed sets).
//! * [`closure`] – Point backfill and the group-membership fixpoint.
//! * [`resolver`] – Drives staging and closure per root query kind.
//! * [`render`] – Single-pass XML and JSON serializers.
//! * [`server`] – axum routes, content negotiation, CORS and streaming.
//! * [`settings`] – Configuration file and environment layering.
//!
//! ## Quick start
//! ```
//! use oxapi::store::Store;
//! use oxapi::predicate::Predicate;
//! use oxapi::resolver::{resolve, RootQuery, SearchKind};
//! let store = Store::open_in_memory().unwrap();
//! let session = store.session().unwrap();
//! let predicate = Predicate::compile("[amenity=cafe]").unwrap();
//! let staging = resolve(&session, &RootQuery::ByPredicate {
//!     kind: SearchKind::Point,
//!     predicate,
//! }).unwrap();
//! assert_eq!(staging.point_count(), 0);
//! ```

pub mod closure;
pub mod error;
pub mod model;
pub mod predicate;
pub mod render;
pub mod resolver;
pub mod server;
pub mod settings;
pub mod stage;
pub mod store;
