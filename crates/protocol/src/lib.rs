//! Persisted shape of a map report.
//!
//! A report owns an ordered list of [`MapLayer`]s and a `displayOptions`
//! sub-document ([`DisplayOptions`]) describing how those layers are shown.
//! Everything under `displayOptions` refers to layers by id; nothing there owns
//! a layer.
//!
//! ```text
//! MapReport
//!   ├─ layers[]                      (id, name, sourceId)
//!   └─ displayOptions
//!        ├─ views{id → View}
//!        │    └─ mapOptions          (Map views only)
//!        │         ├─ choropleth     ─┐
//!        │         └─ layers{id → LayerDisplay} ─┤ layerId references
//!        └─ areaExplorer.displays{id → AreaExplorerDisplay} ─┘
//! ```
//!
//! All structs keep unknown keys in a flattened `extra` map so fields this crate
//! does not interpret survive a read/write cycle.

use std::collections::{BTreeMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod coerce;
pub mod ids;

pub use ids::{new_id, IdSource, SequentialIds, UuidIds};

/// Shape version written by this crate. Older versions are upgraded by the
/// migrator in `report-core`.
pub const DISPLAY_OPTIONS_SCHEMA_VERSION: u32 = 3;

/// Key prefix used by the GraphQL layer for type discriminators (`__typename`).
pub const TYPENAME_PREFIX: &str = "__";

/// Uninterpreted keys carried through unchanged.
pub type Extra = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum ViewType {
    Map,
    Table,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, JsonSchema)]
pub enum DisplayType {
    #[default]
    Properties,
    Table,
    BigNumber,
    ElectionResult,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, JsonSchema)]
pub enum AreaQueryMode {
    #[default]
    Overlapping,
    PointsWithin,
}

/// A data source bound to a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MapLayer {
    pub id: String,
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub source_id: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MapLayer {
    pub fn new(id: impl Into<String>, name: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_id: source_id.into(),
            extra: Extra::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MapReport {
    pub id: String,
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "coerce::null_as_default")]
    pub layers: Vec<MapLayer>,
    #[serde(default)]
    pub display_options: DisplayOptions,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MapReport {
    /// Ids of the layers this report owns; the authoritative set for
    /// reference checks.
    #[must_use]
    pub fn layer_ids(&self) -> HashSet<String> {
        self.layers.iter().map(|layer| layer.id.clone()).collect()
    }

    #[must_use]
    pub fn layer(&self, layer_id: &str) -> Option<&MapLayer> {
        self.layers.iter().find(|layer| layer.id == layer_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    #[serde(default, deserialize_with = "coerce::entries")]
    pub views: BTreeMap<String, View>,
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub area_explorer: AreaExplorer,
    #[serde(flatten)]
    pub extra: Extra,
}

impl DisplayOptions {
    pub fn map_views(&self) -> impl Iterator<Item = (&String, &View)> {
        self.views.iter().filter(|(_, view)| view.is_map())
    }
}

/// One renderable panel of a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "coerce::opt_string"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "coerce::lenient"
    )]
    pub map_options: Option<MapOptions>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl View {
    #[must_use]
    pub fn is_map(&self) -> bool {
        self.view_type == ViewType::Map
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub choropleth: Choropleth,
    #[serde(default, deserialize_with = "coerce::entries")]
    pub layers: BTreeMap<String, LayerDisplay>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Shaded-map configuration keyed to one layer and one field or formula.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Choropleth {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "coerce::opt_string"
    )]
    pub layer_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "coerce::opt_string"
    )]
    pub field: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "coerce::opt_string"
    )]
    pub formula: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Choropleth {
    /// Copy with the layer target and everything derived from it removed.
    #[must_use]
    pub fn without_target(&self) -> Self {
        Self {
            layer_id: None,
            field: None,
            formula: None,
            extra: self.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LayerDisplay {
    pub id: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "coerce::opt_string"
    )]
    pub layer_id: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AreaExplorer {
    #[serde(default, deserialize_with = "coerce::entries")]
    pub displays: BTreeMap<String, AreaExplorerDisplay>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AreaExplorerDisplay {
    pub id: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "coerce::opt_string"
    )]
    pub layer_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub display_type: DisplayType,
    #[serde(default, deserialize_with = "coerce::or_default")]
    pub area_query_mode: AreaQueryMode,
    #[serde(flatten)]
    pub extra: Extra,
}

impl coerce::Entry for View {
    const KIND: &'static str = "view";
}

impl coerce::Entry for LayerDisplay {
    const KIND: &'static str = "layer display";
}

impl coerce::Entry for AreaExplorerDisplay {
    const KIND: &'static str = "area explorer display";
}
