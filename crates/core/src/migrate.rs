//! Upgrade persisted `displayOptions` to the current shape.
//!
//! Every shape the editor has ever written is one variant of [`StoredShape`].
//! A document is classified once, then walked through the upgrade steps from
//! its own version to the current one:
//!
//! ```text
//! Flat ──nest views──> ViewLevelMapSettings ──nest map settings──> NoAreaExplorer
//!                                                                       │
//!                                                      add area explorer│
//!                                                                       v
//! Unrecognized ──────────────> DisplayOptions::default()    Current ──> coerce
//! ```
//!
//! Migration never fails. Fragments of the wrong type are dropped or reset
//! while the rest of the document carries on.

use report_protocol::coerce::json_kind;
use report_protocol::{
    DisplayOptions, IdSource, MapReport, UuidIds, DISPLAY_OPTIONS_SCHEMA_VERSION,
};
use serde_json::{Map, Value};

use crate::error::{ReportError, Result};

/// Root keys of the pre-view document that now live under a map view.
const PRE_VIEW_KEYS: [&str; 3] = ["layers", "dataVisualisation", "display"];

/// Persisted `displayOptions`, tagged with the newest shape it already matches.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredShape {
    /// Not an object (absent, null, scalar, array).
    Unrecognized(Value),
    /// v0: a single implicit map, its settings at the document root.
    Flat(Map<String, Value>),
    /// v1: explicit views, but map views keep `layers` / `dataVisualisation` /
    /// `display` next to their `mapOptions`.
    ViewLevelMapSettings(Map<String, Value>),
    /// v2: views are final, `areaExplorer.displays` is missing or a list.
    NoAreaExplorer(Map<String, Value>),
    Current(Map<String, Value>),
}

impl StoredShape {
    #[must_use]
    pub fn classify(raw: &Value) -> Self {
        let Value::Object(map) = raw else {
            return Self::Unrecognized(raw.clone());
        };
        let views = match map.get("views") {
            Some(Value::Object(views)) => views,
            _ => return Self::Flat(map.clone()),
        };
        let view_level_settings = views.values().any(|view| match view {
            Value::Object(view) => {
                is_map_view(view) && PRE_VIEW_KEYS.iter().any(|key| view.contains_key(*key))
            }
            _ => false,
        });
        if view_level_settings {
            return Self::ViewLevelMapSettings(map.clone());
        }

        let has_displays = matches!(
            map.get("areaExplorer"),
            Some(Value::Object(explorer)) if explorer.get("displays").is_some_and(Value::is_object)
        );
        if !has_displays {
            return Self::NoAreaExplorer(map.clone());
        }

        Self::Current(map.clone())
    }

    #[must_use]
    pub fn version(&self) -> Option<u32> {
        match self {
            Self::Unrecognized(_) => None,
            Self::Flat(_) => Some(0),
            Self::ViewLevelMapSettings(_) => Some(1),
            Self::NoAreaExplorer(_) => Some(2),
            Self::Current(_) => Some(DISPLAY_OPTIONS_SCHEMA_VERSION),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    NestViews,
    NestMapSettings,
    AddAreaExplorer,
}

impl MigrationStep {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NestViews => "nest_views",
            Self::NestMapSettings => "nest_map_settings",
            Self::AddAreaExplorer => "add_area_explorer",
        }
    }
}

/// What a migration run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// `None` when the input was not recognisable at all.
    pub from_version: Option<u32>,
    pub steps: Vec<MigrationStep>,
}

impl MigrationReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.from_version == Some(DISPLAY_OPTIONS_SCHEMA_VERSION) && self.steps.is_empty()
    }
}

#[must_use]
pub fn migrate(raw: &Value) -> DisplayOptions {
    migrate_with_ids(raw, &mut UuidIds)
}

/// For a `displayOptions` field that may be missing from the entity.
#[must_use]
pub fn migrate_optional(raw: Option<&Value>) -> DisplayOptions {
    migrate(raw.unwrap_or(&Value::Null))
}

#[must_use]
pub fn migrate_with_ids(raw: &Value, ids: &mut impl IdSource) -> DisplayOptions {
    migrate_with_report(raw, ids).0
}

pub fn migrate_with_report(
    raw: &Value,
    ids: &mut impl IdSource,
) -> (DisplayOptions, MigrationReport) {
    let mut shape = StoredShape::classify(raw);
    let mut report = MigrationReport {
        from_version: shape.version(),
        steps: Vec::new(),
    };

    let current = loop {
        shape = match shape {
            StoredShape::Unrecognized(value) => {
                if !value.is_null() {
                    log::warn!(
                        "displayOptions is {}, not an object; starting from an empty document",
                        json_kind(&value)
                    );
                }
                return (DisplayOptions::default(), report);
            }
            StoredShape::Flat(map) => {
                report.steps.push(MigrationStep::NestViews);
                StoredShape::ViewLevelMapSettings(nest_views(map, ids))
            }
            StoredShape::ViewLevelMapSettings(map) => {
                report.steps.push(MigrationStep::NestMapSettings);
                StoredShape::NoAreaExplorer(nest_map_settings(map, ids))
            }
            StoredShape::NoAreaExplorer(map) => {
                report.steps.push(MigrationStep::AddAreaExplorer);
                StoredShape::Current(add_area_explorer(map, ids))
            }
            StoredShape::Current(map) => break map,
        };
    };

    if !report.steps.is_empty() {
        let steps: Vec<&str> = report.steps.iter().map(|step| step.name()).collect();
        log::debug!(
            "migrated displayOptions from v{} via [{}]",
            report.from_version.unwrap_or_default(),
            steps.join(", ")
        );
    }

    (coerce_current(current), report)
}

/// Parse a report entity as returned by the query layer, upgrading its
/// `displayOptions` on the way.
pub fn hydrate_report(entity: &Value) -> Result<MapReport> {
    let Value::Object(fields) = entity else {
        return Err(ReportError::NotAnObject(json_kind(entity)));
    };
    let mut fields = fields.clone();
    let options = migrate_optional(fields.get("displayOptions"));
    fields.insert("displayOptions".to_string(), serde_json::to_value(&options)?);

    serde_json::from_value(Value::Object(fields))
        .map_err(|err| ReportError::invalid_entity(err.to_string()))
}

fn is_map_view(view: &Map<String, Value>) -> bool {
    view.get("type").and_then(Value::as_str) == Some("Map")
}

/// v0 -> v1
fn nest_views(mut map: Map<String, Value>, ids: &mut impl IdSource) -> Map<String, Value> {
    let mut views = match map.remove("views") {
        Some(Value::Array(items)) => keyed_by_id(items, "view", ids),
        _ => Map::new(),
    };

    let settings: Map<String, Value> = PRE_VIEW_KEYS
        .iter()
        .filter_map(|key| map.remove(*key).map(|value| ((*key).to_string(), value)))
        .collect();
    if !settings.is_empty() {
        let id = ids.next_id();
        let mut view = settings;
        view.insert("id".to_string(), Value::String(id.clone()));
        view.insert("type".to_string(), Value::String("Map".to_string()));
        view.insert("name".to_string(), Value::String("Map".to_string()));
        views.insert(id, Value::Object(view));
    }

    map.insert("views".to_string(), Value::Object(views));
    map
}

/// v1 -> v2
fn nest_map_settings(mut map: Map<String, Value>, ids: &mut impl IdSource) -> Map<String, Value> {
    if let Some(Value::Object(views)) = map.get_mut("views") {
        for view in views.values_mut() {
            if let Value::Object(view) = view {
                if is_map_view(view) {
                    nest_view_settings(view, ids);
                }
            }
        }
    }
    map
}

fn nest_view_settings(view: &mut Map<String, Value>, ids: &mut impl IdSource) {
    if !PRE_VIEW_KEYS.iter().any(|key| view.contains_key(*key)) {
        return;
    }
    let mut options = match view.remove("mapOptions") {
        Some(Value::Object(options)) => options,
        _ => Map::new(),
    };

    if let Some(layers) = view.remove("layers") {
        let layers = match layers {
            Value::Array(items) => Value::Object(keyed_by_id(items, "layer display", ids)),
            other => other,
        };
        options.entry("layers").or_insert(layers);
    }
    if let Some(display) = view.remove("display") {
        options.entry("display").or_insert(display);
    }

    if let Some(visualisation) = view.remove("dataVisualisation") {
        let legacy = choropleth_from_visualisation(visualisation);
        match options.get_mut("choropleth") {
            Some(Value::Object(existing)) => {
                for (key, value) in legacy {
                    existing.entry(key).or_insert(value);
                }
            }
            _ => {
                options.insert("choropleth".to_string(), Value::Object(legacy));
            }
        }
    }

    view.insert("mapOptions".to_string(), Value::Object(options));
}

fn choropleth_from_visualisation(visualisation: Value) -> Map<String, Value> {
    let Value::Object(visualisation) = visualisation else {
        return Map::new();
    };
    let mut choropleth = Map::new();
    for (key, value) in visualisation {
        let key = match key.as_str() {
            "dataSource" => "layerId".to_string(),
            "dataSourceField" => "field".to_string(),
            _ => key,
        };
        choropleth.entry(key).or_insert(value);
    }
    choropleth
}

/// v2 -> v3
fn add_area_explorer(mut map: Map<String, Value>, ids: &mut impl IdSource) -> Map<String, Value> {
    let mut explorer = match map.remove("areaExplorer") {
        Some(Value::Object(explorer)) => explorer,
        _ => Map::new(),
    };
    let displays = match explorer.remove("displays") {
        Some(Value::Object(displays)) => displays,
        Some(Value::Array(items)) => keyed_by_id(items, "area explorer display", ids),
        _ => Map::new(),
    };
    explorer.insert("displays".to_string(), Value::Object(displays));
    map.insert("areaExplorer".to_string(), Value::Object(explorer));
    map
}

/// Turn a legacy list into an id-keyed mapping, minting ids where missing.
fn keyed_by_id(items: Vec<Value>, kind: &str, ids: &mut impl IdSource) -> Map<String, Value> {
    let mut keyed = Map::new();
    for item in items {
        let Value::Object(mut fields) = item else {
            log::warn!("dropping {kind} list item: {} is not an object", json_kind(&item));
            continue;
        };
        let id = match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => {
                let id = ids.next_id();
                fields.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };
        keyed.insert(id, Value::Object(fields));
    }
    keyed
}

fn coerce_current(map: Map<String, Value>) -> DisplayOptions {
    let mut options = match serde_json::from_value::<DisplayOptions>(Value::Object(map)) {
        Ok(options) => options,
        Err(err) => {
            log::warn!("displayOptions could not be read ({err}); starting from an empty document");
            DisplayOptions::default()
        }
    };
    for view in options.views.values_mut() {
        if view.is_map() && view.map_options.is_none() {
            view.map_options = Some(Default::default());
        }
    }
    options
}
