//! Layer reference integrity.
//!
//! Everything under `displayOptions` points at layers by id. When a layer is
//! removed those pointers dangle until [`clean_up_layer_references`] runs; the
//! renderer must never see them.

use std::collections::HashSet;

use report_protocol::{AreaExplorer, DisplayOptions, MapOptions, MapReport, View};
use serde::Serialize;

/// One reference site whose `layerId` names a layer the report does not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "site", rename_all = "snake_case")]
pub enum DanglingReference {
    AreaExplorerDisplay {
        display_id: String,
        layer_id: String,
    },
    LayerDisplay {
        view_id: String,
        display_id: String,
        layer_id: String,
    },
    Choropleth {
        view_id: String,
        layer_id: String,
    },
}

/// Absent references are always allowed.
fn resolves(layer_id: Option<&String>, layer_ids: &HashSet<String>) -> bool {
    layer_id.map_or(true, |id| layer_ids.contains(id))
}

/// Copy of `options` with every reference to a layer outside `layer_ids` removed.
///
/// Area explorer displays and map layer displays pointing elsewhere are dropped.
/// A choropleth pointing elsewhere loses its target, field and formula together.
/// Any view carrying `mapOptions` is cleaned, whatever its type. An empty
/// `layer_ids` therefore clears every layer-scoped reference.
#[must_use]
pub fn clean_up_layer_references(
    options: &DisplayOptions,
    layer_ids: &HashSet<String>,
) -> DisplayOptions {
    let displays = options
        .area_explorer
        .displays
        .iter()
        .filter(|(_, display)| resolves(display.layer_id.as_ref(), layer_ids))
        .map(|(key, display)| (key.clone(), display.clone()))
        .collect();

    let views = options
        .views
        .iter()
        .map(|(key, view)| (key.clone(), clean_view(view, layer_ids)))
        .collect();

    let cleaned = DisplayOptions {
        views,
        area_explorer: AreaExplorer {
            displays,
            extra: options.area_explorer.extra.clone(),
        },
        extra: options.extra.clone(),
    };

    if log::log_enabled!(log::Level::Debug) && cleaned != *options {
        let removed = dangling_layer_references(options, layer_ids).len();
        log::debug!("cleared {removed} dangling layer references");
    }

    cleaned
}

fn clean_view(view: &View, layer_ids: &HashSet<String>) -> View {
    let Some(map_options) = &view.map_options else {
        return view.clone();
    };

    let choropleth = if resolves(map_options.choropleth.layer_id.as_ref(), layer_ids) {
        map_options.choropleth.clone()
    } else {
        map_options.choropleth.without_target()
    };

    let layers = map_options
        .layers
        .iter()
        .filter(|(_, display)| resolves(display.layer_id.as_ref(), layer_ids))
        .map(|(key, display)| (key.clone(), display.clone()))
        .collect();

    View {
        map_options: Some(MapOptions {
            choropleth,
            layers,
            extra: map_options.extra.clone(),
        }),
        ..view.clone()
    }
}

/// Clean a report against its own layer list.
#[must_use]
pub fn clean_report(report: &MapReport) -> MapReport {
    MapReport {
        display_options: clean_up_layer_references(&report.display_options, &report.layer_ids()),
        ..report.clone()
    }
}

/// Every reference site in `options` that `layer_ids` cannot resolve, in
/// document order (area explorer first, then views by id).
#[must_use]
pub fn dangling_layer_references(
    options: &DisplayOptions,
    layer_ids: &HashSet<String>,
) -> Vec<DanglingReference> {
    let mut dangling = Vec::new();

    for (display_id, display) in &options.area_explorer.displays {
        if let Some(layer_id) = &display.layer_id {
            if !layer_ids.contains(layer_id) {
                dangling.push(DanglingReference::AreaExplorerDisplay {
                    display_id: display_id.clone(),
                    layer_id: layer_id.clone(),
                });
            }
        }
    }

    for (view_id, view) in &options.views {
        let Some(map_options) = &view.map_options else {
            continue;
        };
        if let Some(layer_id) = &map_options.choropleth.layer_id {
            if !layer_ids.contains(layer_id) {
                dangling.push(DanglingReference::Choropleth {
                    view_id: view_id.clone(),
                    layer_id: layer_id.clone(),
                });
            }
        }
        for (display_id, display) in &map_options.layers {
            if let Some(layer_id) = &display.layer_id {
                if !layer_ids.contains(layer_id) {
                    dangling.push(DanglingReference::LayerDisplay {
                        view_id: view_id.clone(),
                        display_id: display_id.clone(),
                        layer_id: layer_id.clone(),
                    });
                }
            }
        }
    }

    dangling
}
