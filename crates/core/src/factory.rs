use report_protocol::{Extra, IdSource, MapLayer, MapReport, UuidIds, ViewType};
use serde_json::json;

use crate::config::FactoryConfig;
use crate::migrate::migrate_with_ids;

/// Builds new reports bound to a single data source.
#[derive(Debug, Clone, Default)]
pub struct ReportFactory {
    config: FactoryConfig,
}

impl ReportFactory {
    pub fn new(config: FactoryConfig) -> Self {
        Self { config }
    }

    /// New report with one layer for the source, one map view shading by that
    /// layer, and one area explorer display of its properties.
    ///
    /// The only layer reference in the result points at the layer created here.
    pub fn create(&self, source_name: &str, source_id: &str, ids: &mut impl IdSource) -> MapReport {
        let report_id = ids.next_id();
        let layer_id = ids.next_id();
        let view_id = ids.next_id();
        let layer_display_id = ids.next_id();
        let display_id = ids.next_id();

        let raw = json!({
            "views": {
                &view_id: {
                    "id": &view_id,
                    "type": ViewType::Map,
                    "name": &self.config.view_name,
                    "mapOptions": {
                        "choropleth": { "layerId": &layer_id },
                        "layers": {
                            &layer_display_id: { "id": &layer_display_id, "layerId": &layer_id }
                        }
                    }
                }
            },
            "areaExplorer": {
                "displays": {
                    &display_id: {
                        "id": &display_id,
                        "layerId": &layer_id,
                        "displayType": self.config.display_type,
                        "areaQueryMode": self.config.area_query_mode
                    }
                }
            }
        });
        let display_options = migrate_with_ids(&raw, ids);

        let name = source_name.trim();
        let slug = slug_for(name, &report_id, self.config.slug_id_chars);
        log::debug!("created report {report_id} for source {source_id}");

        MapReport {
            id: report_id,
            name: name.to_string(),
            slug,
            layers: vec![MapLayer::new(layer_id, name, source_id)],
            display_options,
            extra: Extra::new(),
        }
    }
}

pub fn create_report_for_source(source_name: &str, source_id: &str) -> MapReport {
    ReportFactory::default().create(source_name, source_id, &mut UuidIds)
}

/// `"Members 2024!"` + `"3f2a..."` -> `"members-2024-3f2a1b9c"`
fn slug_for(name: &str, report_id: &str, id_chars: usize) -> String {
    let mut slug = String::with_capacity(name.len() + id_chars + 1);
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        slug.push_str("report");
    }

    let suffix: String = report_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(id_chars)
        .collect();
    if !suffix.is_empty() {
        slug.push('-');
        slug.push_str(&suffix);
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::dangling_layer_references;
    use pretty_assertions::assert_eq;
    use report_protocol::{AreaQueryMode, DisplayType, SequentialIds};

    #[test]
    fn new_report_is_wired_to_its_only_layer() {
        let report = create_report_for_source("Members", "SRC1");

        assert_eq!(report.layers.len(), 1);
        let layer = &report.layers[0];
        assert_eq!(layer.source_id, "SRC1");
        assert_eq!(layer.name, "Members");

        let views: Vec<_> = report.display_options.views.values().collect();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].view_type, ViewType::Map);
        let map = views[0].map_options.as_ref().unwrap();
        assert_eq!(map.choropleth.layer_id.as_deref(), Some(layer.id.as_str()));
        assert_eq!(map.layers.len(), 1);
        assert!(map
            .layers
            .values()
            .all(|display| display.layer_id.as_deref() == Some(layer.id.as_str())));

        let displays: Vec<_> = report.display_options.area_explorer.displays.values().collect();
        assert_eq!(displays.len(), 1);
        assert_eq!(displays[0].layer_id.as_deref(), Some(layer.id.as_str()));
        assert_eq!(displays[0].display_type, DisplayType::Properties);
        assert_eq!(displays[0].area_query_mode, AreaQueryMode::Overlapping);

        assert!(dangling_layer_references(&report.display_options, &report.layer_ids()).is_empty());
    }

    #[test]
    fn every_call_mints_fresh_ids() {
        let a = create_report_for_source("Members", "SRC1");
        let b = create_report_for_source("Members", "SRC1");
        assert_ne!(a.id, b.id);
        assert_ne!(a.layers[0].id, b.layers[0].id);
        assert_eq!(a.id.len(), 36);
    }

    #[test]
    fn ids_are_distinct_within_a_report() {
        let report = ReportFactory::default().create("Members", "S", &mut SequentialIds::new("x"));
        assert_eq!(report.id, "x-1");
        assert_eq!(report.layers[0].id, "x-2");
        assert!(report.display_options.views.contains_key("x-3"));
        let map = report.display_options.views["x-3"].map_options.as_ref().unwrap();
        assert!(map.layers.contains_key("x-4"));
        assert!(report.display_options.area_explorer.displays.contains_key("x-5"));
    }

    #[test]
    fn factory_config_shapes_the_defaults() {
        let factory = ReportFactory::new(FactoryConfig {
            view_name: "Overview".to_string(),
            display_type: DisplayType::BigNumber,
            area_query_mode: AreaQueryMode::PointsWithin,
            slug_id_chars: 0,
        });
        let report = factory.create("Members", "S", &mut SequentialIds::new("x"));
        assert_eq!(report.slug, "members");
        assert_eq!(report.display_options.views["x-3"].name.as_deref(), Some("Overview"));
        let display = &report.display_options.area_explorer.displays["x-5"];
        assert_eq!(display.display_type, DisplayType::BigNumber);
        assert_eq!(display.area_query_mode, AreaQueryMode::PointsWithin);
    }

    #[test]
    fn slugs_are_lowercase_and_hyphenated() {
        assert_eq!(slug_for("Members 2024!", "3f2a1b9c-0000", 8), "members-2024-3f2a1b9c");
        assert_eq!(slug_for("  --  ", "abc", 8), "report-abc");
        assert_eq!(slug_for("Café Owners", "", 8), "caf-owners");
    }
}
