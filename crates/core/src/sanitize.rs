//! Prepare a report entity for the update mutation.
//!
//! Query results carry fields the mutation input type rejects: GraphQL
//! `__typename` discriminators at any depth, the server-populated
//! `organisation` relation, and per-layer sharing metadata. The transport
//! rejects unknown fields anywhere in the payload, so the strip is recursive.
//!
//! Discriminators are matched by prefix (`__` unless configured otherwise), not
//! by the exact name `__typename`. GraphQL reserves every `__` name, so a
//! pass-through key with that prefix inside `displayOptions` is stripped as
//! well. A single leading underscore is ordinary data.

use report_protocol::coerce::json_kind;
use report_protocol::MapReport;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::SanitizeConfig;
use crate::error::{ReportError, Result};

/// Payload for the update mutation: the entity minus everything the server owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MapReportInput(Map<String, Value>);

impl MapReportInput {
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    config: SanitizeConfig,
}

impl Sanitizer {
    pub fn new(config: SanitizeConfig) -> Self {
        Self { config }
    }

    pub fn prepare(&self, entity: &Value) -> Result<MapReportInput> {
        let Value::Object(root) = entity else {
            return Err(ReportError::NotAnObject(json_kind(entity)));
        };

        let mut input = Map::new();
        for (key, value) in root {
            if self.is_discriminator(key) || self.config.root_fields.contains(key) {
                continue;
            }
            let value = if key.as_str() == "layers" {
                self.strip_layers(value)
            } else {
                self.strip(value)
            };
            input.insert(key.clone(), value);
        }
        Ok(MapReportInput(input))
    }

    pub fn prepare_report(&self, report: &MapReport) -> Result<MapReportInput> {
        self.prepare(&serde_json::to_value(report)?)
    }

    /// Any key carrying the reserved prefix, at any depth.
    fn is_discriminator(&self, key: &str) -> bool {
        key.starts_with(&self.config.discriminator_prefix)
    }

    fn strip(&self, value: &Value) -> Value {
        match value {
            Value::Object(fields) => Value::Object(self.strip_fields(fields, &[])),
            Value::Array(items) => Value::Array(items.iter().map(|item| self.strip(item)).collect()),
            other => other.clone(),
        }
    }

    fn strip_layers(&self, value: &Value) -> Value {
        let Value::Array(layers) = value else {
            return self.strip(value);
        };
        let layers = layers
            .iter()
            .map(|layer| match layer {
                Value::Object(fields) => {
                    Value::Object(self.strip_fields(fields, &self.config.layer_fields))
                }
                other => self.strip(other),
            })
            .collect();
        Value::Array(layers)
    }

    fn strip_fields(&self, fields: &Map<String, Value>, drop: &[String]) -> Map<String, Value> {
        fields
            .iter()
            .filter(|(key, _)| !self.is_discriminator(key) && !drop.contains(key))
            .map(|(key, value)| (key.clone(), self.strip(value)))
            .collect()
    }
}

/// [`Sanitizer::prepare`] with the default configuration.
pub fn prepare_for_mutation(entity: &Value) -> Result<MapReportInput> {
    Sanitizer::default().prepare(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn has_discriminator(value: &Value) -> bool {
        match value {
            Value::Object(fields) => fields
                .iter()
                .any(|(key, value)| key.starts_with("__") || has_discriminator(value)),
            Value::Array(items) => items.iter().any(has_discriminator),
            _ => false,
        }
    }

    #[test]
    fn strips_organisation_and_layer_sharing_fields() {
        let entity = json!({
            "__typename": "MapReport",
            "id": "r1",
            "organisation": { "id": "o1", "__typename": "Organisation" },
            "layers": [{
                "__typename": "MapLayer",
                "id": "L1",
                "name": "Members",
                "sourceId": "S1",
                "isSharedSource": true,
                "sharingPermission": { "id": "p1", "visibilityRecordDetails": true },
                "sourceData": { "id": "S1", "name": "Members" }
            }],
            "displayOptions": {
                "views": { "v1": { "__typename": "View", "id": "v1", "type": "Map" } }
            }
        });
        let input = prepare_for_mutation(&entity).unwrap();

        assert_eq!(
            input.into_value(),
            json!({
                "id": "r1",
                "layers": [{ "id": "L1", "name": "Members", "sourceId": "S1" }],
                "displayOptions": { "views": { "v1": { "id": "v1", "type": "Map" } } }
            })
        );
    }

    #[test]
    fn layer_fields_are_only_stripped_from_layers() {
        let entity = json!({
            "id": "r1",
            "displayOptions": { "sourceData": 1, "isSharedSource": false }
        });
        let input = prepare_for_mutation(&entity).unwrap();
        assert_eq!(
            input.get("displayOptions"),
            Some(&json!({ "sourceData": 1, "isSharedSource": false }))
        );
        assert_eq!(input.id(), Some("r1"));
    }

    #[test]
    fn reserved_prefix_is_stripped_from_pass_through_keys() {
        let entity = json!({
            "id": "r1",
            "displayOptions": {
                "__draft": { "views": {} },
                "_draft": true,
                "views": { "v1": { "id": "v1", "type": "Map", "__cache": 3 } }
            }
        });
        let input = prepare_for_mutation(&entity).unwrap();
        assert_eq!(
            input.get("displayOptions"),
            Some(&json!({
                "_draft": true,
                "views": { "v1": { "id": "v1", "type": "Map" } }
            }))
        );
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(matches!(
            prepare_for_mutation(&json!("r1")),
            Err(ReportError::NotAnObject("string"))
        ));
    }

    #[test]
    fn configured_fields_are_stripped() {
        let sanitizer = Sanitizer::new(SanitizeConfig {
            root_fields: vec!["organisation".into(), "owner".into()],
            ..SanitizeConfig::default()
        });
        let input = sanitizer
            .prepare(&json!({ "id": "r1", "owner": "me", "organisation": {} }))
            .unwrap();
        assert_eq!(input.into_value(), json!({ "id": "r1" }));
    }

    #[test]
    fn typed_reports_can_be_prepared() {
        let report: MapReport = serde_json::from_value(json!({
            "id": "r1",
            "name": "Members",
            "__typename": "MapReport",
            "layers": [{ "id": "L1", "sourceId": "S1", "isSharedSource": true }]
        }))
        .unwrap();
        let input = Sanitizer::default().prepare_report(&report).unwrap();
        assert!(!has_discriminator(input.as_object().get("layers").unwrap()));
        assert_eq!(input.get("__typename"), None);
        assert_eq!(input.get("layers"), Some(&json!([{ "id": "L1", "name": "", "sourceId": "S1" }])));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            "[a-z]{0,6}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                proptest::collection::btree_map("(__)?[a-z]{1,4}", inner, 0..4)
                    .prop_map(|fields| Value::Object(fields.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn proptest_no_discriminator_survives(
            fields in proptest::collection::btree_map("(__)?[a-z]{1,6}", arb_json(), 0..6),
        ) {
            let entity = Value::Object(fields.into_iter().collect());
            let input = prepare_for_mutation(&entity).unwrap();
            prop_assert!(!has_discriminator(&input.into_value()));
        }
    }
}
