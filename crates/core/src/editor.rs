//! Editing session for one report.
//!
//! The session owns a snapshot of the report and talks to the outside world only
//! through the two collaborators it is given: a [`CredentialProvider`] for the
//! session token and a [`ReportExecutor`] that runs the GraphQL query and
//! mutation. Every edit that can orphan a layer reference re-runs the integrity
//! pass before returning.

use report_protocol::{
    Choropleth, IdSource, MapLayer, MapOptions, MapReport, UuidIds, ViewType,
};
use serde_json::Value;

use crate::error::{ReportError, Result};
use crate::integrity::{clean_report, clean_up_layer_references};
use crate::migrate::hydrate_report;
use crate::sanitize::{MapReportInput, Sanitizer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
}

pub trait CredentialProvider {
    /// `None` when there is no signed-in user.
    fn credentials(&self) -> Option<Credentials>;
}

/// Runs report queries and mutations against the API.
pub trait ReportExecutor {
    /// Raw report entity, as returned by the query layer.
    fn fetch_map_report(&self, credentials: &Credentials, report_id: &str)
        -> anyhow::Result<Value>;

    /// Sends the update mutation; returns the server's copy of the entity.
    fn update_map_report(
        &self,
        credentials: &Credentials,
        input: &MapReportInput,
    ) -> anyhow::Result<Value>;
}

impl<T: CredentialProvider + ?Sized> CredentialProvider for &T {
    fn credentials(&self) -> Option<Credentials> {
        (**self).credentials()
    }
}

impl<T: ReportExecutor + ?Sized> ReportExecutor for &T {
    fn fetch_map_report(&self, credentials: &Credentials, report_id: &str) -> anyhow::Result<Value> {
        (**self).fetch_map_report(credentials, report_id)
    }

    fn update_map_report(
        &self,
        credentials: &Credentials,
        input: &MapReportInput,
    ) -> anyhow::Result<Value> {
        (**self).update_map_report(credentials, input)
    }
}

pub struct ReportEditor<E, C, I = UuidIds> {
    report: MapReport,
    executor: E,
    credentials: C,
    sanitizer: Sanitizer,
    ids: I,
}

impl<E: ReportExecutor, C: CredentialProvider> ReportEditor<E, C> {
    /// Fetch, migrate and clean a stored report.
    pub fn load(executor: E, credentials: C, report_id: &str) -> Result<Self> {
        let token = credentials.credentials().ok_or(ReportError::Unauthenticated)?;
        let entity = executor.fetch_map_report(&token, report_id)?;
        let report = hydrate_report(&entity)?;
        log::debug!("loaded report {} with {} layers", report.id, report.layers.len());
        Ok(Self::from_report(report, executor, credentials))
    }

    pub fn from_report(report: MapReport, executor: E, credentials: C) -> Self {
        Self {
            report: clean_report(&report),
            executor,
            credentials,
            sanitizer: Sanitizer::default(),
            ids: UuidIds,
        }
    }
}

impl<E: ReportExecutor, C: CredentialProvider, I: IdSource> ReportEditor<E, C, I> {
    pub fn with_ids<J: IdSource>(self, ids: J) -> ReportEditor<E, C, J> {
        ReportEditor {
            report: self.report,
            executor: self.executor,
            credentials: self.credentials,
            sanitizer: self.sanitizer,
            ids,
        }
    }

    pub fn with_sanitizer(self, sanitizer: Sanitizer) -> Self {
        Self { sanitizer, ..self }
    }

    pub fn report(&self) -> &MapReport {
        &self.report
    }

    pub fn into_report(self) -> MapReport {
        self.report
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.report.name = name.into();
    }

    /// Bind another data source; returns the new layer id.
    pub fn add_layer(&mut self, name: &str, source_id: &str) -> String {
        let layer_id = self.ids.next_id();
        self.report
            .layers
            .push(MapLayer::new(layer_id.clone(), name, source_id));
        layer_id
    }

    pub fn remove_layer(&mut self, layer_id: &str) -> Result<()> {
        if self.report.layer(layer_id).is_none() {
            return Err(ReportError::UnknownLayer(layer_id.to_string()));
        }
        self.report.layers.retain(|layer| layer.id != layer_id);
        self.report.display_options =
            clean_up_layer_references(&self.report.display_options, &self.report.layer_ids());
        log::debug!("removed layer {layer_id} from report {}", self.report.id);
        Ok(())
    }

    /// Point a map view's choropleth at another layer, or at none.
    ///
    /// `field` and `formula` describe attributes of the previous layer, so they
    /// are cleared whenever the target changes.
    pub fn set_choropleth_layer(&mut self, view_id: &str, layer_id: Option<&str>) -> Result<()> {
        if let Some(layer_id) = layer_id {
            if self.report.layer(layer_id).is_none() {
                return Err(ReportError::UnknownLayer(layer_id.to_string()));
            }
        }
        let view = self
            .report
            .display_options
            .views
            .get_mut(view_id)
            .ok_or_else(|| ReportError::UnknownView(view_id.to_string()))?;
        if view.view_type != ViewType::Map {
            return Err(ReportError::NotAMapView(view_id.to_string()));
        }

        let map_options = view.map_options.get_or_insert_with(MapOptions::default);
        if map_options.choropleth.layer_id.as_deref() == layer_id {
            return Ok(());
        }
        map_options.choropleth = Choropleth {
            layer_id: layer_id.map(str::to_string),
            ..map_options.choropleth.without_target()
        };
        Ok(())
    }

    /// Set the choropleth field of a map view.
    pub fn set_choropleth_field(&mut self, view_id: &str, field: Option<&str>) -> Result<()> {
        let view = self
            .report
            .display_options
            .views
            .get_mut(view_id)
            .ok_or_else(|| ReportError::UnknownView(view_id.to_string()))?;
        if view.view_type != ViewType::Map {
            return Err(ReportError::NotAMapView(view_id.to_string()));
        }
        let map_options = view.map_options.get_or_insert_with(MapOptions::default);
        map_options.choropleth.field = field.map(str::to_string);
        Ok(())
    }

    /// Persist the current snapshot. Returns the server's copy of the entity.
    pub fn save(&self) -> Result<Value> {
        let token = self
            .credentials
            .credentials()
            .ok_or(ReportError::Unauthenticated)?;
        let input = self.sanitizer.prepare_report(&clean_report(&self.report))?;
        let saved = self.executor.update_map_report(&token, &input)?;
        log::debug!("saved report {}", self.report.id);
        Ok(saved)
    }
}
