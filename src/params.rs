use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DefaultParams;
use crate::error::ValidationError;
use crate::events::EventBus;
use crate::model::{
    CircleParams, CircleRole, DisasterTaxonomy, EarthquakeParameters, GeoPoint,
    HurricaneParameters, validate_intensity, validate_radius,
};

/// Partial write to one circle. `None` fields are left untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CircleUpdate {
    pub center: Option<GeoPoint>,
    pub radius: Option<f64>,
    pub intensity: Option<f64>,
}

impl CircleUpdate {
    pub fn center(mut self, center: GeoPoint) -> Self {
        self.center = Some(center);
        self
    }

    pub fn radius(mut self, meters: f64) -> Self {
        self.radius = Some(meters);
        self
    }

    pub fn intensity(mut self, intensity: f64) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.center.is_none() && self.radius.is_none() && self.intensity.is_none()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(c) = self.center {
            c.validate()?;
        }
        if let Some(r) = self.radius {
            validate_radius(r)?;
        }
        if let Some(i) = self.intensity {
            validate_intensity(i)?;
        }
        Ok(())
    }
}

/// Which sub-fields an update touched, so views can redraw selectively.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChangedFields {
    pub center: bool,
    pub radius: bool,
    pub intensity: bool,
}

impl ChangedFields {
    pub fn all() -> Self {
        Self {
            center: true,
            radius: true,
            intensity: true,
        }
    }

    /// Center or radius moved; the geometry must be recomputed.
    pub fn geometry(&self) -> bool {
        self.center || self.radius
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParameterEvent {
    /// Start routine ran: parameters for this disaster were reset to defaults.
    Started(DisasterTaxonomy),
    Updated {
        role: CircleRole,
        fields: ChangedFields,
    },
    /// Map projection changed; pixel-space geometry is stale.
    ViewChanged,
}

/// Borrowed view of the parameters of one disaster type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActiveParameters<'a> {
    Earthquake(&'a EarthquakeParameters),
    Hurricane(&'a HurricaneParameters),
}

/// Owns the editable circles of both disaster types. The mutators here are the
/// only way to change them, and each accepted write publishes one event.
#[derive(Debug)]
pub struct DisasterParameterModel {
    defaults: DefaultParams,
    earthquake: EarthquakeParameters,
    hurricane: HurricaneParameters,
    pub events: EventBus<ParameterEvent>,
}

impl DisasterParameterModel {
    pub fn new(defaults: DefaultParams) -> Self {
        let center = defaults.map_center;
        Self {
            earthquake: defaults.earthquake_at(center),
            hurricane: defaults.hurricane_at(center),
            defaults,
            events: EventBus::new(),
        }
    }

    pub fn defaults(&self) -> &DefaultParams {
        &self.defaults
    }

    pub fn earthquake(&self) -> &EarthquakeParameters {
        &self.earthquake
    }

    pub fn hurricane(&self) -> &HurricaneParameters {
        &self.hurricane
    }

    pub fn active(&self, taxonomy: DisasterTaxonomy) -> ActiveParameters<'_> {
        match taxonomy {
            DisasterTaxonomy::Earthquake => ActiveParameters::Earthquake(&self.earthquake),
            DisasterTaxonomy::Hurricane => ActiveParameters::Hurricane(&self.hurricane),
        }
    }

    pub fn circle(&self, role: CircleRole) -> &CircleParams {
        match role {
            CircleRole::Earthquake => &self.earthquake.0,
            CircleRole::HurricaneStart => &self.hurricane.start,
            CircleRole::HurricaneEnd => &self.hurricane.end,
        }
    }

    /// Start routine: reset `taxonomy`'s parameters around `center`.
    pub fn start(&mut self, taxonomy: DisasterTaxonomy, center: GeoPoint) {
        match taxonomy {
            DisasterTaxonomy::Earthquake => self.earthquake = self.defaults.earthquake_at(center),
            DisasterTaxonomy::Hurricane => self.hurricane = self.defaults.hurricane_at(center),
        }
        debug!(disaster = taxonomy.as_str(), lat = center.lat, lng = center.lng, "parameters reset");
        self.events.publish(ParameterEvent::Started(taxonomy));
    }

    pub fn update_earthquake(&mut self, update: CircleUpdate) -> Result<ChangedFields, ValidationError> {
        self.update(CircleRole::Earthquake, update)
    }

    pub fn update_hurricane_start(&mut self, update: CircleUpdate) -> Result<ChangedFields, ValidationError> {
        self.update(CircleRole::HurricaneStart, update)
    }

    pub fn update_hurricane_end(&mut self, update: CircleUpdate) -> Result<ChangedFields, ValidationError> {
        self.update(CircleRole::HurricaneEnd, update)
    }

    /// Validate the whole update first; a rejected write leaves every field as it was.
    pub fn update(&mut self, role: CircleRole, update: CircleUpdate) -> Result<ChangedFields, ValidationError> {
        update.validate()?;
        if update.is_empty() {
            return Ok(ChangedFields::default());
        }

        let circle = match role {
            CircleRole::Earthquake => &mut self.earthquake.0,
            CircleRole::HurricaneStart => &mut self.hurricane.start,
            CircleRole::HurricaneEnd => &mut self.hurricane.end,
        };
        let mut fields = ChangedFields::default();
        if let Some(c) = update.center {
            circle.center = c;
            fields.center = true;
        }
        if let Some(r) = update.radius {
            circle.radius = r;
            fields.radius = true;
        }
        if let Some(i) = update.intensity {
            circle.intensity = i;
            fields.intensity = true;
        }

        self.events.publish(ParameterEvent::Updated { role, fields });
        Ok(fields)
    }

    pub(crate) fn view_changed(&mut self) {
        self.events.publish(ParameterEvent::ViewChanged);
    }
}
