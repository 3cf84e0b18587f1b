use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::DefaultParams;
use crate::error::{NetworkError, ValidationError};
use crate::events::EventBus;
use crate::geometry::PixelProjection;
use crate::model::{CircleRole, DisasterTaxonomy, EarthquakeParameters, GeoPoint, HurricaneParameters};
use crate::overlay::{self, Layer};
use crate::params::{ChangedFields, CircleUpdate, DisasterParameterModel, ParameterEvent};
use crate::simulation::{SimulationEnvelope, SimulationRequest, SimulationResponse};
use crate::wizard::{WizardEvent, WizardState, WizardStateMachine, WizardStep};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: GeoPoint,
    pub zoom: u8,
}

impl MapView {
    pub fn projection(&self, width: u32, height: u32) -> PixelProjection {
        PixelProjection::centered(self.center, self.zoom as f64, width, height)
    }
}

/// A request that has moved the wizard to `Simulation` and now awaits the backend.
#[derive(Clone, Debug)]
pub struct PendingSimulation {
    pub token: u64,
    pub disaster: DisasterTaxonomy,
    pub envelope: SimulationEnvelope,
    in_flight: watch::Receiver<Option<u64>>,
}

impl PendingSimulation {
    /// False once the wizard has moved on (back, restart) or applied a result.
    pub fn is_current(&self) -> bool {
        *self.in_flight.borrow() == Some(self.token)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SimulationOutcome {
    Completed,
    /// Wizard regressed to `InputParameters` with the overlay reset.
    Failed { message: String },
    /// Arrived after the user moved on; dropped without touching state.
    Discarded { token: u64 },
}

/// Serializable view of a session for outer surfaces.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub state: WizardState,
    pub view: MapView,
    pub earthquake: EarthquakeParameters,
    pub hurricane: HurricaneParameters,
    pub simulation_pending: bool,
    pub response: Option<SimulationResponse>,
}

/// One user's pass through the wizard: the state machine, the parameters it
/// drives, and the map view defaults are taken from.
#[derive(Debug)]
pub struct WizardSession {
    wizard: WizardStateMachine,
    params: DisasterParameterModel,
    view: MapView,
}

impl WizardSession {
    pub fn new(defaults: DefaultParams) -> Self {
        let view = MapView {
            center: defaults.map_center,
            zoom: defaults.map_zoom,
        };
        Self {
            wizard: WizardStateMachine::new(),
            params: DisasterParameterModel::new(defaults),
            view,
        }
    }

    pub fn state(&self) -> WizardState {
        self.wizard.state()
    }

    pub fn wizard(&self) -> &WizardStateMachine {
        &self.wizard
    }

    pub fn params(&self) -> &DisasterParameterModel {
        &self.params
    }

    pub fn view(&self) -> MapView {
        self.view
    }

    pub fn response(&self) -> Option<&SimulationResponse> {
        self.wizard.response()
    }

    pub fn wizard_events(&mut self) -> &mut EventBus<WizardEvent> {
        &mut self.wizard.events
    }

    pub fn parameter_events(&mut self) -> &mut EventBus<ParameterEvent> {
        &mut self.params.events
    }

    pub fn choose_disaster(&mut self, taxonomy: DisasterTaxonomy) -> Result<(), ValidationError> {
        let center = self.view.center;
        let params = &mut self.params;
        self.wizard
            .choose_disaster(taxonomy, |t| params.start(t, center))
    }

    pub fn go_back(&mut self, steps: usize) -> bool {
        self.wizard.go_back(steps)
    }

    pub fn restart(&mut self) {
        self.wizard.restart();
    }

    pub fn set_map_view(&mut self, view: MapView) -> Result<(), ValidationError> {
        view.center.validate()?;
        self.view = view;
        self.params.view_changed();
        Ok(())
    }

    /// Parameters are editable only while the wizard collects them.
    pub fn update_circle(&mut self, role: CircleRole, update: CircleUpdate) -> Result<ChangedFields, ValidationError> {
        if self.wizard.chosen_disaster() != Some(role.taxonomy()) {
            return Err(ValidationError::NoDisasterChosen);
        }
        if self.wizard.step() != WizardStep::InputParameters {
            return Err(ValidationError::WrongStep {
                expected: WizardStep::InputParameters,
                actual: self.wizard.step(),
            });
        }
        self.params.update(role, update)
    }

    pub fn update_earthquake(&mut self, update: CircleUpdate) -> Result<ChangedFields, ValidationError> {
        self.update_circle(CircleRole::Earthquake, update)
    }

    pub fn update_hurricane_start(&mut self, update: CircleUpdate) -> Result<ChangedFields, ValidationError> {
        self.update_circle(CircleRole::HurricaneStart, update)
    }

    pub fn update_hurricane_end(&mut self, update: CircleUpdate) -> Result<ChangedFields, ValidationError> {
        self.update_circle(CircleRole::HurricaneEnd, update)
    }

    /// Build the normalized request and move to `Simulation`. Nothing changes
    /// if validation fails.
    pub fn begin_simulation(&mut self) -> Result<PendingSimulation, ValidationError> {
        if self.wizard.in_flight().is_some() {
            return Err(ValidationError::SimulationInFlight);
        }
        let disaster = self
            .wizard
            .chosen_disaster()
            .ok_or(ValidationError::NoDisasterChosen)?;
        let request = SimulationRequest::from_parameters(self.params.active(disaster))?;
        let token = self.wizard.advance_to_simulation()?;
        Ok(PendingSimulation {
            token,
            disaster,
            envelope: SimulationEnvelope {
                simulation_params: request,
            },
            in_flight: self.wizard.watch_in_flight(),
        })
    }

    /// Apply the backend result for `token`. Results for abandoned tokens are discarded.
    pub fn finish_simulation(
        &mut self,
        token: u64,
        result: Result<SimulationResponse, NetworkError>,
    ) -> SimulationOutcome {
        let applied = match result {
            Ok(response) => self
                .wizard
                .complete_success(token, response)
                .map(|_| SimulationOutcome::Completed),
            Err(err) => {
                let message = err.to_string();
                let center = self.view.center;
                let params = &mut self.params;
                self.wizard
                    .complete_failure(token, message.clone(), |t| params.start(t, center))
                    .map(|_| {
                        warn!(token, error = %message, "simulation failed");
                        SimulationOutcome::Failed { message }
                    })
            }
        };
        applied.unwrap_or_else(|err| {
            debug!(%err, "discarding simulation result");
            SimulationOutcome::Discarded { token }
        })
    }

    /// Layers for the current state, in geographic coordinates.
    pub fn overlay(&self) -> Vec<Layer> {
        overlay::build(self.state(), &self.params, self.response())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            view: self.view,
            earthquake: *self.params.earthquake(),
            hurricane: *self.params.hurricane(),
            simulation_pending: self.wizard.in_flight().is_some(),
            response: self.response().cloned(),
        }
    }
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new(DefaultParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::record;
    use crate::simulation::CityImpact;
    use std::time::Duration;

    fn started_count(log: &[ParameterEvent]) -> usize {
        log.iter()
            .filter(|e| matches!(e, ParameterEvent::Started(_)))
            .count()
    }

    #[test]
    fn choose_resets_parameters_to_view_center() {
        let mut s = WizardSession::default();
        let center = GeoPoint::new(34.05, -118.24);
        s.set_map_view(MapView { center, zoom: 12 }).unwrap();
        let log = record(s.parameter_events());
        s.choose_disaster(DisasterTaxonomy::Earthquake).unwrap();
        assert_eq!(s.params().earthquake().0.center, center);
        assert_eq!(started_count(&log.lock().unwrap()), 1);
        assert_eq!(s.state().wizard_step, WizardStep::InputParameters);
    }

    #[test]
    fn edits_require_matching_disaster_and_step() {
        let mut s = WizardSession::default();
        assert_eq!(
            s.update_earthquake(CircleUpdate::default().radius(1.0)),
            Err(ValidationError::NoDisasterChosen)
        );
        s.choose_disaster(DisasterTaxonomy::Hurricane).unwrap();
        assert!(s.update_earthquake(CircleUpdate::default().radius(1.0)).is_err());
        assert!(s.update_hurricane_start(CircleUpdate::default().radius(1.0)).is_ok());
        s.begin_simulation().unwrap();
        assert!(matches!(
            s.update_hurricane_end(CircleUpdate::default().radius(1.0)),
            Err(ValidationError::WrongStep { .. })
        ));
    }

    #[test]
    fn begin_without_choice_is_rejected_without_state_change() {
        let mut s = WizardSession::default();
        let log = record(s.wizard_events());
        assert_eq!(s.begin_simulation().unwrap_err(), ValidationError::NoDisasterChosen);
        assert_eq!(s.state().wizard_step, WizardStep::DisasterChoice);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn second_begin_while_pending_is_rejected() {
        let mut s = WizardSession::default();
        s.choose_disaster(DisasterTaxonomy::Earthquake).unwrap();
        let pending = s.begin_simulation().unwrap();
        assert_eq!(s.begin_simulation().unwrap_err(), ValidationError::SimulationInFlight);
        assert!(s.snapshot().simulation_pending);
        assert_eq!(pending.envelope.simulation_params.kind(), "earthquake");
    }

    #[test]
    fn network_failure_regresses_and_restarts_overlay_once() {
        let mut s = WizardSession::default();
        s.choose_disaster(DisasterTaxonomy::Hurricane).unwrap();
        s.update_hurricane_start(CircleUpdate::default().intensity(20.0))
            .unwrap();
        let pending = s.begin_simulation().unwrap();
        let params_log = record(s.parameter_events());
        let wizard_log = record(s.wizard_events());

        let outcome = s.finish_simulation(
            pending.token,
            Err(NetworkError::Timeout(Duration::from_secs(30))),
        );

        assert!(matches!(outcome, SimulationOutcome::Failed { .. }));
        assert_eq!(s.state().wizard_step, WizardStep::InputParameters);
        assert_eq!(s.state().chosen_disaster, Some(DisasterTaxonomy::Hurricane));
        assert_eq!(started_count(&params_log.lock().unwrap()), 1);
        assert_eq!(s.params().hurricane().start.intensity, 90.0);
        let wizard_log = wizard_log.lock().unwrap();
        assert!(matches!(wizard_log.last(), Some(WizardEvent::SimulationFailed(_))));
    }

    #[test]
    fn response_after_go_back_is_discarded() {
        let mut s = WizardSession::default();
        s.choose_disaster(DisasterTaxonomy::Earthquake).unwrap();
        let pending = s.begin_simulation().unwrap();
        s.go_back(1);
        let log = record(s.wizard_events());
        let outcome = s.finish_simulation(pending.token, Ok(SimulationResponse::default()));
        assert_eq!(outcome, SimulationOutcome::Discarded { token: pending.token });
        assert_eq!(s.state().wizard_step, WizardStep::InputParameters);
        assert!(s.response().is_none());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn map_view_change_notifies_parameter_channel_once() {
        let mut s = WizardSession::default();
        let log = record(s.parameter_events());
        let view = MapView {
            center: GeoPoint::new(29.76, -95.37),
            zoom: 11,
        };

        s.set_map_view(view).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![ParameterEvent::ViewChanged]);
        assert_eq!(s.view(), view);

        let bad = MapView {
            center: GeoPoint::new(120.0, 0.0),
            zoom: 3,
        };
        assert!(matches!(
            s.set_map_view(bad),
            Err(ValidationError::InvalidCoordinate { .. })
        ));
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(s.view(), view);
    }

    #[test]
    fn completion_after_restart_is_discarded() {
        let mut s = WizardSession::default();
        s.choose_disaster(DisasterTaxonomy::Hurricane).unwrap();
        let pending = s.begin_simulation().unwrap();
        assert!(pending.is_current());

        s.restart();
        assert!(!pending.is_current());
        assert_eq!(s.wizard().in_flight(), None);
        assert!(!s.snapshot().simulation_pending);

        let log = record(s.wizard_events());
        let outcome = s.finish_simulation(pending.token, Ok(SimulationResponse::default()));
        assert_eq!(outcome, SimulationOutcome::Discarded { token: pending.token });
        assert_eq!(s.state().wizard_step, WizardStep::DisasterChoice);
        assert_eq!(s.state().chosen_disaster, None);
        assert!(s.response().is_none());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn results_then_back_one_step_can_simulate_again() {
        let mut s = WizardSession::default();
        s.choose_disaster(DisasterTaxonomy::Earthquake).unwrap();
        let first = s.begin_simulation().unwrap();
        s.finish_simulation(first.token, Ok(SimulationResponse::default()));
        assert!(s.go_back(1));
        assert_eq!(s.state().wizard_step, WizardStep::Simulation);
        assert!(s.response().is_none());

        let second = s.begin_simulation().unwrap();
        assert!(second.token > first.token);
        assert!(s.snapshot().simulation_pending);
        let outcome = s.finish_simulation(second.token, Ok(SimulationResponse::default()));
        assert_eq!(outcome, SimulationOutcome::Completed);
        assert_eq!(s.state().wizard_step, WizardStep::Results);
    }

    #[test]
    fn success_stores_response() {
        let mut s = WizardSession::default();
        s.choose_disaster(DisasterTaxonomy::Earthquake).unwrap();
        let pending = s.begin_simulation().unwrap();
        let response = SimulationResponse {
            cities: vec![CityImpact {
                city: "College Station".into(),
                lat: 30.62,
                lng: -96.33,
                population: 120_000,
                damage: 40.0,
            }],
            edges: vec![],
        };
        let outcome = s.finish_simulation(pending.token, Ok(response.clone()));
        assert_eq!(outcome, SimulationOutcome::Completed);
        assert_eq!(s.state().wizard_step, WizardStep::Results);
        assert_eq!(s.response(), Some(&response));
    }
}
