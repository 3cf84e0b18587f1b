use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{Error, Result, ValidationError};
use crate::events::EventBus;
use crate::model::DisasterTaxonomy;
use crate::simulation::SimulationResponse;

/// Ordered steps of the guided flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    DisasterChoice = 0,
    InputParameters = 1,
    Simulation = 2,
    Results = 3,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        Self::DisasterChoice,
        Self::InputParameters,
        Self::Simulation,
        Self::Results,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Saturates at both ends of the sequence.
    pub fn from_index(i: usize) -> Self {
        Self::ALL[i.min(Self::ALL.len() - 1)]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WizardState {
    pub wizard_step: WizardStep,
    pub chosen_disaster: Option<DisasterTaxonomy>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WizardEvent {
    /// Published exactly once per state mutation, after the mutation.
    StateChanged(WizardState),
    /// User-facing failure notice; the accompanying step change is a separate event.
    SimulationFailed(String),
}

/// Owner of [`WizardState`]. Also tracks the token of the outstanding
/// simulation so late responses can be told apart from current ones.
#[derive(Debug)]
pub struct WizardStateMachine {
    state: WizardState,
    response: Option<SimulationResponse>,
    last_token: u64,
    in_flight: Option<u64>,
    in_flight_tx: watch::Sender<Option<u64>>,
    pub events: EventBus<WizardEvent>,
}

impl Default for WizardStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardStateMachine {
    pub fn new() -> Self {
        Self {
            state: WizardState::default(),
            response: None,
            last_token: 0,
            in_flight: None,
            in_flight_tx: watch::Sender::new(None),
            events: EventBus::new(),
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn step(&self) -> WizardStep {
        self.state.wizard_step
    }

    pub fn chosen_disaster(&self) -> Option<DisasterTaxonomy> {
        self.state.chosen_disaster
    }

    pub fn response(&self) -> Option<&SimulationResponse> {
        self.response.as_ref()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Follows the in-flight token, so a running request can notice it was abandoned.
    pub fn watch_in_flight(&self) -> watch::Receiver<Option<u64>> {
        self.in_flight_tx.subscribe()
    }

    fn set_in_flight(&mut self, token: Option<u64>) {
        self.in_flight = token;
        self.in_flight_tx.send_replace(token);
    }

    fn expect_step(&self, expected: WizardStep) -> std::result::Result<(), ValidationError> {
        if self.state.wizard_step == expected {
            Ok(())
        } else {
            Err(ValidationError::WrongStep {
                expected,
                actual: self.state.wizard_step,
            })
        }
    }

    fn changed(&mut self) {
        debug!(step = ?self.state.wizard_step, disaster = ?self.state.chosen_disaster, "wizard state changed");
        self.events.publish(WizardEvent::StateChanged(self.state));
    }

    /// Record the choice, run `start` for it, then move to `InputParameters`.
    pub fn choose_disaster(
        &mut self,
        taxonomy: DisasterTaxonomy,
        start: impl FnOnce(DisasterTaxonomy),
    ) -> std::result::Result<(), ValidationError> {
        self.expect_step(WizardStep::DisasterChoice)?;
        self.state.chosen_disaster = Some(taxonomy);
        start(taxonomy);
        self.state.wizard_step = WizardStep::InputParameters;
        info!(disaster = taxonomy.as_str(), "disaster chosen");
        self.changed();
        Ok(())
    }

    /// Step back, never past `DisasterChoice`. Leaving `Simulation` abandons the
    /// outstanding request; reaching `DisasterChoice` forgets the chosen disaster.
    /// Returns whether the state changed.
    pub fn go_back(&mut self, steps: usize) -> bool {
        let current = self.state.wizard_step;
        let target = WizardStep::from_index(current.index().saturating_sub(steps));
        if target == current {
            return false;
        }
        if target < WizardStep::Simulation {
            if let Some(token) = self.in_flight {
                debug!(token, "abandoning in-flight simulation");
                self.set_in_flight(None);
            }
        }
        if target < WizardStep::Results {
            self.response = None;
        }
        if target == WizardStep::DisasterChoice {
            self.state.chosen_disaster = None;
        }
        self.state.wizard_step = target;
        self.changed();
        true
    }

    /// `InputParameters -> Simulation`, or a re-run from an idle `Simulation`
    /// step reached by stepping back from `Results`. Returns the token the
    /// completion must present.
    pub fn advance_to_simulation(&mut self) -> std::result::Result<u64, ValidationError> {
        if self.in_flight.is_some() {
            return Err(ValidationError::SimulationInFlight);
        }
        if self.state.chosen_disaster.is_none() {
            return Err(ValidationError::NoDisasterChosen);
        }
        let rerun = self.state.wizard_step == WizardStep::Simulation;
        if !rerun {
            self.expect_step(WizardStep::InputParameters)?;
        }
        self.last_token += 1;
        let token = self.last_token;
        self.set_in_flight(Some(token));
        if rerun {
            debug!(token, "re-running simulation");
        } else {
            self.state.wizard_step = WizardStep::Simulation;
            self.changed();
        }
        Ok(token)
    }

    fn take_in_flight(&mut self, token: u64) -> Result<()> {
        if self.in_flight == Some(token) && self.state.wizard_step == WizardStep::Simulation {
            self.set_in_flight(None);
            Ok(())
        } else {
            Err(Error::StaleResponse {
                token,
                current: self.in_flight,
            })
        }
    }

    /// `Simulation -> Results`, storing the response.
    pub fn complete_success(&mut self, token: u64, response: SimulationResponse) -> Result<()> {
        self.take_in_flight(token)?;
        info!(
            token,
            cities = response.cities.len(),
            edges = response.edges.len(),
            "simulation results received"
        );
        self.response = Some(response);
        self.state.wizard_step = WizardStep::Results;
        self.changed();
        Ok(())
    }

    /// `Simulation -> InputParameters`, re-running `restart` for the chosen
    /// disaster so the user can retry, then publishing the failure notice.
    pub fn complete_failure(
        &mut self,
        token: u64,
        message: String,
        restart: impl FnOnce(DisasterTaxonomy),
    ) -> Result<()> {
        self.take_in_flight(token)?;
        if let Some(taxonomy) = self.state.chosen_disaster {
            restart(taxonomy);
        }
        self.state.wizard_step = WizardStep::InputParameters;
        self.changed();
        self.events.publish(WizardEvent::SimulationFailed(message));
        Ok(())
    }

    /// Back to a fresh session: `DisasterChoice`, nothing chosen, nothing pending.
    pub fn restart(&mut self) {
        self.set_in_flight(None);
        self.response = None;
        self.state = WizardState::default();
        self.changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::record;

    fn state_changes(log: &[WizardEvent]) -> Vec<WizardStep> {
        log.iter()
            .filter_map(|e| match e {
                WizardEvent::StateChanged(s) => Some(s.wizard_step),
                _ => None,
            })
            .collect()
    }

    fn at_input(taxonomy: DisasterTaxonomy) -> WizardStateMachine {
        let mut w = WizardStateMachine::new();
        w.choose_disaster(taxonomy, |_| {}).unwrap();
        w
    }

    #[test]
    fn starts_at_disaster_choice() {
        let w = WizardStateMachine::new();
        assert_eq!(w.step(), WizardStep::DisasterChoice);
        assert_eq!(w.chosen_disaster(), None);
    }

    #[test]
    fn choose_runs_start_before_advancing() {
        let mut w = WizardStateMachine::new();
        let log = record(&mut w.events);
        let mut started = Vec::new();
        w.choose_disaster(DisasterTaxonomy::Hurricane, |t| started.push(t))
            .unwrap();
        assert_eq!(started, vec![DisasterTaxonomy::Hurricane]);
        assert_eq!(w.step(), WizardStep::InputParameters);
        assert_eq!(w.chosen_disaster(), Some(DisasterTaxonomy::Hurricane));
        assert_eq!(state_changes(&log.lock().unwrap()), vec![WizardStep::InputParameters]);
    }

    #[test]
    fn choose_is_rejected_after_disaster_choice() {
        let mut w = at_input(DisasterTaxonomy::Earthquake);
        let err = w
            .choose_disaster(DisasterTaxonomy::Hurricane, |_| panic!("must not start"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::WrongStep { .. }));
        assert_eq!(w.chosen_disaster(), Some(DisasterTaxonomy::Earthquake));
    }

    #[test]
    fn go_back_never_passes_disaster_choice() {
        for steps in [0usize, 1, 2, 3, 4, 10, usize::MAX] {
            let mut w = at_input(DisasterTaxonomy::Earthquake);
            w.advance_to_simulation().unwrap();
            for _ in 0..5 {
                w.go_back(steps);
                assert!(w.step() >= WizardStep::DisasterChoice);
                assert!(w.step().index() < WizardStep::ALL.len());
            }
        }
    }

    #[test]
    fn go_back_to_start_clears_choice() {
        let mut w = at_input(DisasterTaxonomy::Earthquake);
        let log = record(&mut w.events);
        assert!(w.go_back(5));
        assert_eq!(w.step(), WizardStep::DisasterChoice);
        assert_eq!(w.chosen_disaster(), None);
        assert!(!w.go_back(1));
        assert_eq!(state_changes(&log.lock().unwrap()), vec![WizardStep::DisasterChoice]);
    }

    #[test]
    fn advance_requires_input_step_and_choice() {
        let mut w = WizardStateMachine::new();
        assert_eq!(w.advance_to_simulation(), Err(ValidationError::NoDisasterChosen));
        let mut w = at_input(DisasterTaxonomy::Earthquake);
        let token = w.advance_to_simulation().unwrap();
        assert_eq!(w.in_flight(), Some(token));
        assert_eq!(w.advance_to_simulation(), Err(ValidationError::SimulationInFlight));
    }

    #[test]
    fn success_moves_to_results() {
        let mut w = at_input(DisasterTaxonomy::Earthquake);
        let token = w.advance_to_simulation().unwrap();
        w.complete_success(token, SimulationResponse::default()).unwrap();
        assert_eq!(w.step(), WizardStep::Results);
        assert!(w.response().is_some());
        assert_eq!(w.in_flight(), None);
    }

    #[test]
    fn failure_restarts_chosen_disaster_once() {
        let mut w = at_input(DisasterTaxonomy::Hurricane);
        let token = w.advance_to_simulation().unwrap();
        let log = record(&mut w.events);
        let mut restarted = Vec::new();
        w.complete_failure(token, "boom".into(), |t| restarted.push(t))
            .unwrap();
        assert_eq!(restarted, vec![DisasterTaxonomy::Hurricane]);
        assert_eq!(w.step(), WizardStep::InputParameters);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                WizardEvent::StateChanged(w.state()),
                WizardEvent::SimulationFailed("boom".into()),
            ]
        );
    }

    #[test]
    fn late_response_after_go_back_is_stale() {
        let mut w = at_input(DisasterTaxonomy::Earthquake);
        let token = w.advance_to_simulation().unwrap();
        w.go_back(1);
        let err = w
            .complete_success(token, SimulationResponse::default())
            .unwrap_err();
        assert!(matches!(err, Error::StaleResponse { .. }));
        assert_eq!(w.step(), WizardStep::InputParameters);
        assert!(w.response().is_none());

        // A newer request gets a fresh token; the old one stays stale.
        let newer = w.advance_to_simulation().unwrap();
        assert!(newer > token);
        assert!(w.complete_success(token, SimulationResponse::default()).is_err());
        assert!(w.complete_success(newer, SimulationResponse::default()).is_ok());
    }

    #[test]
    fn restart_resets_everything() {
        let mut w = at_input(DisasterTaxonomy::Earthquake);
        let token = w.advance_to_simulation().unwrap();
        w.complete_success(token, SimulationResponse::default()).unwrap();
        w.restart();
        assert_eq!(w.state(), WizardState::default());
        assert!(w.response().is_none());
        assert_eq!(w.in_flight(), None);
    }

    #[test]
    fn restart_abandons_outstanding_request() {
        let mut w = at_input(DisasterTaxonomy::Hurricane);
        let token = w.advance_to_simulation().unwrap();
        let watcher = w.watch_in_flight();
        assert_eq!(*watcher.borrow(), Some(token));

        w.restart();

        assert_eq!(w.in_flight(), None);
        assert_eq!(*watcher.borrow(), None);
        assert!(w.complete_success(token, SimulationResponse::default()).is_err());
        assert_eq!(w.state(), WizardState::default());
    }

    #[test]
    fn simulation_step_reached_from_results_can_run_again() {
        let mut w = at_input(DisasterTaxonomy::Earthquake);
        let first = w.advance_to_simulation().unwrap();
        w.complete_success(first, SimulationResponse::default()).unwrap();
        assert!(w.go_back(1));
        assert_eq!(w.step(), WizardStep::Simulation);
        assert_eq!(w.in_flight(), None);

        let log = record(&mut w.events);
        let second = w.advance_to_simulation().unwrap();
        assert!(second > first);
        assert_eq!(w.step(), WizardStep::Simulation);
        assert_eq!(w.in_flight(), Some(second));
        assert_eq!(
            w.advance_to_simulation(),
            Err(ValidationError::SimulationInFlight)
        );
        // Already at `Simulation`; no step change to announce.
        assert!(log.lock().unwrap().is_empty());

        w.complete_success(second, SimulationResponse::default()).unwrap();
        assert_eq!(w.step(), WizardStep::Results);
    }
}
