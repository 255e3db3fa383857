//! Action sources that drive the engine from outside: a scripted scenario
//! replayer and a minimal expansion autopilot.

use std::collections::HashMap;

use serde::Deserialize;

use probe_core::{
    Action, ActionEnvelope, ActionId, Catalog, GameState, ProbeAllocations, TransferKind,
    TransferPayload, TransferSpec,
};

pub trait ActionSource {
    fn generate_actions(
        &mut self,
        state: &GameState,
        catalog: &Catalog,
        next_action_id: &mut u64,
    ) -> Vec<ActionEnvelope>;
}

fn envelope(next_action_id: &mut u64, action: Action) -> ActionEnvelope {
    let id = ActionId(format!("act_{:06}", *next_action_id));
    *next_action_id += 1;
    ActionEnvelope { id, action }
}

/// Drives the swarm automatically:
/// 1. Zones holding probes with no allocation get a harvest/replicate split
///    (the Dyson zone builds instead).
/// 2. Once a zone has a mass driver and a metal surplus, a continuous feed
///    to the Dyson zone is opened.
pub struct AutopilotController;

/// Surplus threshold before the autopilot opens a Dyson feed.
const DYSON_FEED_MIN_SURPLUS_KG: f64 = 100_000.0;
/// Daily feed rate as a fraction of the zone's metal stock at open time.
const DYSON_FEED_RATE_FRACTION: f64 = 0.1;

impl ActionSource for AutopilotController {
    fn generate_actions(
        &mut self,
        state: &GameState,
        catalog: &Catalog,
        next_action_id: &mut u64,
    ) -> Vec<ActionEnvelope> {
        let mut actions = Vec::new();
        let dyson_zone = catalog.dyson_zone().map(|zone| zone.id.clone());

        for zone_def in &catalog.zones {
            if state.probe_count(&zone_def.id) <= 0.0 {
                continue;
            }

            if state.allocation(&zone_def.id).sum() <= 0.0 {
                let allocations = if zone_def.is_dyson {
                    ProbeAllocations {
                        dyson: 1.0,
                        ..Default::default()
                    }
                } else {
                    ProbeAllocations {
                        harvest: 0.6,
                        replicate: 0.4,
                        ..Default::default()
                    }
                };
                actions.push(envelope(
                    next_action_id,
                    Action::SetZoneAllocation {
                        zone: zone_def.id.clone(),
                        allocations,
                    },
                ));
            }

            let Some(dyson_id) = &dyson_zone else {
                continue;
            };
            if zone_def.is_dyson {
                continue;
            }
            let stock = state
                .zones
                .get(&zone_def.id)
                .map_or(0.0, |zone| zone.stored_metal);
            let has_feed = state.transfers.iter().any(|transfer| {
                transfer.from_zone == zone_def.id
                    && &transfer.to_zone == dyson_id
                    && matches!(transfer.kind, TransferKind::ContinuousMetal { .. })
            });
            if !has_feed
                && stock >= DYSON_FEED_MIN_SURPLUS_KG
                && probe_core::mass_driver_count(state, catalog, &zone_def.id) >= 1
            {
                actions.push(envelope(
                    next_action_id,
                    Action::CreateTransfer {
                        spec: TransferSpec {
                            from_zone: zone_def.id.clone(),
                            to_zone: dyson_id.clone(),
                            payload: TransferPayload::ContinuousMetal {
                                metal_rate_kg_per_day: stock * DYSON_FEED_RATE_FRACTION,
                            },
                        },
                    },
                ));
            }
        }

        actions
    }
}

/// Replays a scripted sequence of actions keyed by tick.
pub struct ScenarioSource {
    script: HashMap<u64, Vec<Action>>,
}

#[derive(Deserialize)]
struct ScenarioFile {
    /// Tick (as a string key, JSON maps) to the actions fired at it.
    steps: HashMap<String, Vec<Action>>,
}

impl ScenarioSource {
    pub fn new(script: HashMap<u64, Vec<Action>>) -> Self {
        ScenarioSource { script }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: ScenarioFile = serde_json::from_str(json)?;
        let mut script: HashMap<u64, Vec<Action>> = HashMap::new();
        for (tick, actions) in file.steps {
            let tick: u64 = tick.parse().map_err(|_| {
                <serde_json::Error as serde::de::Error>::custom(format!(
                    "scenario step key '{tick}' is not a tick"
                ))
            })?;
            script.entry(tick).or_default().extend(actions);
        }
        Ok(ScenarioSource { script })
    }
}

impl ActionSource for ScenarioSource {
    fn generate_actions(
        &mut self,
        state: &GameState,
        _catalog: &Catalog,
        next_action_id: &mut u64,
    ) -> Vec<ActionEnvelope> {
        self.script
            .remove(&state.meta.tick)
            .unwrap_or_default()
            .into_iter()
            .map(|action| envelope(next_action_id, action))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::test_fixtures::{base_catalog, base_state, dyson_zone, earth, place_probes};
    use probe_core::BuildingId;

    #[test]
    fn autopilot_seeds_allocations_for_occupied_zones() {
        let catalog = base_catalog();
        let state = base_state(&catalog);
        let mut next_id = 0;
        let actions =
            AutopilotController.generate_actions(&state, &catalog, &mut next_id);

        assert_eq!(actions.len(), 1);
        assert!(matches!(
            &actions[0].action,
            Action::SetZoneAllocation { zone, allocations }
                if zone == &earth() && (allocations.harvest - 0.6).abs() < 1e-12
        ));
    }

    #[test]
    fn autopilot_leaves_configured_zones_alone() {
        let catalog = base_catalog();
        let mut state = base_state(&catalog);
        state.allocations.insert(
            earth(),
            ProbeAllocations {
                harvest: 1.0,
                ..Default::default()
            },
        );
        let mut next_id = 0;
        let actions =
            AutopilotController.generate_actions(&state, &catalog, &mut next_id);
        assert!(actions.is_empty());
    }

    #[test]
    fn autopilot_opens_a_dyson_feed_over_the_surplus_threshold() {
        let catalog = base_catalog();
        let mut state = base_state(&catalog);
        state.allocations.insert(
            earth(),
            ProbeAllocations {
                harvest: 1.0,
                ..Default::default()
            },
        );
        state
            .structures
            .entry(earth())
            .or_default()
            .insert(BuildingId("mass_driver".to_string()), 1);
        state.zones.get_mut(&earth()).unwrap().stored_metal = 2e5;

        let mut next_id = 0;
        let actions =
            AutopilotController.generate_actions(&state, &catalog, &mut next_id);
        assert_eq!(actions.len(), 1);
        assert!(matches!(
            &actions[0].action,
            Action::CreateTransfer { spec }
                if spec.from_zone == earth() && spec.to_zone == dyson_zone()
        ));

        // Applying the action and asking again must not open a second feed.
        probe_core::tick(&mut state, &actions, &catalog);
        let again = AutopilotController.generate_actions(&state, &catalog, &mut next_id);
        assert!(
            again
                .iter()
                .all(|a| !matches!(a.action, Action::CreateTransfer { .. })),
            "feed already exists"
        );
    }

    #[test]
    fn autopilot_assigns_dyson_zone_builders() {
        let catalog = base_catalog();
        let mut state = base_state(&catalog);
        place_probes(&mut state, &catalog, &dyson_zone(), 10.0);
        let mut next_id = 0;
        let actions =
            AutopilotController.generate_actions(&state, &catalog, &mut next_id);
        assert!(actions.iter().any(|a| matches!(
            &a.action,
            Action::SetZoneAllocation { zone, allocations }
                if zone == &dyson_zone() && (allocations.dyson - 1.0).abs() < 1e-12
        )));
    }

    #[test]
    fn scenario_source_fires_at_the_scripted_tick() {
        let catalog = base_catalog();
        let mut state = base_state(&catalog);
        let mut source = ScenarioSource::from_json(
            r#"{
                "steps": {
                    "0": [{"kind": "set_time_speed", "speed": 10.0}],
                    "2": [{"kind": "set_dyson_power_allocation", "allocation": 0.5}]
                }
            }"#,
        )
        .unwrap();

        let mut next_id = 0;
        for _ in 0..4 {
            let actions = source.generate_actions(&state, &catalog, &mut next_id);
            probe_core::tick(&mut state, &actions, &catalog);
        }
        assert!((state.meta.speed - 10.0).abs() < 1e-12);
        assert!((state.dyson.power_allocation - 0.5).abs() < 1e-12);
    }

    #[test]
    fn scenario_rejects_non_numeric_tick_keys() {
        assert!(ScenarioSource::from_json(r#"{"steps": {"soon": []}}"#).is_err());
    }
}
