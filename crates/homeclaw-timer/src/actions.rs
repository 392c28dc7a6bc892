//! Action vocabulary — the closed set of operations a timer can perform,
//! and the table that resolves each one to a concrete hub service call.

use serde::{Deserialize, Serialize};

/// An abstract action a timer can perform on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    On,
    Off,
    Toggle,
    TurnOff,
    OpenCover,
    CloseCover,
    StopCover,
    MediaPlay,
    MediaStop,
    Start,
    ReturnToBase,
    SetHvacModeHeat,
    SetHvacModeCool,
    SetHvacModeAuto,
}

impl Action {
    /// The reverse action for run-now mode: on↔off, anything else toggles.
    pub fn reverse(&self) -> Action {
        match self {
            Action::On => Action::Off,
            Action::Off | Action::TurnOff => Action::On,
            _ => Action::Toggle,
        }
    }

    /// Wire name of the action (matches the serde representation).
    pub fn name(&self) -> &'static str {
        match self {
            Action::On => "on",
            Action::Off => "off",
            Action::Toggle => "toggle",
            Action::TurnOff => "turn_off",
            Action::OpenCover => "open_cover",
            Action::CloseCover => "close_cover",
            Action::StopCover => "stop_cover",
            Action::MediaPlay => "media_play",
            Action::MediaStop => "media_stop",
            Action::Start => "start",
            Action::ReturnToBase => "return_to_base",
            Action::SetHvacModeHeat => "set_hvac_mode_heat",
            Action::SetHvacModeCool => "set_hvac_mode_cool",
            Action::SetHvacModeAuto => "set_hvac_mode_auto",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a service call targets: the entity's own domain, or a fixed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDomain {
    /// Use the domain prefix of the entity id (`light.kitchen` → `light`).
    Entity,
    /// A fixed domain regardless of the entity (`cover`, `vacuum`, ...).
    Fixed(&'static str),
}

/// A resolved hub service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCall {
    pub domain: String,
    pub service: &'static str,
    /// Extra service data beyond the entity id, as (key, value) pairs.
    pub extra: Vec<(&'static str, &'static str)>,
}

/// One row of the dispatch table.
struct Route {
    action: Action,
    domain: CallDomain,
    service: &'static str,
    extra: Option<(&'static str, &'static str)>,
}

/// Action → service routing. Extending the vocabulary means adding a row.
const ROUTES: &[Route] = &[
    Route { action: Action::On, domain: CallDomain::Entity, service: "turn_on", extra: None },
    Route { action: Action::Off, domain: CallDomain::Entity, service: "turn_off", extra: None },
    Route { action: Action::Toggle, domain: CallDomain::Entity, service: "toggle", extra: None },
    Route { action: Action::TurnOff, domain: CallDomain::Entity, service: "turn_off", extra: None },
    Route { action: Action::OpenCover, domain: CallDomain::Fixed("cover"), service: "open_cover", extra: None },
    Route { action: Action::CloseCover, domain: CallDomain::Fixed("cover"), service: "close_cover", extra: None },
    Route { action: Action::StopCover, domain: CallDomain::Fixed("cover"), service: "stop_cover", extra: None },
    Route { action: Action::MediaPlay, domain: CallDomain::Fixed("media_player"), service: "media_play", extra: None },
    Route { action: Action::MediaStop, domain: CallDomain::Fixed("media_player"), service: "media_stop", extra: None },
    Route { action: Action::Start, domain: CallDomain::Fixed("vacuum"), service: "start", extra: None },
    Route { action: Action::ReturnToBase, domain: CallDomain::Fixed("vacuum"), service: "return_to_base", extra: None },
    Route { action: Action::SetHvacModeHeat, domain: CallDomain::Fixed("climate"), service: "set_hvac_mode", extra: Some(("hvac_mode", "heat")) },
    Route { action: Action::SetHvacModeCool, domain: CallDomain::Fixed("climate"), service: "set_hvac_mode", extra: Some(("hvac_mode", "cool")) },
    Route { action: Action::SetHvacModeAuto, domain: CallDomain::Fixed("climate"), service: "set_hvac_mode", extra: Some(("hvac_mode", "auto")) },
];

/// Domain prefix of an entity id (`light.kitchen` → `light`).
pub fn entity_domain(entity_id: &str) -> &str {
    entity_id.split('.').next().unwrap_or(entity_id)
}

/// Resolve an action against an entity into a concrete service call.
/// Actions without a route fall back to toggling the entity.
pub fn resolve(entity_id: &str, action: Action) -> ServiceCall {
    let route = ROUTES.iter().find(|r| r.action == action);
    match route {
        Some(r) => ServiceCall {
            domain: match r.domain {
                CallDomain::Entity => entity_domain(entity_id).to_string(),
                CallDomain::Fixed(d) => d.to_string(),
            },
            service: r.service,
            extra: r.extra.into_iter().collect(),
        },
        None => ServiceCall {
            domain: entity_domain(entity_id).to_string(),
            service: "toggle",
            extra: Vec::new(),
        },
    }
}
