//! Per-kind action sets
//!
//! Every entity kind has a closed set of actions, modelled as an enum. The
//! enum variant maps to the Home Assistant service that performs it; the
//! service name doubles as the action name used in rules.

use std::fmt::Debug;

use crate::error::{EntityError, EntityResult};

/// A closed set of actions understood by one entity domain
pub trait EntityAction: Copy + Debug + Send + Sync + 'static {
    /// Home Assistant domain the actions belong to
    const DOMAIN: &'static str;

    /// Every action of this kind
    const ALL: &'static [Self];

    /// Service name, e.g. `turn_on`
    fn service(&self) -> &'static str;

    /// Look up an action by its service name
    fn parse(name: &str) -> EntityResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.service() == name)
            .ok_or_else(|| EntityError::UnknownAction {
                domain: Self::DOMAIN.to_string(),
                action: name.to_string(),
                valid: Self::names().join(", "),
            })
    }

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|action| action.service()).collect()
    }
}

/// Actions for `switch.*` entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchAction {
    TurnOn,
    TurnOff,
    Toggle,
}

impl EntityAction for SwitchAction {
    const DOMAIN: &'static str = "switch";
    const ALL: &'static [Self] = &[Self::TurnOn, Self::TurnOff, Self::Toggle];

    fn service(&self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Toggle => "toggle",
        }
    }
}

/// Actions for `light.*` entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightAction {
    TurnOn,
    TurnOff,
    Toggle,
}

impl EntityAction for LightAction {
    const DOMAIN: &'static str = "light";
    const ALL: &'static [Self] = &[Self::TurnOn, Self::TurnOff, Self::Toggle];

    fn service(&self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Toggle => "toggle",
        }
    }
}

/// Actions for `cover.*` entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverAction {
    Open,
    Close,
    Stop,
    SetPosition,
}

impl EntityAction for CoverAction {
    const DOMAIN: &'static str = "cover";
    const ALL: &'static [Self] = &[Self::Open, Self::Close, Self::Stop, Self::SetPosition];

    fn service(&self) -> &'static str {
        match self {
            Self::Open => "open_cover",
            Self::Close => "close_cover",
            Self::Stop => "stop_cover",
            Self::SetPosition => "set_cover_position",
        }
    }
}
