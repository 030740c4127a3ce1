use bevy::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerAction {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    ToggleDetails,
    WindUp,
    WindDown,
    ToggleTerrainLock,
}

/// Held state for movement, edge state for toggles.
#[derive(Default, Resource)]
pub struct ActionState {
    pressed: HashMap<PlayerAction, bool>,
    just_pressed: HashMap<PlayerAction, bool>,
}

impl ActionState {
    pub fn set(&mut self, action: PlayerAction, is_pressed: bool) {
        self.pressed.insert(action, is_pressed);
    }

    pub fn set_just_pressed(&mut self, action: PlayerAction, fired: bool) {
        self.just_pressed.insert(action, fired);
    }

    pub fn pressed(&self, action: PlayerAction) -> bool {
        *self.pressed.get(&action).unwrap_or(&false)
    }

    pub fn just_pressed(&self, action: PlayerAction) -> bool {
        *self.just_pressed.get(&action).unwrap_or(&false)
    }
}
