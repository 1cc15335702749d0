// Settings - a menu whose options all jump to other machines

use crate::machine::{MachineDefinition, MachineId, StateNode};
use crate::registry::SETTINGS_MENU;

pub fn definition() -> MachineDefinition {
    MachineDefinition::new(MachineId::Settings, SETTINGS_MENU).state(StateNode::new(SETTINGS_MENU))
}
