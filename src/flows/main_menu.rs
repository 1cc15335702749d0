// Main - the top-level menu; its numbered options are jump-table entries

use crate::machine::{Candidate, MachineDefinition, MachineId, StateNode};
use crate::registry::MAIN_MENU;

use super::guards;

pub fn definition() -> MachineDefinition {
    MachineDefinition::new(MachineId::Main, MAIN_MENU)
        .state(StateNode::new(MAIN_MENU).on_transit(Candidate::to("help").when(guards::is_option::<4>)))
        .state(StateNode::new("help").terminal())
}
