//! Immutable catalogue of machines plus the menu jump tables.
//!
//! Built once at startup and shared read-only across turns.

pub mod menus;

use std::collections::BTreeMap;

pub use menus::{MenuSpec, MenuTable, MAIN_MENU, PIN_MANAGEMENT_MENU, SETTINGS_MENU};

use crate::collaborators::AccountStatus;
use crate::flows;
use crate::machine::{leaf_name, EngineError, MachineDefinition, MachineId};

/// Terminal state every blocked account ends up in.
pub const ACCOUNT_BLOCKED: &str = "accountBlocked";

/// How the resolved machine is to be entered this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// Keep the current machine and apply the input to it
    Resume,
    /// Machine jump: enter at the initial state, input is not replayed
    Start,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub machine: MachineId,
    pub entry: Entry,
}

impl Resolution {
    fn resume(machine: MachineId) -> Self {
        Self {
            machine,
            entry: Entry::Resume,
        }
    }

    fn start(machine: MachineId) -> Self {
        Self {
            machine,
            entry: Entry::Start,
        }
    }
}

#[derive(Debug)]
pub struct MachineRegistry {
    definitions: BTreeMap<MachineId, MachineDefinition>,
    menus: MenuTable,
}

impl MachineRegistry {
    /// Validate and index `definitions`.
    pub fn new(definitions: Vec<MachineDefinition>, menus: MenuTable) -> Result<Self, EngineError> {
        let mut indexed = BTreeMap::new();
        for definition in definitions {
            definition.validate()?;
            if indexed.insert(definition.id, definition).is_some() {
                return Err(EngineError::Registry("machine defined twice".to_string()));
            }
        }

        for menu in menus.iter() {
            if let Some(owner) = indexed.get(&menu.owner) {
                if !owner.nodes().any(|node| leaf_name(&node.path) == menu.state) {
                    return Err(EngineError::Registry(format!(
                        "menu '{}' is not a state of its owner {}",
                        menu.state, menu.owner
                    )));
                }
            }
        }

        Ok(Self {
            definitions: indexed,
            menus,
        })
    }

    /// Every flow with the standard jump tables.
    pub fn standard() -> Result<Self, EngineError> {
        Self::new(flows::definitions(), MenuTable::standard())
    }

    pub fn definition(&self, machine: MachineId) -> Result<&MachineDefinition, EngineError> {
        self.definitions
            .get(&machine)
            .ok_or(EngineError::UnknownMachine(machine))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MachineDefinition> {
        self.definitions.values()
    }

    pub fn menus(&self) -> &MenuTable {
        &self.menus
    }

    /// Machine that serves an account status when nothing else applies.
    pub fn home_machine(status: Option<AccountStatus>) -> MachineId {
        match status {
            None => MachineId::Registration,
            Some(AccountStatus::Pending | AccountStatus::Blocked | AccountStatus::ResettingPin) => {
                MachineId::Auth
            }
            Some(AccountStatus::Active) => MachineId::Main,
        }
    }

    /// Whether `machine` may keep serving an account in `status`.
    pub fn admits(machine: MachineId, status: Option<AccountStatus>) -> bool {
        match machine {
            MachineId::Registration => status.is_none(),
            MachineId::Auth => status.is_some(),
            _ => status == Some(AccountStatus::Active),
        }
    }

    /// Decide which machine handles this turn and whether it is a jump.
    ///
    /// `current` is `None` for a brand-new session.
    pub fn resolve(
        &self,
        status: Option<AccountStatus>,
        current: Option<(MachineId, &str)>,
        input: &str,
    ) -> Resolution {
        let input = input.trim();
        let stay_or_start = |machine: MachineId| match current {
            Some((current, _)) if current == machine => Resolution::resume(machine),
            _ => Resolution::start(machine),
        };

        match status {
            None => stay_or_start(MachineId::Registration),
            Some(AccountStatus::Blocked) => match current {
                Some((MachineId::Auth, state)) if leaf_name(state) == ACCOUNT_BLOCKED => {
                    Resolution::resume(MachineId::Auth)
                }
                _ => Resolution::start(MachineId::Auth),
            },
            Some(AccountStatus::Pending | AccountStatus::ResettingPin) => stay_or_start(MachineId::Auth),
            Some(AccountStatus::Active) => {
                let Some((machine, state)) = current else {
                    // A first contact behaves as if parked on the main menu
                    let target = self
                        .menus
                        .get(MAIN_MENU)
                        .map(|menu| menu.target(input))
                        .unwrap_or(MachineId::Main);
                    return Resolution::start(target);
                };

                if let Some(menu) = self.menus.get(leaf_name(state)) {
                    let target = menu.target(input);
                    if target == machine && menu.owner == machine {
                        Resolution::resume(machine)
                    } else {
                        Resolution::start(target)
                    }
                } else if Self::admits(machine, status) {
                    Resolution::resume(machine)
                } else {
                    Resolution::start(MachineId::Main)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MachineRegistry {
        MachineRegistry::standard().expect("standard registry is valid")
    }

    const ACTIVE: Option<AccountStatus> = Some(AccountStatus::Active);

    #[test]
    fn unknown_accounts_register() {
        let resolution = registry().resolve(None, None, "");
        assert_eq!(resolution, Resolution::start(MachineId::Registration));

        let resolution = registry().resolve(None, Some((MachineId::Registration, "firstLanguageSet")), "1");
        assert_eq!(resolution, Resolution::resume(MachineId::Registration));
    }

    #[test]
    fn pending_and_blocked_accounts_authenticate() {
        let registry = registry();
        assert_eq!(
            registry.resolve(Some(AccountStatus::Pending), None, "1").machine,
            MachineId::Auth
        );
        assert_eq!(
            registry.resolve(Some(AccountStatus::Blocked), Some((MachineId::Transfer, "enteringAmount")), "5"),
            Resolution::start(MachineId::Auth)
        );
        assert_eq!(
            registry.resolve(Some(AccountStatus::Blocked), Some((MachineId::Auth, ACCOUNT_BLOCKED)), "5"),
            Resolution::resume(MachineId::Auth)
        );
    }

    #[test]
    fn main_menu_options_jump() {
        let registry = registry();
        let at_main = Some((MachineId::Main, MAIN_MENU));

        assert_eq!(registry.resolve(ACTIVE, at_main, "1"), Resolution::start(MachineId::Transfer));
        assert_eq!(registry.resolve(ACTIVE, at_main, "2"), Resolution::start(MachineId::Voucher));
        assert_eq!(registry.resolve(ACTIVE, at_main, "3"), Resolution::start(MachineId::Settings));
        assert_eq!(registry.resolve(ACTIVE, at_main, "7"), Resolution::resume(MachineId::Main));
    }

    #[test]
    fn nested_menus_jump_and_fall_back_to_their_owner() {
        let registry = registry();
        let at_settings = Some((MachineId::Settings, SETTINGS_MENU));
        let at_pins = Some((MachineId::PinManagement, PIN_MANAGEMENT_MENU));

        assert_eq!(registry.resolve(ACTIVE, at_settings, "5"), Resolution::start(MachineId::PinManagement));
        assert_eq!(registry.resolve(ACTIVE, at_settings, "0"), Resolution::start(MachineId::Main));
        assert_eq!(registry.resolve(ACTIVE, at_settings, "9"), Resolution::resume(MachineId::Settings));
        assert_eq!(registry.resolve(ACTIVE, at_pins, "3"), Resolution::start(MachineId::SocialRecovery));
        assert_eq!(registry.resolve(ACTIVE, at_pins, "1"), Resolution::resume(MachineId::PinManagement));
    }

    #[test]
    fn flows_parked_on_a_borrowed_menu_restart() {
        let registry = registry();
        let parked = Some((MachineId::Transfer, MAIN_MENU));

        assert_eq!(registry.resolve(ACTIVE, parked, "1"), Resolution::start(MachineId::Transfer));
        assert_eq!(registry.resolve(ACTIVE, parked, "x"), Resolution::start(MachineId::Main));
    }

    #[test]
    fn mid_flow_turns_stay_put() {
        let registry = registry();
        assert_eq!(
            registry.resolve(ACTIVE, Some((MachineId::Transfer, "enteringAmount")), "1"),
            Resolution::resume(MachineId::Transfer)
        );
        assert_eq!(
            registry.resolve(ACTIVE, Some((MachineId::Registration, "accountCreated")), "1"),
            Resolution::start(MachineId::Main)
        );
    }

    #[test]
    fn new_active_sessions_honour_the_first_option() {
        let registry = registry();
        assert_eq!(registry.resolve(ACTIVE, None, "1"), Resolution::start(MachineId::Transfer));
        assert_eq!(registry.resolve(ACTIVE, None, ""), Resolution::start(MachineId::Main));
    }
}
