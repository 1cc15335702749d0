// Numeric jump tables for the menu states

use std::collections::HashMap;

use crate::machine::MachineId;

pub const MAIN_MENU: &str = "mainMenu";
pub const SETTINGS_MENU: &str = "settingsMenu";
pub const PIN_MANAGEMENT_MENU: &str = "pinManagementMenu";

/// One menu state: which machine owns it and where each option leads.
#[derive(Debug, Clone)]
pub struct MenuSpec {
    pub state: &'static str,
    /// Re-displays the menu for unknown options
    pub owner: MachineId,
    pub options: HashMap<&'static str, MachineId>,
}

impl MenuSpec {
    pub fn target(&self, input: &str) -> MachineId {
        self.options.get(input).copied().unwrap_or(self.owner)
    }
}

/// All menu states keyed by their leaf state name.
#[derive(Debug, Clone, Default)]
pub struct MenuTable {
    menus: HashMap<&'static str, MenuSpec>,
}

impl MenuTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// mainMenu -> {transfer, voucher, settings},
    /// settingsMenu -> {profile, language, balances, statement, pinManagement},
    /// pinManagementMenu -> {socialRecovery}.
    pub fn standard() -> Self {
        Self::empty()
            .menu(
                MAIN_MENU,
                MachineId::Main,
                &[
                    ("1", MachineId::Transfer),
                    ("2", MachineId::Voucher),
                    ("3", MachineId::Settings),
                ],
            )
            .menu(
                SETTINGS_MENU,
                MachineId::Settings,
                &[
                    ("1", MachineId::Profile),
                    ("2", MachineId::Language),
                    ("3", MachineId::Balances),
                    ("4", MachineId::Statement),
                    ("5", MachineId::PinManagement),
                    ("0", MachineId::Main),
                ],
            )
            .menu(
                PIN_MANAGEMENT_MENU,
                MachineId::PinManagement,
                &[("3", MachineId::SocialRecovery), ("0", MachineId::Settings)],
            )
    }

    pub fn menu(mut self, state: &'static str, owner: MachineId, options: &[(&'static str, MachineId)]) -> Self {
        let spec = MenuSpec {
            state,
            owner,
            options: options.iter().copied().collect(),
        };
        self.menus.insert(state, spec);
        self
    }

    pub fn get(&self, state: &str) -> Option<&MenuSpec> {
        self.menus.get(state)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MenuSpec> {
        self.menus.values()
    }
}
