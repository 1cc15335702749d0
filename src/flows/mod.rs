//! The flow catalogue: one machine definition per conversational flow.
//!
//! Flows share guards, the paged list states and the PIN authorization
//! group. Menu options that leave a flow are not transitions here; they live
//! in the registry's jump tables.

pub mod authorization;
pub mod guards;
pub mod lists;

mod auth;
mod balances;
mod language;
mod main_menu;
mod pin_management;
mod profile;
mod registration;
mod settings;
mod social_recovery;
mod statement;
mod transfer;
mod voucher;

use crate::machine::MachineDefinition;

/// Languages offered at registration and in the language menu.
pub const SUPPORTED_LANGUAGES: [(&str, &str); 2] = [("eng", "English"), ("swa", "Kiswahili")];

fn language_names() -> Vec<String> {
    SUPPORTED_LANGUAGES
        .iter()
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Every flow definition, in catalogue order.
pub fn definitions() -> Vec<MachineDefinition> {
    vec![
        registration::definition(),
        auth::definition(),
        main_menu::definition(),
        transfer::definition(),
        voucher::definition(),
        settings::definition(),
        profile::definition(),
        language::definition(),
        balances::definition(),
        statement::definition(),
        pin_management::definition(),
        social_recovery::definition(),
    ]
}
