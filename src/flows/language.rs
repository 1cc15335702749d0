// Language - change the account's display language

use tracing::info;

use crate::collaborators::Services;
use crate::machine::{
    Candidate, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode, MachineId,
    StateNode, StepError, StepFuture,
};
use crate::registry::SETTINGS_MENU;

use super::authorization::{account_blocked, pin_group};
use super::guards;
use super::lists::{page_states, select_listed, SELECTED};
use super::registration::load_languages;

const PAGES: [&str; 3] = ["firstLanguageSet", "secondLanguageSet", "thirdLanguageSet"];

pub fn definition() -> MachineDefinition {
    let choose = Candidate::to("confirmingChange")
        .when(guards::is_listed)
        .then(select_listed);

    MachineDefinition::new(MachineId::Language, PAGES[0])
        .states(page_states(PAGES, Some(load_languages), Some(choose), SETTINGS_MENU))
        .states(pin_group("confirmingChange", "savingLanguage", PAGES[0]))
        .state(
            StateNode::new("savingLanguage").invoke(
                Invoke::new("saveLanguage", save_language)
                    .on_done(Candidate::to("languageChanged"))
                    .on_error(ErrorRoute::any("updateError")),
            ),
        )
        .state(StateNode::new("languageChanged").terminal())
        .state(StateNode::new("updateError").terminal())
        .state(account_blocked())
        .state(StateNode::new(SETTINGS_MENU))
}

fn save_language<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let language = ctx.get_str(SELECTED)?.to_string();
        let phone = ctx.account()?.phone_number.clone();
        services
            .accounts
            .set_language(&phone, &language)
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::UpdateFailed, error.to_string()))?;

        ctx.account_mut()?.language = language.clone();
        info!(phone = %phone, language = %language, "Language changed");
        Ok(())
    })
}
