// Registration - pick a language, then create a pending account

use tracing::{info, warn};

use crate::collaborators::Services;
use crate::machine::{
    Candidate, EngineError, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode,
    MachineId, StateNode, StepError, StepFuture,
};

use super::lists::{self, page_states, select_listed, SELECTED};
use super::{guards, language_names, SUPPORTED_LANGUAGES};

const LANGUAGE: &str = "language";

const PAGES: [&str; 3] = ["firstLanguageSet", "secondLanguageSet", "thirdLanguageSet"];

pub fn definition() -> MachineDefinition {
    let choose = Candidate::to("creatingAccount")
        .when(guards::is_listed)
        .then(select_listed)
        .then(remember_language);

    MachineDefinition::new(MachineId::Registration, PAGES[0])
        .states(page_states(PAGES, Some(load_languages), Some(choose), "exit"))
        .state(
            StateNode::new("creatingAccount").invoke(
                Invoke::new("createAccount", create_account)
                    .on_done(Candidate::to("accountCreated"))
                    .on_error(ErrorRoute::any("accountCreationError")),
            ),
        )
        .state(StateNode::new("accountCreated").terminal())
        .state(StateNode::new("accountCreationError").terminal())
        .state(StateNode::new("exit").terminal())
}

pub(super) fn load_languages(ctx: &mut MachineContext) -> Result<(), EngineError> {
    let codes = SUPPORTED_LANGUAGES.iter().map(|(code, _)| code.to_string()).collect();
    lists::prepare_list(ctx, codes, language_names());
    Ok(())
}

fn remember_language(ctx: &mut MachineContext) -> Result<(), EngineError> {
    let language = ctx.get_str(SELECTED)?.to_string();
    ctx.set(LANGUAGE, language);
    Ok(())
}

fn create_account<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let language = ctx.get_str(LANGUAGE)?.to_string();
        let account = services
            .accounts
            .create(&ctx.phone_number, &language)
            .await
            .map_err(|error| {
                warn!(error = %error, "Account creation failed");
                StepError::machine(MachineErrorCode::UpdateFailed, error.to_string())
            })?;

        let recipients = [ctx.phone_number.clone()];
        if let Err(error) = services
            .notifier
            .send("Your account is being created. You will receive an SMS when it is ready.", &recipients)
            .await
        {
            warn!(error = %error, "Welcome SMS not sent");
        }

        info!(phone = %ctx.phone_number, language = %language, "Registered account");
        ctx.account = Some(account);
        Ok(())
    })
}
