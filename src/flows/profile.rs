// Profile - edit or view the account holder's names

use tracing::info;

use crate::collaborators::Services;
use crate::machine::{
    Candidate, EngineError, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode,
    MachineId, StateNode, StepError, StepFuture,
};
use crate::registry::SETTINGS_MENU;

use super::authorization::{account_blocked, pin_group};
use super::guards;

const GIVEN_NAMES: &str = "givenNames";
const FAMILY_NAME: &str = "familyName";

pub fn definition() -> MachineDefinition {
    MachineDefinition::new(MachineId::Profile, "profileMenu")
        .state(
            StateNode::new("profileMenu")
                .on_back(Candidate::to(SETTINGS_MENU))
                .on_transit(Candidate::to("enteringGivenNames").when(guards::is_option::<1>))
                .on_transit(Candidate::to("authorizingView").when(guards::is_option::<2>)),
        )
        .state(
            StateNode::new("enteringGivenNames")
                .on_back(Candidate::to("profileMenu"))
                .on_transit(Candidate::to("enteringFamilyName").when(guards::has_input).then(store_given_names)),
        )
        .state(
            StateNode::new("enteringFamilyName")
                .on_back(Candidate::to("enteringGivenNames"))
                .on_transit(Candidate::to("authorizingUpdate").when(guards::has_input).then(store_family_name)),
        )
        .states(pin_group("authorizingUpdate", "savingProfile", "enteringFamilyName"))
        .state(
            StateNode::new("savingProfile").invoke(
                Invoke::new("saveProfile", save_profile)
                    .on_done(Candidate::to("profileUpdated"))
                    .on_error(ErrorRoute::any("updateError")),
            ),
        )
        .states(pin_group("authorizingView", "displayingProfile", "profileMenu"))
        .state(StateNode::new("displayingProfile").terminal())
        .state(StateNode::new("profileUpdated").terminal())
        .state(StateNode::new("updateError").terminal())
        .state(account_blocked())
        .state(StateNode::new(SETTINGS_MENU))
}

fn store_given_names(ctx: &mut MachineContext) -> Result<(), EngineError> {
    let names = ctx.input().to_string();
    ctx.set(GIVEN_NAMES, names);
    Ok(())
}

fn store_family_name(ctx: &mut MachineContext) -> Result<(), EngineError> {
    let name = ctx.input().to_string();
    ctx.set(FAMILY_NAME, name);
    Ok(())
}

fn save_profile<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let given = ctx.get_str(GIVEN_NAMES)?.to_string();
        let family = ctx.get_str(FAMILY_NAME)?.to_string();
        let phone = ctx.account()?.phone_number.clone();

        services
            .accounts
            .set_names(&phone, &given, &family)
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::UpdateFailed, error.to_string()))?;

        let account = ctx.account_mut()?;
        account.given_names = Some(given);
        account.family_name = Some(family);
        info!(phone = %phone, "Profile updated");
        Ok(())
    })
}
