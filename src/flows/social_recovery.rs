// Social recovery - manage the guardians allowed to reset your PIN

use tracing::info;

use crate::collaborators::Services;
use crate::machine::{
    Candidate, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode, MachineId,
    StateNode, StepError, StepFuture, Tag,
};
use crate::phone::normalize_phone;
use crate::registry::PIN_MANAGEMENT_MENU;

use super::authorization::{account_blocked, pin_group};
use super::guards;
use super::lists::{page_states, prepare_list, select_listed, SELECTED};

const GUARDIAN: &str = "guardian";

const PAGES: [&str; 3] = ["firstGuardianSet", "secondGuardianSet", "thirdGuardianSet"];

pub fn definition() -> MachineDefinition {
    let choose = Candidate::to("authorizingRemoval")
        .when(guards::is_listed)
        .then(select_listed);

    MachineDefinition::new(MachineId::SocialRecovery, "guardianMenu")
        .state(
            StateNode::new("guardianMenu")
                .on_back(Candidate::to(PIN_MANAGEMENT_MENU))
                .on_transit(Candidate::to("enteringGuardian").when(guards::is_option::<1>))
                .on_transit(Candidate::to("loadingGuardians").when(guards::is_option::<2>)),
        )
        // Adding a guardian
        .state(
            StateNode::new("enteringGuardian")
                .on_back(Candidate::to("guardianMenu"))
                .on_transit(Candidate::to("validatingGuardian").when(guards::has_input)),
        )
        .state(
            StateNode::new("validatingGuardian").invoke(
                Invoke::new("validateGuardian", validate_guardian)
                    .on_done(Candidate::to("authorizingAddition"))
                    .on_error(ErrorRoute::on(MachineErrorCode::AlreadyAdded, "guardianExists"))
                    .on_error(ErrorRoute::any("invalidGuardian")),
            ),
        )
        .state(
            StateNode::new("invalidGuardian")
                .tag(Tag::Error)
                .on_retry(Candidate::to("enteringGuardian"))
                .on_back(Candidate::to("guardianMenu")),
        )
        .state(
            StateNode::new("guardianExists")
                .tag(Tag::Error)
                .on_retry(Candidate::to("enteringGuardian"))
                .on_back(Candidate::to("guardianMenu")),
        )
        .states(pin_group("authorizingAddition", "addingGuardian", "enteringGuardian"))
        .state(
            StateNode::new("addingGuardian").invoke(
                Invoke::new("addGuardian", add_guardian)
                    .on_done(Candidate::to("guardianAdded"))
                    .on_error(ErrorRoute::any("updateError")),
            ),
        )
        .state(StateNode::new("guardianAdded").terminal())
        // Removing a guardian
        .state(
            StateNode::new("loadingGuardians").invoke(
                Invoke::new("loadGuardians", load_guardians).on_done(Candidate::to(PAGES[0])),
            ),
        )
        .states(page_states(PAGES, None, Some(choose), "guardianMenu"))
        .states(pin_group("authorizingRemoval", "removingGuardian", PAGES[0]))
        .state(
            StateNode::new("removingGuardian").invoke(
                Invoke::new("removeGuardian", remove_guardian)
                    .on_done(Candidate::to("guardianRemoved"))
                    .on_error(ErrorRoute::any("updateError")),
            ),
        )
        .state(StateNode::new("guardianRemoved").terminal())
        .state(StateNode::new("updateError").terminal())
        .state(account_blocked())
        .state(StateNode::new(PIN_MANAGEMENT_MENU))
}

fn validate_guardian<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let Some(guardian) = normalize_phone(ctx.input(), &ctx.country_code) else {
            return Err(StepError::machine(MachineErrorCode::InvalidRecipient, ctx.input()));
        };
        let account = ctx.account()?;
        if guardian == account.phone_number {
            return Err(StepError::machine(MachineErrorCode::SelfTransfer, guardian));
        }
        if account.guardians.contains(&guardian) {
            return Err(StepError::machine(MachineErrorCode::AlreadyAdded, guardian));
        }
        if services.accounts.get_by_phone(&guardian).await?.is_none() {
            return Err(StepError::machine(MachineErrorCode::NotFound, guardian));
        }

        ctx.set(GUARDIAN, guardian);
        Ok(())
    })
}

fn add_guardian<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let guardian = ctx.get_str(GUARDIAN)?.to_string();
        let phone = ctx.account()?.phone_number.clone();
        services
            .accounts
            .add_guardian(&phone, &guardian)
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::UpdateFailed, error.to_string()))?;

        ctx.account_mut()?.guardians.push(guardian.clone());
        info!(phone = %phone, guardian = %guardian, "Guardian added");
        Ok(())
    })
}

fn load_guardians<'a>(ctx: &'a mut MachineContext, _services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let guardians = ctx.account()?.guardians.clone();
        prepare_list(ctx, guardians.clone(), guardians);
        Ok(())
    })
}

fn remove_guardian<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let guardian = ctx.get_str(SELECTED)?.to_string();
        let phone = ctx.account()?.phone_number.clone();
        services
            .accounts
            .remove_guardian(&phone, &guardian)
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::UpdateFailed, error.to_string()))?;

        ctx.account_mut()?.guardians.retain(|existing| existing != &guardian);
        info!(phone = %phone, guardian = %guardian, "Guardian removed");
        Ok(())
    })
}
