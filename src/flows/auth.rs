// Auth - first PIN for pending accounts, new PIN after a guardian reset

use tracing::{info, warn};

use crate::collaborators::{AccountStatus, Services};
use crate::machine::{
    Candidate, EngineError, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode,
    MachineId, StateNode, StepError, StepFuture, Tag,
};
use crate::registry::{ACCOUNT_BLOCKED, MAIN_MENU};

use super::guards::{self, NEW_PIN};

pub fn definition() -> MachineDefinition {
    MachineDefinition::new(MachineId::Auth, "routing")
        .state(StateNode::new("routing").always(route_by_status))
        .state(
            StateNode::new("enteringNewPin")
                .on_transit(Candidate::to("confirmingNewPin").when(guards::is_pin).then(stash_new_pin))
                .on_transit(Candidate::to("invalidNewPin")),
        )
        .state(
            StateNode::new("confirmingNewPin")
                .on_back(Candidate::to("enteringNewPin"))
                .on_transit(Candidate::to("activatingAccount").when(guards::matches_new_pin))
                .on_transit(Candidate::to("pinMismatch")),
        )
        .state(
            StateNode::new("invalidNewPin")
                .tag(Tag::Error)
                .on_retry(Candidate::to("enteringNewPin")),
        )
        .state(
            StateNode::new("pinMismatch")
                .tag(Tag::Error)
                .on_retry(Candidate::to("enteringNewPin").then(forget_new_pin)),
        )
        .state(
            StateNode::new("activatingAccount").invoke(
                Invoke::new("activateAccount", activate_account)
                    .on_done(Candidate::to(MAIN_MENU))
                    .on_error(ErrorRoute::any("activationError")),
            ),
        )
        .state(StateNode::new(MAIN_MENU).tag(Tag::Resolved))
        .state(StateNode::new("activationError").terminal())
        .state(StateNode::new(ACCOUNT_BLOCKED).terminal())
}

fn route_by_status(ctx: &MachineContext) -> Result<Option<&'static str>, EngineError> {
    if ctx.account()?.is_blocked() {
        Ok(Some(ACCOUNT_BLOCKED))
    } else {
        Ok(Some("enteringNewPin"))
    }
}

fn stash_new_pin(ctx: &mut MachineContext) -> Result<(), EngineError> {
    let pin = ctx.input().to_string();
    ctx.set(NEW_PIN, pin);
    Ok(())
}

fn forget_new_pin(ctx: &mut MachineContext) -> Result<(), EngineError> {
    ctx.remove(NEW_PIN);
    Ok(())
}

fn activate_account<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let pin = ctx.get_str(NEW_PIN)?.to_string();
        let phone = ctx.account()?.phone_number.clone();
        let pin_hash = services.hasher.hash(&pin);

        let activation = async {
            services.accounts.set_pin(&phone, &pin_hash).await?;
            services.accounts.set_status(&phone, AccountStatus::Active).await?;
            services.accounts.reset(&phone).await
        };
        activation.await.map_err(|error| {
            warn!(phone = %phone, error = %error, "Account activation failed");
            StepError::machine(MachineErrorCode::UpdateFailed, error.to_string())
        })?;

        ctx.remove(NEW_PIN);
        let account = ctx.account_mut()?;
        account.pin_hash = Some(pin_hash);
        account.status = AccountStatus::Active;
        account.pin_attempts = 0;
        info!(phone = %phone, "Account activated");
        Ok(())
    })
}
