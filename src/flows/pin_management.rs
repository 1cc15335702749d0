// PIN management - change your own PIN or reset a ward's PIN as their guardian

use tracing::{info, warn};

use crate::collaborators::{AccountStatus, Services};
use crate::machine::{
    Candidate, EngineError, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode,
    MachineId, StateNode, StepError, StepFuture, Tag,
};
use crate::phone::normalize_phone;
use crate::registry::PIN_MANAGEMENT_MENU;

use super::authorization::{account_blocked, pin_group};
use super::guards::{self, NEW_PIN};

const WARD: &str = "ward";

pub fn definition() -> MachineDefinition {
    MachineDefinition::new(MachineId::PinManagement, PIN_MANAGEMENT_MENU)
        .state(
            StateNode::new(PIN_MANAGEMENT_MENU)
                .on_transit(Candidate::to("authorizingChange").when(guards::is_option::<1>))
                .on_transit(Candidate::to("enteringWard").when(guards::is_option::<2>)),
        )
        // Changing the caller's own PIN
        .states(pin_group("authorizingChange", "enteringNewPin", PIN_MANAGEMENT_MENU))
        .state(
            StateNode::new("enteringNewPin")
                .on_back(Candidate::to(PIN_MANAGEMENT_MENU))
                .on_transit(Candidate::to("confirmingNewPin").when(guards::is_pin).then(stash_new_pin))
                .on_transit(Candidate::to("invalidNewPin")),
        )
        .state(
            StateNode::new("confirmingNewPin")
                .on_back(Candidate::to("enteringNewPin"))
                .on_transit(Candidate::to("savingPin").when(guards::matches_new_pin))
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
                .on_retry(Candidate::to("enteringNewPin")),
        )
        .state(
            StateNode::new("savingPin").invoke(
                Invoke::new("savePin", save_pin)
                    .on_done(Candidate::to("pinChanged"))
                    .on_error(ErrorRoute::any("updateError")),
            ),
        )
        .state(StateNode::new("pinChanged").terminal())
        // Resetting a ward's PIN
        .state(
            StateNode::new("enteringWard")
                .on_back(Candidate::to(PIN_MANAGEMENT_MENU))
                .on_transit(Candidate::to("validatingWard").when(guards::has_input)),
        )
        .state(
            StateNode::new("validatingWard").invoke(
                Invoke::new("validateWard", validate_ward)
                    .on_done(Candidate::to("authorizingReset"))
                    .on_error(ErrorRoute::any("invalidWard")),
            ),
        )
        .state(
            StateNode::new("invalidWard")
                .tag(Tag::Error)
                .on_retry(Candidate::to("enteringWard"))
                .on_back(Candidate::to(PIN_MANAGEMENT_MENU)),
        )
        .states(pin_group("authorizingReset", "resettingWardPin", "enteringWard"))
        .state(
            StateNode::new("resettingWardPin").invoke(
                Invoke::new("resetWardPin", reset_ward_pin)
                    .on_done(Candidate::to("wardPinReset"))
                    .on_error(ErrorRoute::any("updateError")),
            ),
        )
        .state(StateNode::new("wardPinReset").terminal())
        .state(StateNode::new("updateError").terminal())
        .state(account_blocked())
}

fn stash_new_pin(ctx: &mut MachineContext) -> Result<(), EngineError> {
    let pin = ctx.input().to_string();
    ctx.set(NEW_PIN, pin);
    Ok(())
}

fn save_pin<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let pin = ctx.get_str(NEW_PIN)?.to_string();
        let phone = ctx.account()?.phone_number.clone();
        let pin_hash = services.hasher.hash(&pin);

        services
            .accounts
            .set_pin(&phone, &pin_hash)
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::UpdateFailed, error.to_string()))?;

        ctx.remove(NEW_PIN);
        ctx.account_mut()?.pin_hash = Some(pin_hash);
        info!(phone = %phone, "PIN changed");
        Ok(())
    })
}

/// The ward must exist and must list the caller as a guardian.
fn validate_ward<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let Some(ward) = normalize_phone(ctx.input(), &ctx.country_code) else {
            return Err(StepError::machine(MachineErrorCode::InvalidRecipient, ctx.input()));
        };
        let guardian = ctx.phone_number.clone();
        if ward == guardian {
            return Err(StepError::machine(MachineErrorCode::Unauthorized, ward));
        }

        let Some(account) = services.accounts.get_by_phone(&ward).await? else {
            return Err(StepError::machine(MachineErrorCode::NotFound, ward));
        };
        if !account.guardians.contains(&guardian) {
            return Err(StepError::machine(MachineErrorCode::Unauthorized, ward));
        }

        ctx.set(WARD, ward);
        Ok(())
    })
}

fn reset_ward_pin<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let ward = ctx.get_str(WARD)?.to_string();
        let guardian = ctx.account()?.display_name();

        let reset = async {
            services.accounts.set_status(&ward, AccountStatus::ResettingPin).await?;
            services.accounts.reset(&ward).await
        };
        reset
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::UpdateFailed, error.to_string()))?;

        let message = format!("{guardian} has reset your PIN. Dial in to choose a new one.");
        if let Err(error) = services.notifier.send(&message, &[ward.clone()]).await {
            warn!(error = %error, "PIN reset SMS not sent");
        }
        info!(ward = %ward, "Ward PIN reset by guardian");
        Ok(())
    })
}
