// Balances - show the active voucher balance after a PIN check

use crate::collaborators::Services;
use crate::machine::{
    Candidate, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode, MachineId,
    StateNode, StepError, StepFuture,
};
use crate::registry::SETTINGS_MENU;

use super::authorization::{account_blocked, pin_group};

const BALANCE: &str = "balance";

pub fn definition() -> MachineDefinition {
    MachineDefinition::new(MachineId::Balances, "authorizingBalance")
        .states(pin_group("authorizingBalance", "loadingBalance", SETTINGS_MENU))
        .state(
            StateNode::new("loadingBalance").invoke(
                Invoke::new("loadBalance", load_balance)
                    .on_done(Candidate::to("displayingBalance"))
                    .on_error(ErrorRoute::any("loadError")),
            ),
        )
        .state(StateNode::new("displayingBalance").terminal())
        .state(StateNode::new("loadError").terminal())
        .state(account_blocked())
        .state(StateNode::new(SETTINGS_MENU))
}

fn load_balance<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let address = ctx.account()?.address.clone();
        let voucher_address = ctx
            .voucher()
            .map_err(|_| StepError::machine(MachineErrorCode::LoadError, "no active voucher"))?
            .address
            .clone();

        let balance = services
            .balances
            .get(&address, &voucher_address)
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::LoadError, error.to_string()))?;
        ctx.set(BALANCE, balance);
        Ok(())
    })
}
