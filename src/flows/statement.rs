// Statement - page through recent transactions

use crate::collaborators::Services;
use crate::machine::{
    Candidate, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode, MachineId,
    StateNode, StepError, StepFuture,
};
use crate::registry::SETTINGS_MENU;

use super::authorization::{account_blocked, pin_group};
use super::lists::{page_states, prepare_list};

const PAGES: [&str; 3] = ["firstTransactionSet", "secondTransactionSet", "thirdTransactionSet"];

pub fn definition() -> MachineDefinition {
    MachineDefinition::new(MachineId::Statement, "authorizingStatement")
        .states(pin_group("authorizingStatement", "loadingStatement", SETTINGS_MENU))
        .state(
            StateNode::new("loadingStatement").invoke(
                Invoke::new("loadStatement", load_statement)
                    .on_done(Candidate::to(PAGES[0]))
                    .on_error(ErrorRoute::any("loadError")),
            ),
        )
        .states(page_states(PAGES, None, None, SETTINGS_MENU))
        .state(StateNode::new("loadError").terminal())
        .state(account_blocked())
        .state(StateNode::new(SETTINGS_MENU))
}

fn load_statement<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let address = ctx.account()?.address.clone();
        let transactions = services
            .ledger
            .statement(&address)
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::LoadError, error.to_string()))?;

        let summaries: Vec<String> = transactions.iter().map(|tx| tx.summary()).collect();
        prepare_list(ctx, summaries.clone(), summaries);
        Ok(())
    })
}
