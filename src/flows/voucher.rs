// Voucher - pick which held voucher is active for transfers and balances

use tracing::{info, warn};

use crate::collaborators::Services;
use crate::machine::{
    Candidate, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode, MachineId,
    StateNode, StepError, StepFuture,
};
use crate::registry::MAIN_MENU;

use super::authorization::{account_blocked, pin_group};
use super::guards;
use super::lists::{page_states, prepare_list, select_listed, SELECTED};

const PAGES: [&str; 3] = ["firstVoucherSet", "secondVoucherSet", "thirdVoucherSet"];

pub fn definition() -> MachineDefinition {
    let choose = Candidate::to("confirmingSelection")
        .when(guards::is_listed)
        .then(select_listed);

    MachineDefinition::new(MachineId::Voucher, "loadingVouchers")
        .state(
            StateNode::new("loadingVouchers").invoke(
                Invoke::new("loadVouchers", load_vouchers)
                    .on_done(Candidate::to(PAGES[0]))
                    .on_error(ErrorRoute::any("loadError")),
            ),
        )
        .states(page_states(PAGES, None, Some(choose), MAIN_MENU))
        .states(pin_group("confirmingSelection", "settingActiveVoucher", PAGES[0]))
        .state(
            StateNode::new("settingActiveVoucher").invoke(
                Invoke::new("setActiveVoucher", set_active_voucher)
                    .on_done(Candidate::to("activeVoucherSet"))
                    .on_error(ErrorRoute::any("updateError")),
            ),
        )
        .state(StateNode::new("activeVoucherSet").terminal())
        .state(StateNode::new("loadError").terminal())
        .state(StateNode::new("updateError").terminal())
        .state(account_blocked())
        .state(StateNode::new(MAIN_MENU))
}

fn load_vouchers<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let address = ctx.account()?.address.clone();
        let vouchers = services.vouchers.held_by(&address).await.map_err(|error| {
            warn!(error = %error, "Could not load held vouchers");
            StepError::machine(MachineErrorCode::LoadError, error.to_string())
        })?;

        let symbols = vouchers.iter().map(|voucher| voucher.symbol.clone()).collect();
        let labels = vouchers
            .iter()
            .map(|voucher| format!("{} {}", voucher.symbol, voucher.name))
            .collect();
        prepare_list(ctx, symbols, labels);
        Ok(())
    })
}

fn set_active_voucher<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let symbol = ctx.get_str(SELECTED)?.to_string();
        let phone = ctx.account()?.phone_number.clone();

        let voucher = services
            .vouchers
            .by_symbol(&symbol)
            .await?
            .ok_or_else(|| StepError::machine(MachineErrorCode::NotFound, symbol.clone()))?;
        services
            .accounts
            .set_active_voucher(&phone, &symbol)
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::UpdateFailed, error.to_string()))?;

        ctx.account_mut()?.active_voucher = Some(symbol.clone());
        ctx.active_voucher = Some(voucher);
        info!(phone = %phone, symbol = %symbol, "Active voucher changed");
        Ok(())
    })
}
