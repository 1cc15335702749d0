// Transfer - send the active voucher to another registered account

use tracing::{info, warn};

use crate::collaborators::{AccountStatus, Services, Voucher};
use crate::machine::{
    Candidate, EngineError, ErrorRoute, Invoke, MachineContext, MachineDefinition, MachineErrorCode,
    MachineId, StateNode, StepError, StepFuture, Tag,
};
use crate::phone::normalize_phone;
use crate::registry::MAIN_MENU;

use super::authorization::{account_blocked, pin_group};
use super::guards;

const RECIPIENT: &str = "recipient";
const RECIPIENT_NAME: &str = "recipientName";
const RECIPIENT_ADDRESS: &str = "recipientAddress";
const AMOUNT: &str = "amount";
const BALANCE: &str = "balance";
const REFERENCE: &str = "reference";

pub fn definition() -> MachineDefinition {
    MachineDefinition::new(MachineId::Transfer, "enteringRecipient")
        .state(
            StateNode::new("enteringRecipient")
                .on_back(Candidate::to(MAIN_MENU))
                .on_transit(Candidate::to("validatingRecipient").when(guards::has_input)),
        )
        .state(
            StateNode::new("validatingRecipient").invoke(
                Invoke::new("validateRecipient", validate_recipient)
                    .on_done(Candidate::to("enteringAmount"))
                    .on_error(ErrorRoute::any("invalidRecipient")),
            ),
        )
        .state(
            StateNode::new("invalidRecipient")
                .tag(Tag::Error)
                .on_retry(Candidate::to("enteringRecipient"))
                .on_back(Candidate::to(MAIN_MENU)),
        )
        .state(
            StateNode::new("enteringAmount")
                .on_back(Candidate::to("enteringRecipient"))
                .on_transit(Candidate::to("checkingBalance").when(guards::is_amount).then(store_amount))
                .on_transit(Candidate::to("invalidAmount")),
        )
        .state(
            StateNode::new("checkingBalance").invoke(
                Invoke::new("checkBalance", check_balance)
                    .on_done(Candidate::to("confirmingTransfer"))
                    .on_error(ErrorRoute::on(MachineErrorCode::InsufficientBalance, "invalidAmount"))
                    .on_error(ErrorRoute::any("transferError")),
            ),
        )
        .state(
            StateNode::new("invalidAmount")
                .tag(Tag::Error)
                .on_retry(Candidate::to("enteringAmount"))
                .on_back(Candidate::to("enteringRecipient")),
        )
        .states(pin_group("confirmingTransfer", "processingTransfer", "enteringAmount"))
        .state(
            StateNode::new("processingTransfer").invoke(
                Invoke::new("processTransfer", process_transfer)
                    .on_done(Candidate::to("transferInitiated"))
                    .on_error(ErrorRoute::any("transferError")),
            ),
        )
        .state(StateNode::new("transferInitiated").terminal())
        .state(StateNode::new("transferError").terminal())
        .state(account_blocked())
        .state(StateNode::new(MAIN_MENU))
}

fn store_amount(ctx: &mut MachineContext) -> Result<(), EngineError> {
    let amount: f64 = ctx
        .input()
        .parse()
        .map_err(|_| EngineError::malformed("ussdInput", "is not an amount"))?;
    ctx.set(AMOUNT, amount);
    Ok(())
}

fn validate_recipient<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let Some(recipient) = normalize_phone(ctx.input(), &ctx.country_code) else {
            return Err(StepError::machine(MachineErrorCode::InvalidRecipient, ctx.input()));
        };
        if recipient == ctx.phone_number {
            return Err(StepError::machine(MachineErrorCode::SelfTransfer, recipient));
        }

        let account = services.accounts.get_by_phone(&recipient).await?;
        let Some(account) = account.filter(|account| account.status == AccountStatus::Active) else {
            return Err(StepError::machine(MachineErrorCode::NotFound, recipient));
        };

        ctx.set(RECIPIENT_NAME, account.display_name());
        ctx.set(RECIPIENT_ADDRESS, account.address);
        ctx.set(RECIPIENT, recipient);
        Ok(())
    })
}

fn check_balance<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let amount = ctx.get_f64(AMOUNT)?;
        let address = ctx.account()?.address.clone();
        let voucher = active_voucher(ctx)?;

        let balance = services
            .balances
            .get(&address, &voucher.address)
            .await
            .map_err(|error| StepError::machine(MachineErrorCode::LoadError, error.to_string()))?;
        ctx.set(BALANCE, balance);

        if amount > balance {
            return Err(StepError::machine(
                MachineErrorCode::InsufficientBalance,
                format!("{balance:.2} {}", voucher.symbol),
            ));
        }
        Ok(())
    })
}

/// An account without an active voucher has nothing to send.
fn active_voucher(ctx: &MachineContext) -> Result<Voucher, StepError> {
    ctx.voucher()
        .cloned()
        .map_err(|_| StepError::machine(MachineErrorCode::LoadError, "no active voucher"))
}

fn process_transfer<'a>(ctx: &'a mut MachineContext, services: &'a Services) -> StepFuture<'a> {
    Box::pin(async move {
        let amount = ctx.get_f64(AMOUNT)?;
        let recipient = ctx.get_str(RECIPIENT)?.to_string();
        let recipient_address = ctx.get_str(RECIPIENT_ADDRESS)?.to_string();
        let sender = ctx.account()?.clone();
        let voucher = active_voucher(ctx)?;

        let reference = services
            .ledger
            .transfer(&sender.address, &recipient_address, amount, &voucher.address)
            .await
            .map_err(|error| {
                warn!(error = %error, "Transfer rejected by ledger");
                StepError::machine(MachineErrorCode::TransferFailed, error.to_string())
            })?;

        let sent = format!(
            "You sent {amount:.2} {} to {recipient}. Ref {reference}",
            voucher.symbol
        );
        let received = format!(
            "You received {amount:.2} {} from {}.",
            voucher.symbol,
            sender.display_name()
        );
        for (message, phone) in [(sent, sender.phone_number.clone()), (received, recipient.clone())] {
            if let Err(error) = services.notifier.send(&message, &[phone]).await {
                warn!(error = %error, "Transfer SMS not sent");
            }
        }

        info!(amount = amount, symbol = %voucher.symbol, reference = %reference, "Transfer initiated");
        ctx.set(REFERENCE, reference);
        Ok(())
    })
}
