// Guards shared by every flow

use crate::collaborators::is_valid_pin;
use crate::machine::{EngineError, MachineContext};
use crate::pagination::selectable_count;

use super::lists::LIST_VALUES;

pub const NEXT_PAGE: &str = "11";
pub const PREVIOUS_PAGE: &str = "22";
pub const EXIT: &str = "00";

/// Data key holding a freshly chosen PIN until it is confirmed.
pub const NEW_PIN: &str = "newPin";

type GuardResult = Result<bool, EngineError>;

pub fn has_input(ctx: &MachineContext) -> GuardResult {
    Ok(!ctx.input().is_empty())
}

/// Exact numeric menu option, e.g. `is_option::<2>`.
pub fn is_option<const N: u8>(ctx: &MachineContext) -> GuardResult {
    Ok(ctx.input() == N.to_string())
}

pub fn is_next_page(ctx: &MachineContext) -> GuardResult {
    Ok(ctx.input() == NEXT_PAGE)
}

pub fn is_previous_page(ctx: &MachineContext) -> GuardResult {
    Ok(ctx.input() == PREVIOUS_PAGE)
}

pub fn is_exit(ctx: &MachineContext) -> GuardResult {
    Ok(ctx.input() == EXIT)
}

pub fn is_pin(ctx: &MachineContext) -> GuardResult {
    Ok(is_valid_pin(ctx.input()))
}

pub fn matches_new_pin(ctx: &MachineContext) -> GuardResult {
    Ok(ctx.get_str(NEW_PIN)? == ctx.input())
}

pub fn is_amount(ctx: &MachineContext) -> GuardResult {
    Ok(ctx
        .input()
        .parse::<f64>()
        .is_ok_and(|amount| amount.is_finite() && amount > 0.0))
}

/// Input selects one of the items currently offered by a list.
pub fn is_listed(ctx: &MachineContext) -> GuardResult {
    let offered = selectable_count(ctx.get_strings(LIST_VALUES)?.len());
    Ok(ctx
        .input()
        .parse::<usize>()
        .is_ok_and(|choice| (1..=offered).contains(&choice)))
}
