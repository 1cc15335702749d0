// Paged list states built on the pagination protocol

use crate::machine::{Action, Candidate, EngineError, MachineContext, StateNode};
use crate::pagination::{numbered, paginate_for_display, PAGE_COUNT};

use super::guards;

/// Values behind the numbered options of the current list.
pub const LIST_VALUES: &str = "listValues";
/// The three display pages of the current list.
pub const PAGES: &str = "pages";
/// Page currently on screen.
pub const PAGE: &str = "page";
/// Value picked from the list.
pub const SELECTED: &str = "selected";

/// Shown for pages with nothing on them.
pub const PLACEHOLDER: &str = "--";

const SHOW_PAGE: [Action; PAGE_COUNT] = [show_page::<0>, show_page::<1>, show_page::<2>];

/// Store `values` and their numbered `labels` as three display pages.
pub fn prepare_list(ctx: &mut MachineContext, values: Vec<String>, labels: Vec<String>) {
    let pages = paginate_for_display(&numbered(labels), PLACEHOLDER.to_string());
    ctx.set(LIST_VALUES, values);
    ctx.set(PAGES, pages.to_vec());
    ctx.remove(SELECTED);
}

pub fn show_page<const N: usize>(ctx: &mut MachineContext) -> Result<(), EngineError> {
    let page = ctx
        .get_strings(PAGES)?
        .into_iter()
        .nth(N)
        .ok_or_else(|| EngineError::malformed(PAGES, "has fewer pages than displayed"))?;
    ctx.set(PAGE, page);
    Ok(())
}

/// Record the list value chosen by the current input.
pub fn select_listed(ctx: &mut MachineContext) -> Result<(), EngineError> {
    let choice: usize = ctx
        .input()
        .parse()
        .map_err(|_| EngineError::malformed("ussdInput", "is not a list option"))?;
    let value = choice
        .checked_sub(1)
        .and_then(|index| ctx.get_strings(LIST_VALUES).ok()?.into_iter().nth(index))
        .ok_or_else(|| EngineError::malformed(LIST_VALUES, "has no entry for the chosen option"))?;
    ctx.set(SELECTED, value);
    Ok(())
}

/// Three page states named `names`, linked by `11`/`22` and left with `00`.
///
/// `prepare` runs before the first page is shown; `select`, when given, is
/// tried on every page after the paging codes.
pub fn page_states(
    names: [&str; PAGE_COUNT],
    prepare: Option<Action>,
    select: Option<Candidate>,
    exit: &str,
) -> Vec<StateNode> {
    names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let mut node = StateNode::new(*name);
            if index == 0 {
                if let Some(prepare) = prepare {
                    node = node.entry(prepare);
                }
            }
            node = node.entry(SHOW_PAGE[index]);
            if let Some(next) = names.get(index + 1) {
                node = node.on_transit(Candidate::to(*next).when(guards::is_next_page));
            }
            if index > 0 {
                node = node.on_transit(Candidate::to(names[index - 1]).when(guards::is_previous_page));
            }
            node = node.on_transit(Candidate::to(exit).when(guards::is_exit));
            if let Some(select) = &select {
                node = node.on_transit(select.clone());
            }
            node
        })
        .collect()
}
