//! Localized rendering of machine states.
//!
//! Catalogues are TOML tables keyed by machine name plus a shared `[common]`
//! table. A state is looked up by its full path in its machine's table, then
//! by its leaf name there, then by leaf name in `[common]`; the whole chain
//! repeats in the fallback language before rendering fails.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::machine::{leaf_name, EngineError, MachineContext, MachineId};

const COMMON: &str = "common";
const SYSTEM_ERROR: &str = "systemError";

/// Rendered when even the fallback catalogue has no `systemError` entry.
const LAST_RESORT: &str = "We are experiencing technical difficulties. Please try again later.";

static PLACEHOLDER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{([A-Za-z]+)\}").ok());

const BUILTIN_LOCALES: [(&str, &str); 2] = [
    ("eng", include_str!("../../locales/eng.toml")),
    ("swa", include_str!("../../locales/swa.toml")),
];

pub trait Translator: Send + Sync {
    /// Body text for `state` of `machine`, without the CON/END prefix.
    fn render(
        &self,
        language: &str,
        machine: MachineId,
        state: &str,
        ctx: &MachineContext,
    ) -> Result<String, EngineError>;

    /// Generic "technical difficulties" text.
    fn system_error(&self, language: &str) -> String;
}

type Catalogue = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Clone)]
pub struct BuiltinTranslator {
    catalogues: HashMap<String, Catalogue>,
    fallback: String,
}

impl BuiltinTranslator {
    /// Load the catalogues compiled into the binary.
    pub fn new(fallback_language: &str) -> Result<Self, EngineError> {
        let mut catalogues = HashMap::new();
        for (language, source) in BUILTIN_LOCALES {
            let catalogue: Catalogue = toml::from_str(source)
                .map_err(|e| EngineError::Registry(format!("locale '{language}' is invalid: {e}")))?;
            catalogues.insert(language.to_string(), catalogue);
        }

        if !catalogues.contains_key(fallback_language) {
            return Err(EngineError::Registry(format!(
                "fallback language '{fallback_language}' has no catalogue"
            )));
        }

        Ok(Self {
            catalogues,
            fallback: fallback_language.to_string(),
        })
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.catalogues.keys().map(String::as_str)
    }

    /// Raw template for `state`, before placeholders are filled.
    pub fn template(&self, language: &str, machine: MachineId, state: &str) -> Option<&str> {
        self.lookup(language, machine, state).or_else(|| {
            if language != self.fallback {
                debug!(language = language, machine = %machine, state = state, "Falling back to default catalogue");
            }
            self.lookup(&self.fallback, machine, state)
        })
    }

    fn lookup(&self, language: &str, machine: MachineId, state: &str) -> Option<&str> {
        let catalogue = self.catalogues.get(language)?;
        let leaf = leaf_name(state);
        let own = catalogue.get(machine.as_str());

        own.and_then(|table| table.get(state))
            .or_else(|| own.and_then(|table| table.get(leaf)))
            .or_else(|| catalogue.get(COMMON).and_then(|table| table.get(leaf)))
            .map(String::as_str)
    }
}

impl Translator for BuiltinTranslator {
    fn render(
        &self,
        language: &str,
        machine: MachineId,
        state: &str,
        ctx: &MachineContext,
    ) -> Result<String, EngineError> {
        let template = self
            .template(language, machine, state)
            .ok_or_else(|| EngineError::Translation {
                language: language.to_string(),
                machine: machine.to_string(),
                state: state.to_string(),
            })?;
        Ok(fill(template, ctx))
    }

    fn system_error(&self, language: &str) -> String {
        [language, self.fallback.as_str()]
            .iter()
            .find_map(|language| {
                self.catalogues
                    .get(*language)
                    .and_then(|catalogue| catalogue.get(COMMON))
                    .and_then(|table| table.get(SYSTEM_ERROR))
            })
            .cloned()
            .unwrap_or_else(|| LAST_RESORT.to_string())
    }
}

/// Replace `{key}` placeholders; unknown keys render empty.
fn fill(template: &str, ctx: &MachineContext) -> String {
    let Some(pattern) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };
    pattern
        .replace_all(template, |caps: &Captures<'_>| param(ctx, &caps[1]).unwrap_or_default())
        .into_owned()
}

fn param(ctx: &MachineContext, key: &str) -> Option<String> {
    if let Some(value) = ctx.data.get(key) {
        return display_value(value);
    }

    let account = ctx.account.as_ref();
    match key {
        "error" => ctx.error_messages.last().cloned(),
        "phoneNumber" => Some(ctx.phone_number.clone()),
        "fullName" => account.map(|account| account.display_name()),
        "givenNames" => account.and_then(|account| account.given_names.clone()),
        "familyName" => account.and_then(|account| account.family_name.clone()),
        "accountLanguage" => account.map(|account| account.language.clone()),
        "voucherSymbol" => ctx.active_voucher.as_ref().map(|voucher| voucher.symbol.clone()),
        "voucherName" => ctx.active_voucher.as_ref().map(|voucher| voucher.name.clone()),
        _ => None,
    }
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) if number.is_f64() => number.as_f64().map(|amount| format!("{amount:.2}")),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
