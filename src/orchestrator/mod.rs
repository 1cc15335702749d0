//! The turn protocol: one inbound keypress in, one rendered response out.
//!
//! A turn loads the caller's account facts, finds the session, asks the
//! registry which machine serves it, then starts or resumes that machine,
//! applies the input and waits for any invoked steps to settle. Only an
//! effective transition is persisted; a turn whose input matches nothing
//! re-renders the current state and leaves the stored version alone.
//! Any system error aborts the turn before the session is written.

pub mod response;
pub mod translator;
pub mod turn;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

pub use response::UssdResponse;
pub use translator::{BuiltinTranslator, Translator};
pub use turn::{last_token, InboundTurn, TRAIL_SEPARATOR};

use crate::attempts::DEFAULT_MAX_PIN_ATTEMPTS;
use crate::collaborators::{AccountStatus, Services};
use crate::machine::{EngineError, Interpreter, MachineContext, MachineId, MachineInstance};
use crate::observability::{turn_metrics, OperationTimer};
use crate::registry::{Entry, MachineRegistry};
use crate::session::{Session, SessionLeases, SessionSettings, SessionStore, SessionUpdate};
use crate::telemetry::{create_turn_span, generate_correlation_id};

/// Explicit engine settings, normally taken from the `[engine]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub settle_timeout: Duration,
    pub max_settle_hops: usize,
    pub max_pin_attempts: u8,
    pub default_language: String,
    pub fallback_language: String,
    pub country_code: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_secs(5),
            max_settle_hops: 8,
            max_pin_attempts: DEFAULT_MAX_PIN_ATTEMPTS,
            default_language: "eng".to_string(),
            fallback_language: "eng".to_string(),
            country_code: "254".to_string(),
        }
    }
}

/// What a processed turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub machine: MachineId,
    pub state: String,
    pub context: MachineContext,
    pub version: u64,
    pub response: UssdResponse,
    /// Input matched no transition; nothing was persisted
    pub no_op: bool,
    /// The turn moved the session to another machine
    pub jumped: bool,
}

pub struct TurnOrchestrator {
    interpreter: Interpreter,
    store: Arc<dyn SessionStore>,
    services: Services,
    translator: Arc<dyn Translator>,
    leases: Option<SessionLeases>,
    settings: EngineSettings,
    ttl_seconds: u64,
}

impl TurnOrchestrator {
    pub fn new(
        registry: Arc<MachineRegistry>,
        store: Arc<dyn SessionStore>,
        services: Services,
        translator: Arc<dyn Translator>,
        engine: EngineSettings,
        session: &SessionSettings,
    ) -> Self {
        let interpreter = Interpreter::new(registry, engine.settle_timeout, engine.max_settle_hops);
        let leases = session
            .lease_enabled
            .then(|| SessionLeases::new(session.lease_timeout));

        Self {
            interpreter,
            store,
            services,
            translator,
            leases,
            settings: engine,
            ttl_seconds: session.ttl_seconds,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Process one turn and always produce a gateway response.
    ///
    /// System errors are logged and answered with the localized
    /// technical-difficulties text; the session is left as it was.
    pub async fn handle_turn(&self, turn: &InboundTurn) -> UssdResponse {
        let correlation_id = generate_correlation_id();
        let span = create_turn_span(&turn.session_id, &turn.phone_number, &correlation_id);

        async {
            let timer = OperationTimer::new("turn");
            turn_metrics().record_turn();

            let response = match self.process(turn).await {
                Ok(outcome) => {
                    let span = tracing::Span::current();
                    span.record("machine", outcome.machine.as_str());
                    span.record("state", outcome.state.as_str());
                    span.record("version", outcome.version);
                    outcome.response
                }
                Err(err) => {
                    error!(error = %err, "Turn failed");
                    turn_metrics().record_system_error();
                    let language = self.caller_language(&turn.phone_number).await;
                    UssdResponse::end(self.translator.system_error(&language))
                }
            };

            timer.finish();
            response
        }
        .instrument(span)
        .await
    }

    /// Run the turn protocol, surfacing system errors to the caller.
    pub async fn process(&self, turn: &InboundTurn) -> Result<TurnOutcome, EngineError> {
        let _lease = match &self.leases {
            Some(leases) => Some(leases.acquire(&turn.session_id).await?),
            None => None,
        };

        let context = self.load_context(turn).await?;
        let status = context.account.as_ref().map(|account| account.status);

        match self.store.get(&turn.session_id).await? {
            None => self.open(turn, context, status).await,
            Some(session) => self.advance(turn, session, context, status).await,
        }
    }

    /// Turn context with freshly loaded account and voucher facts.
    async fn load_context(&self, turn: &InboundTurn) -> Result<MachineContext, EngineError> {
        let account = self.services.accounts.get_by_phone(&turn.phone_number).await?;
        let voucher = match account.as_ref().and_then(|account| account.active_voucher.as_deref()) {
            Some(symbol) => self.services.vouchers.by_symbol(symbol).await?,
            None => None,
        };

        Ok(MachineContext::new(&turn.phone_number, &turn.service_code)
            .with_country_code(self.country_code(turn))
            .with_account(account)
            .with_voucher(voucher))
    }

    fn country_code<'a>(&'a self, turn: &'a InboundTurn) -> &'a str {
        if turn.country_code.is_empty() {
            &self.settings.country_code
        } else {
            &turn.country_code
        }
    }

    /// First turn of a session: start the resolved machine and create the record.
    async fn open(
        &self,
        turn: &InboundTurn,
        context: MachineContext,
        status: Option<AccountStatus>,
    ) -> Result<TurnOutcome, EngineError> {
        let resolution = self.interpreter.registry().resolve(status, None, &turn.input);
        let mut instance = self.interpreter.start(resolution.machine, context)?;
        self.interpreter.settle(&mut instance, &self.services).await?;
        let response = self.render(&instance)?;

        let mut session = Session::new(
            &turn.session_id,
            &turn.phone_number,
            &turn.service_code,
            instance.machine,
            &instance.state,
            self.ttl_seconds,
        )
        .with_data(instance.context.data.clone());
        session.record_turn(&turn.input, &response.to_string());

        let session = self.store.create(session).await?;
        turn_metrics().record_session_created();
        info!(
            session.id = %session.id,
            machine = %session.machine_id,
            state = %session.state,
            "Session opened"
        );

        Ok(TurnOutcome {
            machine: instance.machine,
            state: instance.state,
            context: instance.context,
            version: session.version,
            response,
            no_op: false,
            jumped: false,
        })
    }

    /// Later turns: jump, or resume and apply the input.
    async fn advance(
        &self,
        turn: &InboundTurn,
        session: Session,
        context: MachineContext,
        status: Option<AccountStatus>,
    ) -> Result<TurnOutcome, EngineError> {
        let resolution =
            self.interpreter
                .registry()
                .resolve(status, Some((session.machine_id, session.state.as_str())), &turn.input);

        let (mut instance, jumped) = match resolution.entry {
            Entry::Start => {
                debug!(from = %session.machine_id, to = %resolution.machine, "Machine jump");
                turn_metrics().record_jump();
                (self.interpreter.start(resolution.machine, context)?, true)
            }
            Entry::Resume => {
                let resumed = self.interpreter.resume(
                    resolution.machine,
                    &session.state,
                    context.clone().with_data(session.data.clone()),
                );
                match resumed {
                    Ok(mut instance) => {
                        if self.interpreter.send(&mut instance, &turn.input)?.is_none() {
                            return self.no_op(session, instance);
                        }
                        (instance, false)
                    }
                    Err(EngineError::IllegalState { machine, state }) => {
                        warn!(machine = %machine, state = %state, "Stored state is not resumable, restarting machine");
                        (self.interpreter.start(resolution.machine, context)?, false)
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        self.interpreter.settle(&mut instance, &self.services).await?;
        let response = self.render(&instance)?;

        let update = SessionUpdate {
            machine_id: instance.machine,
            state: instance.state.clone(),
            data: instance.context.data.clone(),
            input: turn.input.clone(),
            response: response.to_string(),
            expected_version: Some(session.version),
        };
        let session = self.store.update(&session.id, update).await?;

        Ok(TurnOutcome {
            machine: instance.machine,
            state: instance.state,
            context: instance.context,
            version: session.version,
            response,
            no_op: false,
            jumped,
        })
    }

    /// Re-render the unchanged state without touching the store.
    fn no_op(&self, session: Session, instance: MachineInstance) -> Result<TurnOutcome, EngineError> {
        debug!(session.id = %session.id, state = %session.state, "No transition matched, turn is a no-op");
        turn_metrics().record_no_op();
        let response = self.render(&instance)?;

        Ok(TurnOutcome {
            machine: instance.machine,
            state: instance.state,
            context: instance.context,
            version: session.version,
            response,
            no_op: true,
            jumped: false,
        })
    }

    fn render(&self, instance: &MachineInstance) -> Result<UssdResponse, EngineError> {
        let language = instance
            .context
            .language()
            .unwrap_or(&self.settings.default_language);
        let text = self
            .translator
            .render(language, instance.machine, &instance.state, &instance.context)?;

        Ok(if self.interpreter.is_final(instance) {
            UssdResponse::end(text)
        } else {
            UssdResponse::con(text)
        })
    }

    /// Best-effort language for the system error text.
    async fn caller_language(&self, phone_number: &str) -> String {
        match self.services.accounts.get_by_phone(phone_number).await {
            Ok(Some(account)) => account.language,
            _ => self.settings.default_language.clone(),
        }
    }
}
