// Replay-safe interpreter for hierarchical menu machines

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::context::MachineContext;
use super::definition::{Candidate, MachineDefinition};
use super::errors::{EngineError, StepError};
use super::types::{Event, EventKind, MachineId, Tag};
use crate::collaborators::Services;
use crate::registry::MachineRegistry;

/// Upper bound on `initial`/`always` hops taken while entering one state.
pub const MAX_ENTRY_HOPS: usize = 16;

/// A machine sitting at a concrete leaf state with its turn context.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineInstance {
    pub machine: MachineId,
    pub state: String,
    pub context: MachineContext,
}

/// A transition that was actually taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub event: EventKind,
}

#[derive(Debug, Clone)]
pub struct Interpreter {
    registry: Arc<MachineRegistry>,
    settle_timeout: Duration,
    max_settle_hops: usize,
}

impl Interpreter {
    pub fn new(registry: Arc<MachineRegistry>, settle_timeout: Duration, max_settle_hops: usize) -> Self {
        Self {
            registry,
            settle_timeout,
            max_settle_hops: max_settle_hops.max(1),
        }
    }

    pub fn registry(&self) -> &MachineRegistry {
        &self.registry
    }

    fn definition(&self, machine: MachineId) -> Result<&MachineDefinition, EngineError> {
        self.registry.definition(machine)
    }

    /// Enter `machine` at its initial state, following entry resolvers.
    pub fn start(&self, machine: MachineId, mut context: MachineContext) -> Result<MachineInstance, EngineError> {
        let definition = self.definition(machine)?;
        context.clear_error();
        let state = self.enter(definition, &definition.initial, &mut context)?;
        debug!(machine = %machine, state = %state, "Started machine");
        Ok(MachineInstance {
            machine,
            state,
            context,
        })
    }

    /// Rebuild an instance already at `state`. No entry action, resolver or
    /// invoked step runs.
    pub fn resume(
        &self,
        machine: MachineId,
        state: &str,
        context: MachineContext,
    ) -> Result<MachineInstance, EngineError> {
        let definition = self.definition(machine)?;
        let node = definition.node(state)?;
        if node.is_compound() {
            return Err(EngineError::IllegalState {
                machine,
                state: state.to_string(),
            });
        }
        Ok(MachineInstance {
            machine,
            state: state.to_string(),
            context,
        })
    }

    /// Apply raw input, classified against the current state's tags.
    pub fn send(&self, instance: &mut MachineInstance, input: &str) -> Result<Option<Transition>, EngineError> {
        let definition = self.definition(instance.machine)?;
        let event = Event::classify(input, definition.tags(&instance.state));
        self.send_event(instance, event)
    }

    /// Apply one event. `Ok(None)` means no candidate matched and the
    /// instance is untouched apart from the recorded input.
    pub fn send_event(
        &self,
        instance: &mut MachineInstance,
        event: Event,
    ) -> Result<Option<Transition>, EngineError> {
        let definition = self.definition(instance.machine)?;
        instance.context.ussd_input = event.input.clone();

        let mut kinds = vec![event.kind];
        if event.kind != EventKind::Transit {
            kinds.push(EventKind::Transit);
        }

        let mut selected = None;
        for kind in kinds {
            if let Some(candidate) = self.select(definition, &instance.state, &instance.context, kind)? {
                selected = Some((kind, candidate));
                break;
            }
        }
        let Some((kind, candidate)) = selected else {
            debug!(
                machine = %instance.machine,
                state = %instance.state,
                "No transition matched input"
            );
            return Ok(None);
        };

        instance.context.clear_error();
        for action in &candidate.actions {
            action(&mut instance.context)?;
        }
        let to = self.enter(definition, &candidate.target, &mut instance.context)?;
        let from = std::mem::replace(&mut instance.state, to.clone());
        debug!(machine = %instance.machine, from = %from, to = %to, event = ?kind, "Transition taken");
        Ok(Some(Transition { from, to, event: kind }))
    }

    pub fn tags<'a>(&'a self, instance: &MachineInstance) -> &'a [Tag] {
        self.definition(instance.machine)
            .map(|definition| definition.tags(&instance.state))
            .unwrap_or(&[])
    }

    pub fn is_settled(&self, instance: &MachineInstance) -> bool {
        !self.tags(instance).contains(&Tag::Invoked)
    }

    pub fn is_final(&self, instance: &MachineInstance) -> bool {
        self.tags(instance).contains(&Tag::Final)
    }

    /// Run invoked steps until the instance rests on a state without one.
    /// The whole wait is bounded by the settle timeout.
    pub async fn settle(&self, instance: &mut MachineInstance, services: &Services) -> Result<(), EngineError> {
        if self.is_settled(instance) {
            return Ok(());
        }
        let machine = instance.machine;
        let outcome = timeout(self.settle_timeout, self.run_invocations(instance, services)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                let step = self
                    .definition(machine)?
                    .node(&instance.state)
                    .ok()
                    .and_then(|node| node.invoke.as_ref())
                    .map(|invoke| invoke.name)
                    .unwrap_or("unknown");
                warn!(machine = %machine, state = %instance.state, step = step, "Invoked step timed out");
                Err(EngineError::StepTimeout {
                    machine,
                    state: instance.state.clone(),
                    step: step.to_string(),
                    timeout_ms: self.settle_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn run_invocations(&self, instance: &mut MachineInstance, services: &Services) -> Result<(), EngineError> {
        let definition = self.definition(instance.machine)?;

        for _ in 0..self.max_settle_hops {
            let node = definition.node(&instance.state)?;
            let Some(invoke) = node.invoke.as_ref() else {
                return Ok(());
            };

            debug!(machine = %instance.machine, state = %instance.state, step = invoke.name, "Running invoked step");
            let result = (invoke.run)(&mut instance.context, services).await;

            let (target, actions) = match result {
                Ok(()) => {
                    let candidate = first_match(&invoke.on_done, &instance.context)?.ok_or_else(|| {
                        EngineError::UnroutedStep {
                            machine: instance.machine,
                            state: instance.state.clone(),
                            step: invoke.name.to_string(),
                        }
                    })?;
                    (candidate.target.as_str(), &candidate.actions)
                }
                Err(StepError::Machine(error)) => {
                    let Some(route) = invoke.on_error.iter().find(|route| route.matches(&error)) else {
                        return Err(EngineError::UnhandledMachineError {
                            machine: instance.machine,
                            state: instance.state.clone(),
                            error,
                        });
                    };
                    debug!(code = %error.code, target = %route.target, "Routing machine error");
                    instance.context.record_error(error.detail);
                    (route.target.as_str(), &route.actions)
                }
                Err(StepError::System(error)) => return Err(error),
            };

            for action in actions {
                action(&mut instance.context)?;
            }
            instance.state = self.enter(definition, target, &mut instance.context)?;
        }

        Err(EngineError::SettleLimit {
            machine: instance.machine,
            state: instance.state.clone(),
            hops: self.max_settle_hops,
        })
    }

    /// First passing candidate for `kind`, searching the leaf then its ancestors.
    fn select<'d>(
        &self,
        definition: &'d MachineDefinition,
        state: &'d str,
        context: &MachineContext,
        kind: EventKind,
    ) -> Result<Option<&'d Candidate>, EngineError> {
        for node in definition.lineage(state) {
            if let Some(candidate) = first_match(node.candidates(kind), context)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Enter `target`, descending into initial children and following
    /// `always` resolvers until a stable leaf is reached.
    fn enter(
        &self,
        definition: &MachineDefinition,
        target: &str,
        context: &mut MachineContext,
    ) -> Result<String, EngineError> {
        let mut path = target.to_string();
        for _ in 0..MAX_ENTRY_HOPS {
            let node = definition.node(&path)?;
            for action in &node.entry {
                action(context)?;
            }
            if let Some(initial) = node.initial {
                path = format!("{path}.{initial}");
                continue;
            }
            if let Some(resolver) = node.always {
                if let Some(next) = resolver(context)? {
                    path = next.to_string();
                    continue;
                }
            }
            return Ok(path);
        }
        Err(EngineError::SettleLimit {
            machine: definition.id,
            state: path,
            hops: MAX_ENTRY_HOPS,
        })
    }
}

fn first_match<'c>(candidates: &'c [Candidate], context: &MachineContext) -> Result<Option<&'c Candidate>, EngineError> {
    for candidate in candidates {
        if candidate.matches(context)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryAccounts, InMemoryLedger, RecordingNotifier};
    use crate::machine::definition::{ErrorRoute, Invoke, StateNode, StepFuture};
    use crate::machine::errors::MachineErrorCode;
    use crate::registry::MenuTable;

    fn is_yes(ctx: &MachineContext) -> Result<bool, EngineError> {
        Ok(ctx.input() == "y")
    }

    fn is_fail(ctx: &MachineContext) -> Result<bool, EngineError> {
        Ok(ctx.input() == "f")
    }

    fn count_entry(ctx: &mut MachineContext) -> Result<(), EngineError> {
        let entered = ctx.data.get("entered").and_then(|v| v.as_u64()).unwrap_or(0);
        ctx.set("entered", entered + 1);
        Ok(())
    }

    fn skip_to_done(ctx: &MachineContext) -> Result<Option<&'static str>, EngineError> {
        Ok(ctx.data.contains_key("skip").then_some("done"))
    }

    fn succeed<'a>(ctx: &'a mut MachineContext, _services: &'a Services) -> StepFuture<'a> {
        Box::pin(async move {
            ctx.set("stepped", true);
            Ok(())
        })
    }

    fn reject<'a>(_ctx: &'a mut MachineContext, _services: &'a Services) -> StepFuture<'a> {
        Box::pin(async move { Err(StepError::machine(MachineErrorCode::InvalidPin, "wrong pin")) })
    }

    fn hang<'a>(_ctx: &'a mut MachineContext, _services: &'a Services) -> StepFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
    }

    fn toy_machine() -> MachineDefinition {
        MachineDefinition::new(MachineId::Main, "asking")
            .state(
                StateNode::new("asking")
                    .entry(count_entry)
                    .always(skip_to_done)
                    .on_transit(Candidate::to("working").when(is_yes))
                    .on_transit(Candidate::to("failing").when(is_fail))
                    .on_back(Candidate::to("done")),
            )
            .state(
                StateNode::new("working")
                    .invoke(Invoke::new("succeed", succeed).on_done(Candidate::to("group"))),
            )
            .state(
                StateNode::new("failing").invoke(
                    Invoke::new("reject", reject)
                        .on_error(ErrorRoute::on(MachineErrorCode::InvalidPin, "group.retrying")),
                ),
            )
            .state(StateNode::compound("group", "first").on_back(Candidate::to("asking")))
            .state(StateNode::new("group.first").tag(Tag::Resolved))
            .state(
                StateNode::new("group.retrying")
                    .tag(Tag::Error)
                    .on_retry(Candidate::to("asking")),
            )
            .state(StateNode::new("hanging").invoke(Invoke::new("hang", hang)))
            .state(StateNode::new("done").terminal())
    }

    fn interpreter(timeout: Duration) -> Interpreter {
        let registry = MachineRegistry::new(vec![toy_machine()], MenuTable::empty()).unwrap();
        Interpreter::new(Arc::new(registry), timeout, 8)
    }

    fn services() -> Services {
        Services::in_memory(
            &InMemoryAccounts::new(),
            &InMemoryLedger::new(),
            &RecordingNotifier::new(),
            3,
        )
    }

    fn context() -> MachineContext {
        MachineContext::new("+254700000001", "*384#")
    }

    #[test]
    fn start_runs_entry_actions_and_resolvers() {
        let interpreter = interpreter(Duration::from_secs(1));

        let instance = interpreter.start(MachineId::Main, context()).unwrap();
        assert_eq!(instance.state, "asking");
        assert_eq!(instance.context.data["entered"], 1);

        let mut skipping = context();
        skipping.set("skip", true);
        let instance = interpreter.start(MachineId::Main, skipping).unwrap();
        assert_eq!(instance.state, "done");
    }

    #[test]
    fn resume_does_not_repeat_entry_actions() {
        let interpreter = interpreter(Duration::from_secs(1));

        let instance = interpreter.resume(MachineId::Main, "asking", context()).unwrap();

        assert!(!instance.context.data.contains_key("entered"));
        assert!(interpreter.resume(MachineId::Main, "missing", context()).is_err());
        assert!(interpreter.resume(MachineId::Main, "group", context()).is_err());
    }

    #[test]
    fn unmatched_input_is_a_no_op() {
        let interpreter = interpreter(Duration::from_secs(1));
        let mut instance = interpreter.resume(MachineId::Main, "asking", context()).unwrap();
        let before = instance.clone();

        let transition = interpreter.send(&mut instance, "nope").unwrap();

        assert!(transition.is_none());
        assert_eq!(instance.state, before.state);
        assert_eq!(instance.context.data, before.context.data);
    }

    #[test]
    fn back_bubbles_to_the_parent_state() {
        let interpreter = interpreter(Duration::from_secs(1));
        let mut instance = interpreter.resume(MachineId::Main, "group.first", context()).unwrap();

        let transition = interpreter.send(&mut instance, "0").unwrap().unwrap();

        assert_eq!(transition.event, EventKind::Back);
        assert_eq!(instance.state, "asking");
    }

    #[tokio::test]
    async fn invoked_steps_settle_into_resolved_states() {
        let interpreter = interpreter(Duration::from_secs(1));
        let mut instance = interpreter.resume(MachineId::Main, "asking", context()).unwrap();

        interpreter.send(&mut instance, "y").unwrap();
        assert!(!interpreter.is_settled(&instance));
        interpreter.settle(&mut instance, &services()).await.unwrap();

        assert_eq!(instance.state, "group.first");
        assert_eq!(instance.context.data["stepped"], true);
    }

    #[tokio::test]
    async fn machine_errors_route_through_on_error() {
        let interpreter = interpreter(Duration::from_secs(1));
        let mut instance = interpreter.resume(MachineId::Main, "asking", context()).unwrap();

        interpreter.send(&mut instance, "f").unwrap();
        interpreter.settle(&mut instance, &services()).await.unwrap();

        assert_eq!(instance.state, "group.retrying");
        assert_eq!(instance.context.error_messages, vec!["wrong pin".to_string()]);
        assert_eq!(instance.context.data["error"], "wrong pin");

        let transition = interpreter.send(&mut instance, "1").unwrap().unwrap();
        assert_eq!(transition.event, EventKind::Retry);
        assert_eq!(instance.state, "asking");
        assert!(!instance.context.data.contains_key("error"));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_steps_time_out() {
        let interpreter = interpreter(Duration::from_millis(50));
        let mut instance = interpreter.resume(MachineId::Main, "hanging", context()).unwrap();

        let error = interpreter.settle(&mut instance, &services()).await.unwrap_err();

        assert!(matches!(error, EngineError::StepTimeout { ref step, .. } if step == "hang"));
    }
}
