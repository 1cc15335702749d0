//! Compile-time checked machine definitions.
//!
//! Guards, actions and invoked steps are plain function values attached to
//! states; nothing is looked up by name at runtime. A definition is validated
//! once when the registry is built.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use super::context::MachineContext;
use super::errors::{EngineError, MachineError, MachineErrorCode, StepError};
use super::types::{parent_path, EventKind, MachineId, Tag};
use crate::collaborators::Services;

/// Pure predicate over the turn context.
pub type Guard = fn(&MachineContext) -> Result<bool, EngineError>;

/// Synchronous context update run while taking a transition or entering a state.
pub type Action = fn(&mut MachineContext) -> Result<(), EngineError>;

/// Evaluated once on entry; returns the state to continue to, if any.
pub type Always = fn(&MachineContext) -> Result<Option<&'static str>, EngineError>;

pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<(), StepError>> + Send + 'a>>;

/// Asynchronous side-effecting step attached to a state.
pub type StepFn = for<'a> fn(&'a mut MachineContext, &'a Services) -> StepFuture<'a>;

/// One `(guard, target, actions)` option of a transition.
#[derive(Clone)]
pub struct Candidate {
    pub target: String,
    pub guard: Option<Guard>,
    pub actions: Vec<Action>,
}

impl Candidate {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            guard: None,
            actions: Vec::new(),
        }
    }

    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn matches(&self, ctx: &MachineContext) -> Result<bool, EngineError> {
        match self.guard {
            Some(guard) => guard(ctx),
            None => Ok(true),
        }
    }
}

/// `onError` route keyed by error code; `None` catches every code.
#[derive(Clone)]
pub struct ErrorRoute {
    pub code: Option<MachineErrorCode>,
    pub target: String,
    pub actions: Vec<Action>,
}

impl ErrorRoute {
    pub fn on(code: MachineErrorCode, target: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            target: target.into(),
            actions: Vec::new(),
        }
    }

    pub fn any(target: impl Into<String>) -> Self {
        Self {
            code: None,
            target: target.into(),
            actions: Vec::new(),
        }
    }

    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn matches(&self, error: &MachineError) -> bool {
        self.code.map_or(true, |code| code == error.code)
    }
}

#[derive(Clone)]
pub struct Invoke {
    pub name: &'static str,
    pub run: StepFn,
    pub on_done: Vec<Candidate>,
    pub on_error: Vec<ErrorRoute>,
}

impl Invoke {
    pub fn new(name: &'static str, run: StepFn) -> Self {
        Self {
            name,
            run,
            on_done: Vec::new(),
            on_error: Vec::new(),
        }
    }

    pub fn on_done(mut self, candidate: Candidate) -> Self {
        self.on_done.push(candidate);
        self
    }

    pub fn on_error(mut self, route: ErrorRoute) -> Self {
        self.on_error.push(route);
        self
    }
}

pub struct StateNode {
    pub path: String,
    pub initial: Option<&'static str>,
    pub transitions: HashMap<EventKind, Vec<Candidate>>,
    pub entry: Vec<Action>,
    pub always: Option<Always>,
    pub invoke: Option<Invoke>,
    pub tags: Vec<Tag>,
}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("path", &self.path)
            .field("initial", &self.initial)
            .field("events", &self.transitions.keys().collect::<Vec<_>>())
            .field("invoke", &self.invoke.as_ref().map(|invoke| invoke.name))
            .field("tags", &self.tags)
            .finish()
    }
}

impl StateNode {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            initial: None,
            transitions: HashMap::new(),
            entry: Vec::new(),
            always: None,
            invoke: None,
            tags: Vec::new(),
        }
    }

    /// A parent state that enters `initial` (a child name) on entry.
    pub fn compound(path: impl Into<String>, initial: &'static str) -> Self {
        let mut node = Self::new(path);
        node.initial = Some(initial);
        node
    }

    pub fn on(mut self, kind: EventKind, candidate: Candidate) -> Self {
        self.transitions.entry(kind).or_default().push(candidate);
        self
    }

    pub fn on_transit(self, candidate: Candidate) -> Self {
        self.on(EventKind::Transit, candidate)
    }

    pub fn on_back(self, candidate: Candidate) -> Self {
        self.on(EventKind::Back, candidate)
    }

    pub fn on_retry(self, candidate: Candidate) -> Self {
        self.on(EventKind::Retry, candidate)
    }

    pub fn entry(mut self, action: Action) -> Self {
        self.entry.push(action);
        self
    }

    pub fn always(mut self, resolver: Always) -> Self {
        self.always = Some(resolver);
        self
    }

    /// Attach an invoked step; the state is tagged `invoked`.
    pub fn invoke(mut self, invoke: Invoke) -> Self {
        self.invoke = Some(invoke);
        self.tag(Tag::Invoked)
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    /// Terminal state: the dialogue ends here.
    pub fn terminal(self) -> Self {
        self.tag(Tag::Final)
    }

    pub fn candidates(&self, kind: EventKind) -> &[Candidate] {
        self.transitions.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_compound(&self) -> bool {
        self.initial.is_some()
    }

    fn targets(&self) -> impl Iterator<Item = &str> + '_ {
        let transitions = self
            .transitions
            .values()
            .flat_map(|candidates| candidates.iter().map(|c| c.target.as_str()));
        let done = self
            .invoke
            .iter()
            .flat_map(|invoke| invoke.on_done.iter().map(|c| c.target.as_str()));
        let errors = self
            .invoke
            .iter()
            .flat_map(|invoke| invoke.on_error.iter().map(|r| r.target.as_str()));
        transitions.chain(done).chain(errors)
    }
}

/// One conversational flow: its states keyed by full dotted path.
pub struct MachineDefinition {
    pub id: MachineId,
    pub initial: String,
    states: BTreeMap<String, StateNode>,
}

impl fmt::Debug for MachineDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineDefinition")
            .field("id", &self.id)
            .field("initial", &self.initial)
            .field("states", &self.states.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MachineDefinition {
    pub fn new(id: MachineId, initial: impl Into<String>) -> Self {
        Self {
            id,
            initial: initial.into(),
            states: BTreeMap::new(),
        }
    }

    pub fn state(mut self, node: StateNode) -> Self {
        self.states.insert(node.path.clone(), node);
        self
    }

    pub fn states(mut self, nodes: impl IntoIterator<Item = StateNode>) -> Self {
        for node in nodes {
            self.states.insert(node.path.clone(), node);
        }
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.states.contains_key(path)
    }

    pub fn node(&self, path: &str) -> Result<&StateNode, EngineError> {
        self.states.get(path).ok_or_else(|| EngineError::IllegalState {
            machine: self.id,
            state: path.to_string(),
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &StateNode> {
        self.states.values()
    }

    /// Tags of the state at `path`; empty for unknown paths.
    pub fn tags(&self, path: &str) -> &[Tag] {
        self.states
            .get(path)
            .map(|node| node.tags.as_slice())
            .unwrap_or(&[])
    }

    /// `path` followed by each of its ancestors.
    pub fn lineage<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a StateNode> + 'a {
        std::iter::successors(Some(path), |current| parent_path(*current))
            .filter_map(move |current| self.states.get(current))
    }

    /// Structural checks run once at registry construction.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |reason: String| Err(EngineError::Registry(format!("{}: {reason}", self.id)));

        if !self.contains(&self.initial) {
            return fail(format!("initial state '{}' is not defined", self.initial));
        }

        for node in self.states.values() {
            if let Some(parent) = parent_path(&node.path) {
                if !self.contains(parent) {
                    return fail(format!("'{}' has no parent state '{parent}'", node.path));
                }
            }
            if let Some(initial) = node.initial {
                let child = format!("{}.{initial}", node.path);
                if !self.contains(&child) {
                    return fail(format!("compound '{}' lacks initial child '{child}'", node.path));
                }
            }
            if node.invoke.is_some() && !node.has_tag(Tag::Invoked) {
                return fail(format!("'{}' invokes a step without the invoked tag", node.path));
            }
            if node.invoke.is_some() && node.is_compound() {
                return fail(format!("compound '{}' cannot invoke a step", node.path));
            }
            if let Some(target) = node.targets().find(|target| !self.contains(target)) {
                return fail(format!("'{}' targets undefined state '{target}'", node.path));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_true(_: &MachineContext) -> Result<bool, EngineError> {
        Ok(true)
    }

    #[test]
    fn validation_accepts_a_consistent_definition() {
        let definition = MachineDefinition::new(MachineId::Main, "menu")
            .state(StateNode::new("menu").on_transit(Candidate::to("parent").when(always_true)))
            .state(StateNode::compound("parent", "child"))
            .state(StateNode::new("parent.child").terminal());

        assert!(definition.validate().is_ok());
        let lineage: Vec<_> = definition
            .lineage("parent.child")
            .map(|node| node.path.as_str())
            .collect();
        assert_eq!(lineage, vec!["parent.child", "parent"]);
    }

    #[test]
    fn validation_rejects_dangling_targets() {
        let definition = MachineDefinition::new(MachineId::Main, "menu")
            .state(StateNode::new("menu").on_transit(Candidate::to("nowhere")));

        let error = definition.validate().unwrap_err();
        assert!(error.to_string().contains("nowhere"));
    }

    #[test]
    fn validation_rejects_missing_initial_child() {
        let definition = MachineDefinition::new(MachineId::Main, "parent")
            .state(StateNode::compound("parent", "missing"));

        assert!(definition.validate().is_err());
    }
}
