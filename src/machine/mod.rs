// Menu machine model - identifiers, definitions, context and the interpreter

pub mod context;
pub mod definition;
pub mod errors;
pub mod interpreter;
pub mod types;

pub use context::MachineContext;
pub use definition::{
    Action, Always, Candidate, ErrorRoute, Guard, Invoke, MachineDefinition, StateNode, StepFn,
    StepFuture,
};
pub use errors::{EngineError, MachineError, MachineErrorCode, StepError};
pub use interpreter::{Interpreter, MachineInstance, Transition, MAX_ENTRY_HOPS};
pub use types::{leaf_name, parent_path, Event, EventKind, MachineId, Tag};
