/// Snapshot of a state machine handed to and from persistence
///
/// Only `state` is persisted. `event` is the event that produced the state,
/// when known.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachineContext<S, E> {
    machine_id: String,
    state: S,
    event: Option<E>,
}

impl<S, E> StateMachineContext<S, E> {
    pub fn new(machine_id: impl Into<String>, state: S) -> Self {
        Self {
            machine_id: machine_id.into(),
            state,
            event: None,
        }
    }

    pub fn with_event(mut self, event: E) -> Self {
        self.event = Some(event);
        self
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn event(&self) -> Option<&E> {
        self.event.as_ref()
    }

    pub fn into_state(self) -> S {
        self.state
    }
}
