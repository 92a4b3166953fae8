//! # State Machine Engine Seam
//!
//! A minimal table-driven engine plus the glue that restores a machine from
//! its entity, sends it an event and persists the result.
//!
//! The transition graph belongs to the application: implement
//! [`StateMachineDefinition`] for a type describing the initial state and
//! the edges. Guards and actions stay in application code around
//! [`PersistingStateMachineHandler::handle_event`].

use super::context::StateMachineContext;
use super::errors::{configuration_error, require_machine_id, StateMachineError, StateMachineResult};
use super::persistence::StateMachinePersist;
use crate::models::StateValue;
use crate::query_builder::Conditions;
use crate::services::StateOf;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Domain-defined states, events and edges
pub trait StateMachineDefinition: Send + Sync + 'static {
    type State: StateValue;
    type Event: Clone + Debug + Send + Sync + 'static;

    fn initial(&self) -> Self::State;

    /// Target state for `event` in `from`, `None` when there is no edge
    fn transition(&self, from: &Self::State, event: &Self::Event) -> Option<Self::State>;
}

/// A running state machine
pub trait StateMachine: Send + Sync {
    type State: StateValue;
    type Event: Clone + Debug + Send + Sync + 'static;

    fn machine_id(&self) -> &str;

    fn current_state(&self) -> &Self::State;

    /// Replace the machine's state with a restored context
    fn reset_state(&mut self, context: StateMachineContext<Self::State, Self::Event>);

    /// Apply `event`, returning the new state
    fn send_event(&mut self, event: Self::Event) -> StateMachineResult<&Self::State>;

    fn context(&self) -> StateMachineContext<Self::State, Self::Event>;
}

/// State machine driven by a [`StateMachineDefinition`]
pub struct DefinedStateMachine<D: StateMachineDefinition> {
    machine_id: String,
    definition: Arc<D>,
    state: D::State,
    last_event: Option<D::Event>,
}

impl<D: StateMachineDefinition> DefinedStateMachine<D> {
    /// Fails with a configuration error when `machine_id` is blank
    pub fn new(machine_id: &str, definition: Arc<D>) -> StateMachineResult<Self> {
        require_machine_id(machine_id, "DefinedStateMachine")?;
        let state = definition.initial();
        Ok(Self {
            machine_id: machine_id.to_string(),
            definition,
            state,
            last_event: None,
        })
    }

    pub fn definition(&self) -> &D {
        &self.definition
    }
}

impl<D: StateMachineDefinition> Debug for DefinedStateMachine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinedStateMachine")
            .field("machine_id", &self.machine_id)
            .field("state", &self.state)
            .field("last_event", &self.last_event)
            .finish()
    }
}

impl<D: StateMachineDefinition> StateMachine for DefinedStateMachine<D> {
    type State = D::State;
    type Event = D::Event;

    fn machine_id(&self) -> &str {
        &self.machine_id
    }

    fn current_state(&self) -> &D::State {
        &self.state
    }

    fn reset_state(&mut self, context: StateMachineContext<D::State, D::Event>) {
        self.last_event = context.event().cloned();
        self.state = context.into_state();
    }

    fn send_event(&mut self, event: D::Event) -> StateMachineResult<&D::State> {
        let target = self
            .definition
            .transition(&self.state, &event)
            .ok_or_else(|| StateMachineError::InvalidTransition {
                machine_id: self.machine_id.clone(),
                from: format!("{:?}", self.state),
                event: format!("{event:?}"),
            })?;
        debug!(
            machine_id = %self.machine_id,
            from = ?self.state,
            to = ?target,
            event = ?event,
            "State machine transition"
        );
        self.state = target;
        self.last_event = Some(event);
        Ok(&self.state)
    }

    fn context(&self) -> StateMachineContext<D::State, D::Event> {
        let context = StateMachineContext::new(self.machine_id.clone(), self.state.clone());
        match &self.last_event {
            Some(event) => context.with_event(event.clone()),
            None => context,
        }
    }
}

/// Persists and restores whole machines through a [`StateMachinePersist`]
#[derive(Debug)]
pub struct StateMachinePersister<P> {
    persist: P,
}

impl<P> StateMachinePersister<P> {
    pub fn new(persist: P) -> Self {
        Self { persist }
    }

    pub fn inner(&self) -> &P {
        &self.persist
    }
}

impl<P: StateMachinePersist> StateMachinePersister<P> {
    /// Write the machine's current state; returns whether a write happened
    pub async fn persist<M>(&self, machine: &M, condition: &Conditions) -> StateMachineResult<bool>
    where
        M: StateMachine<State = StateOf<P::Service>, Event = P::Event>,
    {
        self.persist.write(&machine.context(), condition).await
    }

    /// Reset the machine to the persisted state
    pub async fn restore<M>(&self, machine: &mut M, condition: &Conditions) -> StateMachineResult<()>
    where
        M: StateMachine<State = StateOf<P::Service>, Event = P::Event>,
    {
        let context = self.persist.read(condition).await?;
        machine.reset_state(context);
        Ok(())
    }
}

/// Outcome of one handled event
#[derive(Debug, Clone, PartialEq)]
pub struct HandledEvent<S> {
    pub source: S,
    pub target: S,
    /// Whether the target state was durably written
    pub persisted: bool,
}

/// Restore, transition and persist in one call
pub struct PersistingStateMachineHandler<M, P> {
    machine: M,
    persister: StateMachinePersister<P>,
}

impl<M, P> PersistingStateMachineHandler<M, P>
where
    P: StateMachinePersist,
    M: StateMachine<State = StateOf<P::Service>, Event = P::Event>,
{
    /// Fails when the machine and the persister name different machines
    pub fn new(machine: M, persist: P) -> StateMachineResult<Self> {
        require_machine_id(machine.machine_id(), "StateMachine")?;
        if machine.machine_id() != persist.machine_id() {
            return Err(configuration_error(format!(
                "machine '{}' paired with persister for '{}'",
                machine.machine_id(),
                persist.machine_id()
            )));
        }
        Ok(Self {
            machine,
            persister: StateMachinePersister::new(persist),
        })
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn persister(&self) -> &StateMachinePersister<P> {
        &self.persister
    }

    /// Restore the machine from the entity matching `condition`, apply
    /// `event` and persist the resulting state
    ///
    /// An event without an edge fails with `InvalidTransition` before
    /// anything is written.
    pub async fn handle_event(
        &mut self,
        event: M::Event,
        condition: &Conditions,
    ) -> StateMachineResult<HandledEvent<M::State>> {
        self.persister.restore(&mut self.machine, condition).await?;
        let source = self.machine.current_state().clone();
        let target = self.machine.send_event(event)?.clone();
        let persisted = self.persister.persist(&self.machine, condition).await?;
        Ok(HandledEvent {
            source,
            target,
            persisted,
        })
    }
}
