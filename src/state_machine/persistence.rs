//! # State Machine Persistence
//!
//! Bridges a state machine's context to a state entity's read/write pair.
//!
//! Only the current state is persisted. A write loads the entity inside one
//! unit of work, skips the update when the stored state already equals the
//! target, and notifies listeners only once the unit has committed. With
//! `persistence.lock_for_update` the entity row stays locked between the read
//! and the write, so two writers converging on the same target cannot both
//! observe the old state.

use super::context::StateMachineContext;
use super::errors::{self, require_machine_id, StateMachineResult};
use super::listener::{StateChange, StateChangeListener};
use crate::config::PersistenceConfig;
use crate::database::finish;
use crate::error::{configuration_error, EntityError};
use crate::logging::log_transition;
use crate::models::{Entity, StateEntity};
use crate::query_builder::Conditions;
use crate::services::{EntityService, StateEntityService, StateOf};
use async_trait::async_trait;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Id type of a service's entity
pub type IdOf<S> = <S as EntityService>::Id;

/// Listener type accepted by persisters of service `S`
pub type DynStateListener<S> = Arc<dyn StateChangeListener<IdOf<S>, StateOf<S>>>;

/// Read/write contract between a state machine and a state entity service
#[async_trait]
pub trait StateMachinePersist: Send + Sync {
    type Service: StateEntityService;
    type Event: Clone + Debug + Send + Sync + 'static;

    fn service(&self) -> &Self::Service;

    fn machine_id(&self) -> &str;

    /// When false, [`StateMachinePersist::write`] never touches the store
    fn should_persist(&self) -> bool;

    fn listeners(&self) -> &[DynStateListener<Self::Service>] {
        &[]
    }

    /// Persist the context's state on the single entity matching `condition`
    ///
    /// Returns whether a durable write happened. Fails with `NotFound` when no
    /// entity matches; any failure rolls the unit of work back.
    async fn write(
        &self,
        context: &StateMachineContext<StateOf<Self::Service>, Self::Event>,
        condition: &Conditions,
    ) -> StateMachineResult<bool> {
        if !self.should_persist() {
            debug!(machine_id = self.machine_id(), "Persistence disabled; write skipped");
            return Ok(false);
        }

        let service = self.service();
        let repository = service.repository();
        let target = context.state().clone();

        let mut uow = repository.executor().begin().await?;
        let result = async {
            let entity = service
                .find_one_in(&mut *uow, condition, true, repository.lock_for_update())
                .await?
                .ok_or_else(|| EntityError::NotFound {
                    entity: <<Self::Service as EntityService>::Entity as Entity>::TABLE
                        .to_string(),
                    conditions: condition.to_string(),
                })?;

            let source = entity.state();
            if source == target {
                return Ok(None);
            }
            let id = entity
                .id()
                .ok_or_else(|| configuration_error("stored entity carries no id"))?;
            let rows = service
                .update_state_in(&mut *uow, &id, target.clone())
                .await?;

            Ok::<_, EntityError>((rows > 0).then(|| StateChange {
                machine_id: self.machine_id().to_string(),
                subject_id: id,
                source,
                target: target.clone(),
            }))
        }
        .await;
        let change = finish(uow, result).await?;

        let Some(change) = change else {
            log_transition(self.machine_id(), &format!("{target:?}"), &format!("{target:?}"), false);
            return Ok(false);
        };

        log_transition(
            self.machine_id(),
            &format!("{:?}", change.source),
            &format!("{:?}", change.target),
            true,
        );
        for listener in self.listeners() {
            listener.on_state_changed(&change).await?;
        }
        Ok(true)
    }

    /// Load the current state of the single entity matching `condition`
    async fn read(
        &self,
        condition: &Conditions,
    ) -> StateMachineResult<StateMachineContext<StateOf<Self::Service>, Self::Event>> {
        let state = self.service().current_state(condition).await?;
        Ok(StateMachineContext::new(self.machine_id(), state))
    }
}

/// Ready-made persister over a [`StateEntityService`]
pub struct EntityStatePersister<S: StateEntityService, E> {
    service: Arc<S>,
    machine_id: String,
    persist: bool,
    listeners: Vec<DynStateListener<S>>,
    _event: PhantomData<fn() -> E>,
}

impl<S: StateEntityService, E> EntityStatePersister<S, E> {
    /// Persister honouring `persistence.enabled`
    pub fn new(
        machine_id: &str,
        service: Arc<S>,
        config: &PersistenceConfig,
    ) -> StateMachineResult<Self> {
        require_machine_id(machine_id, "EntityStatePersister")?;
        Ok(Self {
            service,
            machine_id: machine_id.to_string(),
            persist: config.enabled,
            listeners: Vec::new(),
            _event: PhantomData,
        })
    }

    /// Persister for a machine whose state is never written
    pub fn ephemeral(machine_id: &str, service: Arc<S>) -> StateMachineResult<Self> {
        let config = PersistenceConfig {
            enabled: false,
            ..PersistenceConfig::default()
        };
        Self::new(machine_id, service, &config)
    }

    /// Attach a listener; it must observe the same machine
    pub fn with_listener(mut self, listener: DynStateListener<S>) -> StateMachineResult<Self> {
        require_machine_id(listener.machine_id(), "StateChangeListener")?;
        if listener.machine_id() != self.machine_id {
            return Err(errors::configuration_error(format!(
                "listener for machine '{}' attached to persister for '{}'",
                listener.machine_id(),
                self.machine_id
            )));
        }
        self.listeners.push(listener);
        Ok(self)
    }
}

impl<S: StateEntityService, E> Debug for EntityStatePersister<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStatePersister")
            .field("machine_id", &self.machine_id)
            .field("persist", &self.persist)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[async_trait]
impl<S, E> StateMachinePersist for EntityStatePersister<S, E>
where
    S: StateEntityService,
    E: Clone + Debug + Send + Sync + 'static,
{
    type Service = S;
    type Event = E;

    fn service(&self) -> &S {
        &self.service
    }

    fn machine_id(&self) -> &str {
        &self.machine_id
    }

    fn should_persist(&self) -> bool {
        self.persist
    }

    fn listeners(&self) -> &[DynStateListener<S>] {
        &self.listeners
    }
}
