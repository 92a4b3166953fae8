use super::errors::{require_machine_id, StateMachineResult};
use crate::models::{Entity, StateRecord};
use crate::services::{EntityService, StateRecordEntityService};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// A committed change of one entity's current state
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange<I, S> {
    pub machine_id: String,
    pub subject_id: I,
    pub source: S,
    pub target: S,
}

/// Observer notified after a state write has committed
///
/// Never called for writes that were skipped or rolled back.
#[async_trait]
pub trait StateChangeListener<I, S>: Send + Sync {
    fn machine_id(&self) -> &str;

    async fn on_state_changed(&self, change: &StateChange<I, S>) -> StateMachineResult<()>;
}

/// Listener saving one transition record per committed change
pub struct TransitionRecordingListener<R> {
    machine_id: String,
    records: Arc<R>,
}

impl<R: StateRecordEntityService> TransitionRecordingListener<R> {
    /// Fails with a configuration error when `machine_id` is blank
    pub fn new(machine_id: &str, records: Arc<R>) -> StateMachineResult<Self> {
        require_machine_id(machine_id, "TransitionRecordingListener")?;
        Ok(Self {
            machine_id: machine_id.to_string(),
            records,
        })
    }

    pub fn records(&self) -> &R {
        &self.records
    }
}

impl<R> Debug for TransitionRecordingListener<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionRecordingListener")
            .field("machine_id", &self.machine_id)
            .finish()
    }
}

type SubjectOf<R> = <<R as EntityService>::Entity as StateRecord>::SubjectId;
type RecordStateOf<R> = <<R as EntityService>::Entity as StateRecord>::State;

#[async_trait]
impl<R: StateRecordEntityService> StateChangeListener<SubjectOf<R>, RecordStateOf<R>>
    for TransitionRecordingListener<R>
{
    fn machine_id(&self) -> &str {
        &self.machine_id
    }

    async fn on_state_changed(
        &self,
        change: &StateChange<SubjectOf<R>, RecordStateOf<R>>,
    ) -> StateMachineResult<()> {
        let record = self
            .records
            .save_record(
                &self.machine_id,
                change.subject_id.clone(),
                change.source.clone(),
                change.target.clone(),
            )
            .await?;
        debug!(
            machine_id = %self.machine_id,
            record_id = ?record.id(),
            "Transition recorded"
        );
        Ok(())
    }
}
