use super::entity_service::EntityService;
use crate::error::EntityResult;
use crate::models::StateRecord;
use crate::query_builder::Conditions;
use async_trait::async_trait;
use tracing::debug;

type SubjectOf<S> = <<S as EntityService>::Entity as StateRecord>::SubjectId;
type RecordStateOf<S> = <<S as EntityService>::Entity as StateRecord>::State;

/// Entity service persisting transition records
///
/// Records are written only after the state change they describe has
/// committed, so history never names a state that was not reached.
#[async_trait]
pub trait StateRecordEntityService: EntityService<Entity: StateRecord> {
    async fn save_record(
        &self,
        machine_id: &str,
        subject_id: SubjectOf<Self>,
        source: RecordStateOf<Self>,
        target: RecordStateOf<Self>,
    ) -> EntityResult<Self::Entity> {
        debug!(
            machine_id,
            subject_id = ?subject_id,
            source = ?source,
            target = ?target,
            "Recording state transition"
        );
        let record = <Self::Entity as StateRecord>::record(machine_id, subject_id, source, target);
        self.save(record).await
    }

    /// Recorded transitions of one subject, oldest first
    async fn history(&self, subject_id: &SubjectOf<Self>) -> EntityResult<Vec<Self::Entity>> {
        let conditions =
            Conditions::eq(<Self::Entity as StateRecord>::SUBJECT_FIELD, subject_id)?;
        self.find_all(&conditions).await
    }
}
