use serde_json::Value;
use tracing::{instrument, warn};

use super::Collection;
use crate::error::LoadError;
use crate::models::{Entity, Relation, Subject};

fn parse_failure(collection: Collection, index: usize, err: anyhow::Error) -> LoadError {
    warn!(%collection, index, error = %err, "Rejected record at load boundary");
    LoadError::Parse {
        collection,
        message: format!("record {}: {:#}", index, err),
    }
}

/// Normalizes every record of a collection. One malformed record fails the whole collection.
#[instrument(skip(records), fields(count = records.len()))]
pub fn parse_records<E: Entity>(records: Vec<Value>) -> Result<Vec<E>, LoadError> {
    let collection = Collection::from(E::KIND);
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            E::from_wire(record).map_err(|err| parse_failure(collection, index, err))
        })
        .collect()
}

/// Subjects plus the curriculum links embedded in them.
#[instrument(skip(records), fields(count = records.len()))]
pub fn parse_subjects(records: Vec<Value>) -> Result<(Vec<Subject>, Vec<Relation>), LoadError> {
    let mut subjects = Vec::with_capacity(records.len());
    let mut links = Vec::new();

    for (index, record) in records.into_iter().enumerate() {
        let (subject, link) = Subject::from_wire_with_link(record)
            .map_err(|err| parse_failure(Collection::Subjects, index, err))?;
        if let Some(curriculum_id) = link {
            links.push(Relation::new(&subject.meta.id, &curriculum_id));
        }
        subjects.push(subject);
    }

    Ok((subjects, links))
}

#[instrument(skip(records), fields(count = records.len()))]
pub fn parse_relations(records: Vec<Value>) -> Result<Vec<Relation>, LoadError> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            Relation::from_wire(record)
                .map_err(|err| parse_failure(Collection::Relations, index, err))
        })
        .collect()
}
