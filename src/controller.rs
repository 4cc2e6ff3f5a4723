use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::error::{AppError, LoadError, ValidationError};
use crate::events::{ChangeEvent, ChangeKind, Listeners, Subscription};
use crate::filter::Filter;
use crate::models::{Directory, Entity, RecordMeta};
use crate::selection::SelectionState;
use crate::source::{Capabilities, Collection, EntitySource, fetch_with_timeout, parse_records};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready {
        count: usize,
        loaded_at: DateTime<Utc>,
    },
    Failed {
        message: String,
        failed_at: DateTime<Utc>,
    },
}

/// Identifies one load. Only the most recently issued ticket may apply its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied(usize),
    Discarded,
}

/// In-memory list behind one management panel.
#[derive(Debug)]
pub struct EntityListController<E: Entity> {
    records: Vec<E>,
    selection: SelectionState,
    load_state: LoadState,
    generation: u64,
    /// Bumped by every local change.
    revision: u64,
    capabilities: Capabilities,
    listeners: Listeners,
}

impl<E: Entity> EntityListController<E> {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            records: Vec::new(),
            selection: SelectionState::None,
            load_state: LoadState::Idle,
            generation: 0,
            revision: 0,
            capabilities,
            listeners: Listeners::default(),
        }
    }

    pub fn records(&self) -> &[E] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&E> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn get(&self, id: &str) -> Result<&E, AppError> {
        self.find(id).ok_or_else(|| not_found::<E>(id))
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.load_state = LoadState::Loading;
        LoadTicket {
            generation: self.generation,
            revision: self.revision,
        }
    }

    /// Local changes made since the ticket was issued. Applying the ticket's
    /// load replaces them.
    pub fn changes_since(&self, ticket: &LoadTicket) -> u64 {
        self.revision - ticket.revision
    }

    /// Applies a fetched list. A failed load keeps the current records.
    #[instrument(skip(self, result), fields(kind = %E::KIND))]
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<E>, LoadError>,
    ) -> Result<LoadOutcome, AppError> {
        if ticket.generation != self.generation {
            info!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding superseded load"
            );
            return Ok(LoadOutcome::Discarded);
        }

        match result {
            Ok(records) => {
                let count = records.len();
                let overwritten = self.changes_since(&ticket);
                if overwritten > 0 {
                    warn!(overwritten, "Load replaced changes made while it was in flight");
                }
                self.records = records;
                if let Some(id) = self.selection.target() {
                    if self.find(id).is_none() {
                        self.selection = SelectionState::None;
                    }
                }
                self.load_state = LoadState::Ready {
                    count,
                    loaded_at: Utc::now(),
                };
                info!(count, "Loaded records");
                self.listeners.emit(&ChangeEvent::reloaded(E::KIND, count));
                Ok(LoadOutcome::Applied(count))
            }
            Err(err) => {
                warn!(error = %err, retained = self.records.len(), "Load failed");
                self.load_state = LoadState::Failed {
                    message: err.to_string(),
                    failed_at: Utc::now(),
                };
                Err(AppError::Load(err))
            }
        }
    }

    /// Fetches and normalizes this kind's collection, replacing the list on success.
    pub async fn load(
        &mut self,
        source: &dyn EntitySource,
        timeout: Duration,
    ) -> Result<usize, AppError> {
        let ticket = self.begin_load();
        let result = fetch_with_timeout(source, Collection::from(E::KIND), timeout)
            .await
            .and_then(parse_records::<E>);

        match self.finish_load(ticket, result)? {
            LoadOutcome::Applied(count) => Ok(count),
            LoadOutcome::Discarded => Ok(self.len()),
        }
    }

    fn ensure_unique(&self, form: &E::Form, exclude: Option<&str>) -> Result<(), AppError> {
        let key = E::form_key(form);
        let clash = self
            .records
            .iter()
            .filter(|record| Some(record.id()) != exclude)
            .any(|record| record.natural_key() == key);

        if clash {
            return Err(ValidationError::Duplicate {
                kind: E::KIND,
                message: E::DUPLICATE_MESSAGE.to_string(),
            }
            .into());
        }
        Ok(())
    }

    #[instrument(skip(self, form), fields(kind = %E::KIND))]
    pub fn add(&mut self, form: E::Form) -> Result<E, AppError> {
        form.validate()?;
        self.ensure_unique(&form, None)?;

        let record = E::create(RecordMeta::new(), form);
        self.records.push(record.clone());
        self.revision += 1;
        info!(id = %record.id(), "Added record");

        self.listeners
            .emit(&ChangeEvent::record(E::KIND, record.id(), ChangeKind::Added));
        Ok(record)
    }

    #[instrument(skip(self, form), fields(kind = %E::KIND))]
    pub fn edit(&mut self, id: &str, form: E::Form) -> Result<E, AppError> {
        let index = self.position(id)?;
        form.validate()?;
        self.ensure_unique(&form, Some(id))?;

        let record = &mut self.records[index];
        record.apply(form);
        record.meta_mut().touch();
        let record = record.clone();
        self.revision += 1;
        info!("Edited record");

        self.listeners
            .emit(&ChangeEvent::record(E::KIND, id, ChangeKind::Edited));
        Ok(record)
    }

    #[instrument(skip(self), fields(kind = %E::KIND))]
    pub fn remove(&mut self, id: &str) -> Result<E, AppError> {
        if !self.capabilities.hard_delete {
            return Err(AppError::Unsupported(format!(
                "Deleting a {} is not available; deactivate it instead",
                E::KIND
            )));
        }

        let index = self.position(id)?;
        let record = self.records.remove(index);
        self.revision += 1;
        if self.selection.target() == Some(id) {
            self.selection = SelectionState::None;
        }
        info!("Removed record");

        self.listeners
            .emit(&ChangeEvent::record(E::KIND, id, ChangeKind::Removed));
        Ok(record)
    }

    #[instrument(skip(self), fields(kind = %E::KIND))]
    pub fn toggle_active(&mut self, id: &str) -> Result<E, AppError> {
        if !self.capabilities.status_update {
            return Err(AppError::Unsupported(format!(
                "Changing the status of a {} is not available",
                E::KIND
            )));
        }

        let index = self.position(id)?;
        let record = &mut self.records[index];
        let meta = record.meta_mut();
        meta.is_active = !meta.is_active;
        meta.touch();
        let active = meta.is_active;
        let record = record.clone();
        self.revision += 1;
        info!(active, "Toggled record status");

        self.listeners.emit(&ChangeEvent::record(
            E::KIND,
            id,
            ChangeKind::Toggled { active },
        ));
        Ok(record)
    }

    /// Records matching the filter, in list order.
    pub fn filter(&self, filter: &Filter, directory: &dyn Directory) -> Vec<&E> {
        self.records
            .iter()
            .filter(|record| filter.matches(*record, directory))
            .collect()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn select(&mut self, selection: SelectionState) -> Result<(), AppError> {
        if let Some(id) = selection.target() {
            self.get(id)?;
        }
        self.selection = selection;
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = SelectionState::None;
    }

    /// Saves the record in the `Editing` selection and clears the selection.
    pub fn edit_selected(&mut self, form: E::Form) -> Result<E, AppError> {
        let SelectionState::Editing(id) = self.selection.clone() else {
            return Err(ValidationError::field("selection", "No record is being edited").into());
        };
        let record = self.edit(&id, form)?;
        self.selection = SelectionState::None;
        Ok(record)
    }

    /// Removes the record in the `Deleting` selection and clears the selection.
    pub fn confirm_delete(&mut self) -> Result<E, AppError> {
        let SelectionState::Deleting(id) = self.selection.clone() else {
            return Err(
                ValidationError::field("selection", "No record is awaiting deletion").into(),
            );
        };
        let record = self.remove(&id)?;
        self.selection = SelectionState::None;
        Ok(record)
    }

    /// Drops listeners and selection. Any load still in flight is discarded when it lands.
    pub fn teardown(&mut self) {
        self.generation += 1;
        self.listeners.clear();
        self.selection = SelectionState::None;
        if self.load_state == LoadState::Loading {
            self.load_state = LoadState::Idle;
        }
    }

    fn position(&self, id: &str) -> Result<usize, AppError> {
        self.records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| not_found::<E>(id))
    }
}

fn not_found<E: Entity>(id: &str) -> AppError {
    AppError::NotFound(format!("{} with id {}", E::KIND, id))
}
