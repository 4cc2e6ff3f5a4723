use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::controller::{EntityListController, LoadOutcome, LoadState, LoadTicket};
use crate::error::{AppError, LoadError, ValidationError};
use crate::events::{ChangeEvent, Subscription};
use crate::filter::Filter;
use crate::models::{
    Curriculum, Directory, Entity, EntityKind, Goal, GoalForm, Institution, Milestone,
    MilestoneForm, Subject, SubjectForm, User,
};
use crate::relations::{RelationResolver, RelationStore};
use crate::source::{
    Collection, EntitySource, LoadBatch, parse_records, parse_relations, parse_subjects,
};

/// An entity kind with a panel in the workspace.
pub trait Panel: Entity {
    fn panel(workspace: &Workspace) -> &EntityListController<Self>;

    fn panel_mut(workspace: &mut Workspace) -> &mut EntityListController<Self>;

    /// The curriculum link a form asks for. `None` when the kind has no link;
    /// `Some(None)` unlinks.
    fn curriculum_link(_form: &Self::Form) -> Option<Option<&str>> {
        None
    }

    /// The curriculum and subject a form places the record under, if any.
    fn placement(_form: &Self::Form) -> Option<(&str, &str)> {
        None
    }

    /// Extra fields served alongside the record.
    fn row_fields(&self, directory: &dyn Directory) -> Vec<(&'static str, String)> {
        self.related_names(directory)
    }
}

macro_rules! panel {
    ($entity:ty, $field:ident) => {
        panel!($entity, $field, {});
    };
    ($entity:ty, $field:ident, { $($extra:tt)* }) => {
        impl Panel for $entity {
            fn panel(workspace: &Workspace) -> &EntityListController<Self> {
                &workspace.$field
            }

            fn panel_mut(workspace: &mut Workspace) -> &mut EntityListController<Self> {
                &mut workspace.$field
            }

            $($extra)*
        }
    };
}

panel!(Curriculum, curricula);
panel!(User, users);
panel!(Institution, institutions);

panel!(Milestone, milestones, {
    fn placement(form: &MilestoneForm) -> Option<(&str, &str)> {
        Some((form.curriculum_id.trim(), form.subject_id.trim()))
    }
});

panel!(Goal, goals, {
    fn placement(form: &GoalForm) -> Option<(&str, &str)> {
        Some((form.curriculum_id.trim(), form.subject_id.trim()))
    }
});

impl Panel for Subject {
    fn panel(workspace: &Workspace) -> &EntityListController<Self> {
        &workspace.subjects
    }

    fn panel_mut(workspace: &mut Workspace) -> &mut EntityListController<Self> {
        &mut workspace.subjects
    }

    fn curriculum_link(form: &SubjectForm) -> Option<Option<&str>> {
        Some(form.curriculum())
    }

    fn row_fields(&self, directory: &dyn Directory) -> Vec<(&'static str, String)> {
        let mut fields = self.related_names(directory);
        if let Some(curriculum_id) = directory.curriculum_of_subject(self.id()) {
            fields.push(("curriculumId", curriculum_id.to_string()));
        }
        fields
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkspaceTickets {
    curricula: LoadTicket,
    subjects: LoadTicket,
    milestones: LoadTicket,
    goals: LoadTicket,
    users: LoadTicket,
    institutions: LoadTicket,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub loaded: BTreeMap<Collection, usize>,
    pub failed: BTreeMap<Collection, String>,
    pub discarded: Vec<Collection>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSummary {
    pub kind: EntityKind,
    pub total: usize,
    pub active: usize,
    pub load_state: LoadState,
}

/// Every management panel plus the subject to curriculum links.
#[derive(Debug)]
pub struct Workspace {
    pub curricula: EntityListController<Curriculum>,
    pub subjects: EntityListController<Subject>,
    pub milestones: EntityListController<Milestone>,
    pub goals: EntityListController<Goal>,
    pub users: EntityListController<User>,
    pub institutions: EntityListController<Institution>,
    relations: RelationStore,
}

impl Workspace {
    pub fn new(source: &dyn EntitySource) -> Self {
        Self {
            curricula: EntityListController::new(source.capabilities(EntityKind::Curriculum)),
            subjects: EntityListController::new(source.capabilities(EntityKind::Subject)),
            milestones: EntityListController::new(source.capabilities(EntityKind::Milestone)),
            goals: EntityListController::new(source.capabilities(EntityKind::Goal)),
            users: EntityListController::new(source.capabilities(EntityKind::User)),
            institutions: EntityListController::new(source.capabilities(EntityKind::Institution)),
            relations: RelationStore::default(),
        }
    }

    pub fn panel<E: Panel>(&self) -> &EntityListController<E> {
        E::panel(self)
    }

    pub fn panel_mut<E: Panel>(&mut self) -> &mut EntityListController<E> {
        E::panel_mut(self)
    }

    pub fn relations(&self) -> &RelationStore {
        &self.relations
    }

    pub fn resolver(&self) -> RelationResolver<'_> {
        RelationResolver::new(&self.relations, &self.subjects, &self.curricula)
    }

    /// Checks the ids a form refers to. Blank ids are left to form validation.
    fn check_references<E: Panel>(&self, form: &E::Form) -> Result<(), AppError> {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut reject = |field: &str, message: &str| {
            fields
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
        };

        if let Some(Some(curriculum_id)) = E::curriculum_link(form) {
            if self.curricula.find(curriculum_id).is_none() {
                reject("curriculumId", "does not match a curriculum");
            }
        }

        if let Some((curriculum_id, subject_id)) = E::placement(form) {
            let known_curriculum =
                !curriculum_id.is_empty() && self.curricula.find(curriculum_id).is_some();
            if !curriculum_id.is_empty() && !known_curriculum {
                reject("curriculumId", "does not match a curriculum");
            }
            if !subject_id.is_empty() {
                if self.subjects.find(subject_id).is_none() {
                    reject("subjectId", "does not match a subject");
                } else if known_curriculum
                    && self.relations.curriculum_of(subject_id) != Some(curriculum_id)
                {
                    reject("subjectId", "is not assigned to the selected curriculum");
                }
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(fields).into())
        }
    }

    pub fn add<E: Panel>(&mut self, form: E::Form) -> Result<E, AppError> {
        self.check_references::<E>(&form)?;
        let link = E::curriculum_link(&form).map(|id| id.map(str::to_string));

        let record = E::panel_mut(self).add(form)?;
        if let Some(link) = link {
            self.relations.assign(record.id(), link.as_deref());
        }
        Ok(record)
    }

    pub fn edit<E: Panel>(&mut self, id: &str, form: E::Form) -> Result<E, AppError> {
        E::panel(self).get(id)?;
        self.check_references::<E>(&form)?;
        let link = E::curriculum_link(&form).map(|id| id.map(str::to_string));

        let record = E::panel_mut(self).edit(id, form)?;
        if let Some(link) = link {
            self.relations.assign(record.id(), link.as_deref());
        }
        Ok(record)
    }

    /// Removes a record. Removing a subject or curriculum drops its links;
    /// other records that referenced it resolve to the unknown name.
    pub fn remove<E: Panel>(&mut self, id: &str) -> Result<E, AppError> {
        let record = E::panel_mut(self).remove(id)?;
        let dropped = match E::KIND {
            EntityKind::Subject => self.relations.remove_subject(id),
            EntityKind::Curriculum => self.relations.remove_curriculum(id),
            _ => 0,
        };
        if dropped > 0 {
            info!(kind = %E::KIND, id, dropped, "Dropped links of removed record");
        }
        Ok(record)
    }

    pub fn toggle_active<E: Panel>(&mut self, id: &str) -> Result<E, AppError> {
        E::panel_mut(self).toggle_active(id)
    }

    pub fn filter<E: Panel>(&self, filter: &Filter) -> Vec<&E> {
        E::panel(self).filter(filter, self)
    }

    pub fn begin_load(&mut self) -> WorkspaceTickets {
        WorkspaceTickets {
            curricula: self.curricula.begin_load(),
            subjects: self.subjects.begin_load(),
            milestones: self.milestones.begin_load(),
            goals: self.goals.begin_load(),
            users: self.users.begin_load(),
            institutions: self.institutions.begin_load(),
        }
    }

    /// Applies a fetched batch. Each panel succeeds or fails on its own.
    #[instrument(skip_all)]
    pub fn finish_load(&mut self, tickets: WorkspaceTickets, mut batch: LoadBatch) -> LoadReport {
        let mut report = LoadReport::default();

        self.finish_panel::<Curriculum>(tickets.curricula, take_parsed(&mut batch), &mut report);

        let (subjects, embedded) = match batch.take(Collection::Subjects).and_then(parse_subjects)
        {
            Ok((subjects, links)) => (Ok(subjects), links),
            Err(err) => (Err(err), Vec::new()),
        };
        if self.finish_panel::<Subject>(tickets.subjects, subjects, &mut report) {
            match batch
                .take(Collection::Relations)
                .and_then(parse_relations)
            {
                Ok(mut links) => {
                    links.extend(embedded);
                    let dropped = self.relations.replace(links);
                    if dropped > 0 {
                        warn!(dropped, "Subjects linked to more than one curriculum");
                    }
                    report.loaded.insert(Collection::Relations, self.relations.len());
                }
                Err(err) => {
                    warn!(error = %err, "Keeping previous subject links");
                    report.failed.insert(Collection::Relations, err.to_string());
                }
            }
        } else {
            report.discarded.push(Collection::Relations);
        }

        self.finish_panel::<Milestone>(tickets.milestones, take_parsed(&mut batch), &mut report);
        self.finish_panel::<Goal>(tickets.goals, take_parsed(&mut batch), &mut report);
        self.finish_panel::<User>(tickets.users, take_parsed(&mut batch), &mut report);
        self.finish_panel::<Institution>(
            tickets.institutions,
            take_parsed(&mut batch),
            &mut report,
        );

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            discarded = report.discarded.len(),
            "Finished workspace load"
        );
        report
    }

    fn finish_panel<E: Panel>(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<E>, LoadError>,
        report: &mut LoadReport,
    ) -> bool {
        let collection = Collection::from(E::KIND);
        match E::panel_mut(self).finish_load(ticket, result) {
            Ok(LoadOutcome::Applied(count)) => {
                report.loaded.insert(collection, count);
                true
            }
            Ok(LoadOutcome::Discarded) => {
                report.discarded.push(collection);
                false
            }
            Err(err) => {
                report.failed.insert(collection, err.to_string());
                false
            }
        }
    }

    /// Loads every panel from the source. Holds `&mut self` across the fetch;
    /// shared callers should use `begin_load` and `finish_load` instead.
    pub async fn load(&mut self, source: &dyn EntitySource, timeout: Duration) -> LoadReport {
        let tickets = self.begin_load();
        let batch = LoadBatch::fetch(source, timeout).await;
        self.finish_load(tickets, batch)
    }

    pub fn teardown(&mut self) {
        self.curricula.teardown();
        self.subjects.teardown();
        self.milestones.teardown();
        self.goals.teardown();
        self.users.teardown();
        self.institutions.teardown();
        info!("Workspace torn down");
    }

    pub fn subscribe_all(
        &self,
        listener: Arc<dyn Fn(&ChangeEvent) + Send + Sync>,
    ) -> Vec<Subscription> {
        let forward = |listener: &Arc<dyn Fn(&ChangeEvent) + Send + Sync>| {
            let listener = Arc::clone(listener);
            move |event: &ChangeEvent| listener(event)
        };

        vec![
            self.curricula.subscribe(forward(&listener)),
            self.subjects.subscribe(forward(&listener)),
            self.milestones.subscribe(forward(&listener)),
            self.goals.subscribe(forward(&listener)),
            self.users.subscribe(forward(&listener)),
            self.institutions.subscribe(forward(&listener)),
        ]
    }

    pub fn summary(&self) -> Vec<PanelSummary> {
        vec![
            summarize(&self.curricula),
            summarize(&self.subjects),
            summarize(&self.milestones),
            summarize(&self.goals),
            summarize(&self.users),
            summarize(&self.institutions),
        ]
    }
}

fn take_parsed<E: Entity>(batch: &mut LoadBatch) -> Result<Vec<E>, LoadError> {
    batch
        .take(Collection::from(E::KIND))
        .and_then(parse_records::<E>)
}

fn summarize<E: Entity>(panel: &EntityListController<E>) -> PanelSummary {
    PanelSummary {
        kind: E::KIND,
        total: panel.len(),
        active: panel
            .records()
            .iter()
            .filter(|record| record.is_active())
            .count(),
        load_state: panel.load_state().clone(),
    }
}

impl Directory for Workspace {
    fn name_of(&self, kind: EntityKind, id: &str) -> Option<&str> {
        match kind {
            EntityKind::Curriculum => self.curricula.find(id).map(Entity::display_name),
            EntityKind::Subject => self.subjects.find(id).map(Entity::display_name),
            EntityKind::Milestone => self.milestones.find(id).map(Entity::display_name),
            EntityKind::Goal => self.goals.find(id).map(Entity::display_name),
            EntityKind::User => self.users.find(id).map(Entity::display_name),
            EntityKind::Institution => self.institutions.find(id).map(Entity::display_name),
        }
    }

    fn curriculum_of_subject(&self, subject_id: &str) -> Option<&str> {
        self.relations.curriculum_of(subject_id)
    }
}
