use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::controller::EntityListController;
use crate::models::{Curriculum, Entity, Relation, Subject};

pub const NO_SUBJECTS_WARNING: &str = "No subjects are assigned to this curriculum yet";

/// Subject to curriculum links. A subject has at most one curriculum.
#[derive(Debug, Clone, Default)]
pub struct RelationStore {
    relations: Vec<Relation>,
}

impl RelationStore {
    pub fn all(&self) -> &[Relation] {
        &self.relations
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn curriculum_of(&self, subject_id: &str) -> Option<&str> {
        self.relations
            .iter()
            .find(|relation| relation.subject_id == subject_id)
            .map(|relation| relation.curriculum_id.as_str())
    }

    /// Links a subject to a curriculum, replacing any previous link. `None` unlinks it.
    pub fn assign(&mut self, subject_id: &str, curriculum_id: Option<&str>) {
        if let Some(curriculum_id) = curriculum_id {
            if self
                .relations
                .iter()
                .any(|relation| relation.links(subject_id, curriculum_id))
            {
                return;
            }
        }

        self.relations
            .retain(|relation| relation.subject_id != subject_id);
        if let Some(curriculum_id) = curriculum_id {
            debug!(subject_id, curriculum_id, "Linking subject to curriculum");
            self.relations.push(Relation::new(subject_id, curriculum_id));
        }
    }

    pub fn remove_subject(&mut self, subject_id: &str) -> usize {
        let before = self.relations.len();
        self.relations
            .retain(|relation| relation.subject_id != subject_id);
        before - self.relations.len()
    }

    pub fn remove_curriculum(&mut self, curriculum_id: &str) -> usize {
        let before = self.relations.len();
        self.relations
            .retain(|relation| relation.curriculum_id != curriculum_id);
        before - self.relations.len()
    }

    /// Replaces every link. The first link seen for a subject wins; repeats of
    /// the same pair are merged and the number of conflicting links dropped is returned.
    pub fn replace(&mut self, relations: Vec<Relation>) -> usize {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut kept = Vec::with_capacity(relations.len());
        let mut dropped = 0;

        for relation in relations {
            match seen.get(&relation.subject_id) {
                None => {
                    seen.insert(relation.subject_id.clone(), relation.curriculum_id.clone());
                    kept.push(relation);
                }
                Some(curriculum_id) if *curriculum_id == relation.curriculum_id => {}
                Some(_) => {
                    warn!(
                        subject_id = %relation.subject_id,
                        curriculum_id = %relation.curriculum_id,
                        "Dropping extra curriculum link for subject"
                    );
                    dropped += 1;
                }
            }
        }

        self.relations = kept;
        dropped
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOptions<'a> {
    pub subjects: Vec<&'a Subject>,
    pub warning: Option<&'static str>,
}

/// Read-only lookups over the current relation snapshot.
#[derive(Clone, Copy)]
pub struct RelationResolver<'a> {
    relations: &'a RelationStore,
    subjects: &'a EntityListController<Subject>,
    curricula: &'a EntityListController<Curriculum>,
}

impl<'a> RelationResolver<'a> {
    pub fn new(
        relations: &'a RelationStore,
        subjects: &'a EntityListController<Subject>,
        curricula: &'a EntityListController<Curriculum>,
    ) -> Self {
        Self {
            relations,
            subjects,
            curricula,
        }
    }

    /// Subjects linked to the curriculum, in subject list order.
    pub fn subjects_for(&self, curriculum_id: &str) -> Vec<&'a Subject> {
        let relations = self.relations;
        self.subjects
            .records()
            .iter()
            .filter(|subject| relations.curriculum_of(subject.id()) == Some(curriculum_id))
            .collect()
    }

    pub fn curricula_for(&self, subject_id: &str) -> Vec<&'a Curriculum> {
        match self.relations.curriculum_of(subject_id) {
            Some(curriculum_id) => self.curricula.find(curriculum_id).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Active subjects offered for a curriculum, with a warning when there are none.
    pub fn subject_options(&self, curriculum_id: &str) -> SubjectOptions<'a> {
        let subjects: Vec<&'a Subject> = self
            .subjects_for(curriculum_id)
            .into_iter()
            .filter(|subject| subject.is_active())
            .collect();
        let warning = subjects.is_empty().then_some(NO_SUBJECTS_WARNING);

        SubjectOptions { subjects, warning }
    }
}
