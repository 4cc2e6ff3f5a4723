use crate::models::{Dimension, Directory, Entity};

/// Panel filter. Every criterion is optional and blank values match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub search: Option<String>,
    pub curriculum_id: Option<String>,
    pub subject_id: Option<String>,
    pub term: Option<String>,
    pub school_id: Option<String>,
    pub active: Option<bool>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Filter {
    pub fn search(mut self, search: &str) -> Self {
        self.search = Some(search.to_string());
        self
    }

    pub fn curriculum(mut self, id: &str) -> Self {
        self.curriculum_id = Some(id.to_string());
        self
    }

    pub fn subject(mut self, id: &str) -> Self {
        self.subject_id = Some(id.to_string());
        self
    }

    pub fn term(mut self, term: &str) -> Self {
        self.term = Some(term.to_string());
        self
    }

    pub fn school(mut self, id: &str) -> Self {
        self.school_id = Some(id.to_string());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    fn wanted(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Curriculum => present(&self.curriculum_id),
            Dimension::Subject => present(&self.subject_id),
            Dimension::Term => present(&self.term),
            Dimension::School => present(&self.school_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none()
            && present(&self.search).is_none()
            && [
                Dimension::Curriculum,
                Dimension::Subject,
                Dimension::Term,
                Dimension::School,
            ]
            .into_iter()
            .all(|dimension| self.wanted(dimension).is_none())
    }

    /// All criteria are ANDed. Dimensions the entity kind does not carry are ignored.
    pub fn matches<E: Entity>(&self, record: &E, directory: &dyn Directory) -> bool {
        if let Some(active) = self.active {
            if record.is_active() != active {
                return false;
            }
        }

        for &dimension in E::DIMENSIONS {
            if let Some(wanted) = self.wanted(dimension) {
                if record.dimension(dimension, directory) != Some(wanted) {
                    return false;
                }
            }
        }

        match present(&self.search) {
            Some(search) => {
                let needle = search.to_lowercase();
                record
                    .text_fields()
                    .into_iter()
                    .any(|field| field.to_lowercase().contains(&needle))
                    || record
                        .related_names(directory)
                        .iter()
                        .any(|(_, name)| name.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}
