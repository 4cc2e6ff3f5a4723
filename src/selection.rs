use serde::Serialize;

/// What the panel is currently doing with a record. At most one record is targeted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "mode", content = "id", rename_all = "snake_case")]
pub enum SelectionState {
    #[default]
    None,
    Viewing(String),
    Editing(String),
    Deleting(String),
}

impl SelectionState {
    pub fn target(&self) -> Option<&str> {
        match self {
            SelectionState::None => None,
            SelectionState::Viewing(id)
            | SelectionState::Editing(id)
            | SelectionState::Deleting(id) => Some(id),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SelectionState::None)
    }
}
