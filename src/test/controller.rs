#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::controller::{EntityListController, LoadOutcome, LoadState};
    use crate::error::{AppError, LoadError, ValidationError};
    use crate::events::{ChangeEvent, ChangeKind};
    use crate::models::{
        Curriculum, CurriculumForm, EntityKind, Goal, GoalForm, Role, User, UserForm,
    };
    use crate::selection::SelectionState;
    use crate::source::Capabilities;
    use crate::test::test_utils::{FailingSource, standard_source};

    fn goal_form(curriculum_id: &str, subject_id: &str, term: &str, goal: &str) -> GoalForm {
        GoalForm {
            curriculum_id: curriculum_id.to_string(),
            subject_id: subject_id.to_string(),
            term: term.to_string(),
            goal: goal.to_string(),
        }
    }

    fn curriculum_form(name: &str, code: &str) -> CurriculumForm {
        CurriculumForm {
            name: name.to_string(),
            code: code.to_string(),
            description: String::new(),
        }
    }

    fn goals(capabilities: Capabilities) -> EntityListController<Goal> {
        EntityListController::new(capabilities)
    }

    fn recorder() -> (Arc<Mutex<Vec<ChangeEvent>>>, impl Fn(&ChangeEvent) + Send + Sync) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |event: &ChangeEvent| {
            sink.lock().unwrap().push(event.clone())
        })
    }

    #[test]
    fn test_add_assigns_fresh_identity() {
        let mut panel = goals(Capabilities::default());

        let first = panel
            .add(goal_form("1", "s1", "Term 1", "Master multiplication tables"))
            .expect("valid goal");
        let second = panel
            .add(goal_form("1", "s1", "Term 2", "Long division"))
            .expect("valid goal");

        assert_eq!(panel.len(), 2);
        assert_ne!(first.meta.id, second.meta.id);
        assert!(uuid::Uuid::parse_str(&first.meta.id).is_ok());
        assert_eq!(first.meta.created_at, first.meta.updated_at);
        assert!(first.meta.is_active);
        assert_eq!(panel.find(&first.meta.id), Some(&first));
    }

    #[test]
    fn test_add_trims_domain_fields() {
        let mut panel = goals(Capabilities::default());

        let goal = panel
            .add(goal_form(" 1 ", "s1", "  Term 1", "Read daily  "))
            .unwrap();

        assert_eq!(goal.curriculum_id, "1");
        assert_eq!(goal.term, "Term 1");
        assert_eq!(goal.goal, "Read daily");
    }

    #[test]
    fn test_add_rejects_missing_required_fields() {
        let mut panel = goals(Capabilities::default());

        let err = panel
            .add(goal_form("1", "   ", "", "Read daily"))
            .unwrap_err();

        match err {
            AppError::Validation(validation) => {
                assert_eq!(validation.messages("subjectId"), ["is required"]);
                assert_eq!(validation.messages("term"), ["is required"]);
                assert!(validation.messages("curriculumId").is_empty());
            }
            other => panic!("expected a validation error, got {:?}", other),
        }
        assert!(panel.is_empty());
    }

    #[test]
    fn test_duplicate_goal_is_rejected() {
        let mut panel = goals(Capabilities::default());

        panel
            .add(goal_form("1", "s1", "Term 1", "Master multiplication tables"))
            .unwrap();
        let err = panel
            .add(goal_form("1", "s1", "Term 1", "Master multiplication tables"))
            .unwrap_err();

        match err {
            AppError::Validation(ValidationError::Duplicate { kind, message }) => {
                assert_eq!(kind, EntityKind::Goal);
                assert_eq!(
                    message,
                    "A goal already exists for this curriculum, subject and term"
                );
            }
            other => panic!("expected a duplicate error, got {:?}", other),
        }
        assert_eq!(panel.len(), 1);
    }

    #[test]
    fn test_duplicate_check_includes_inactive_records() {
        let mut panel = goals(Capabilities::default());

        let goal = panel
            .add(goal_form("1", "s1", "Term 1", "Master multiplication tables"))
            .unwrap();
        panel.toggle_active(&goal.meta.id).unwrap();

        let err = panel
            .add(goal_form("1", "s1", "term 1", "Something else"))
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationError::Duplicate { .. })
        ));
        assert_eq!(panel.len(), 1);
    }

    #[test]
    fn test_natural_key_ignores_case_and_whitespace() {
        let mut panel: EntityListController<Curriculum> =
            EntityListController::new(Capabilities::default());

        panel.add(curriculum_form("Competency Based", "CBC")).unwrap();
        let err = panel
            .add(curriculum_form("Another name", "  cbc "))
            .unwrap_err();

        assert_eq!(err.status_code(), rocket::http::Status::Conflict);
        assert_eq!(panel.len(), 1);
    }

    #[test]
    fn test_user_form_validation() {
        let mut panel: EntityListController<User> =
            EntityListController::new(Capabilities::default());

        let err = panel
            .add(UserForm {
                name: "Amina".to_string(),
                email: "not-an-email".to_string(),
                phone: Some("12ab".to_string()),
                role: None,
                school_id: None,
            })
            .unwrap_err();

        let AppError::Validation(validation) = err else {
            panic!("expected a validation error");
        };
        assert_eq!(validation.messages("email"), ["must be a valid email address"]);
        assert_eq!(validation.messages("phone"), ["must be a valid phone number"]);
        assert_eq!(validation.messages("role"), ["is required"]);

        let user = panel
            .add(UserForm {
                name: "Amina".to_string(),
                email: "amina@greenfield.ac.ke".to_string(),
                phone: Some("  ".to_string()),
                role: Some(Role::Teacher),
                school_id: Some("i1".to_string()),
            })
            .expect("valid user");
        assert_eq!(user.phone, None);
        assert_eq!(user.role, Role::Teacher);
    }

    #[test]
    fn test_edit_preserves_identity() {
        let mut panel = goals(Capabilities::default());
        let original = panel
            .add(goal_form("1", "s1", "Term 1", "Master multiplication tables"))
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let edited = panel
            .edit(
                &original.meta.id,
                goal_form("1", "s1", "Term 1", "Master tables up to 12"),
            )
            .expect("editing its own key is not a duplicate");

        assert_eq!(edited.meta.id, original.meta.id);
        assert_eq!(edited.meta.created_at, original.meta.created_at);
        assert_eq!(edited.meta.is_active, original.meta.is_active);
        assert!(edited.meta.updated_at >= original.meta.updated_at);
        assert_eq!(edited.goal, "Master tables up to 12");
        assert_eq!(panel.len(), 1);
    }

    #[test]
    fn test_edit_into_existing_key_is_rejected() {
        let mut panel = goals(Capabilities::default());
        panel.add(goal_form("1", "s1", "Term 1", "First")).unwrap();
        let second = panel.add(goal_form("1", "s1", "Term 2", "Second")).unwrap();

        let err = panel
            .edit(&second.meta.id, goal_form("1", "s1", "Term 1", "Second"))
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationError::Duplicate { .. })
        ));
        assert_eq!(panel.get(&second.meta.id).unwrap().term, "Term 2");
    }

    #[test]
    fn test_edit_unknown_id_never_creates() {
        let mut panel = goals(Capabilities::default());

        let err = panel
            .edit("missing", goal_form("1", "s1", "Term 1", "Ghost"))
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(panel.is_empty());
    }

    #[test]
    fn test_edit_after_remove_is_not_found() {
        let mut panel = goals(Capabilities::FULL);
        let goal = panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();

        let removed = panel.remove(&goal.meta.id).expect("hard delete enabled");
        assert_eq!(removed.meta.id, goal.meta.id);

        let err = panel
            .edit(&goal.meta.id, goal_form("1", "s1", "Term 1", "Read more"))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(panel.is_empty());
    }

    #[test]
    fn test_remove_requires_hard_delete() {
        let mut panel = goals(Capabilities::default());
        let goal = panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();

        let err = panel.remove(&goal.meta.id).unwrap_err();

        assert!(matches!(err, AppError::Unsupported(_)));
        assert_eq!(err.status_code(), rocket::http::Status::NotImplemented);
        assert_eq!(panel.len(), 1);
    }

    #[test]
    fn test_toggle_twice_restores_status() {
        let mut panel = goals(Capabilities::default());
        let goal = panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();

        let toggled = panel.toggle_active(&goal.meta.id).unwrap();
        assert!(!toggled.meta.is_active);
        assert!(toggled.meta.updated_at >= goal.meta.updated_at);

        let restored = panel.toggle_active(&goal.meta.id).unwrap();
        assert!(restored.meta.is_active);
        assert_eq!(restored.meta.id, goal.meta.id);
        assert_eq!(restored.meta.created_at, goal.meta.created_at);
    }

    #[test]
    fn test_toggle_requires_status_update() {
        let mut panel = goals(Capabilities {
            hard_delete: false,
            status_update: false,
        });
        let goal = panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();

        let err = panel.toggle_active(&goal.meta.id).unwrap_err();

        assert!(matches!(err, AppError::Unsupported(_)));
        assert!(panel.get(&goal.meta.id).unwrap().meta.is_active);
    }

    #[test]
    fn test_listeners_receive_changes() {
        let mut panel = goals(Capabilities::FULL);
        let (events, listener) = recorder();
        let subscription = panel.subscribe(listener);

        let goal = panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();
        panel
            .edit(&goal.meta.id, goal_form("1", "s1", "Term 1", "Read aloud"))
            .unwrap();
        panel.toggle_active(&goal.meta.id).unwrap();
        panel.remove(&goal.meta.id).unwrap();

        let changes: Vec<ChangeKind> = events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.change.clone())
            .collect();
        assert_eq!(
            changes,
            vec![
                ChangeKind::Added,
                ChangeKind::Edited,
                ChangeKind::Toggled { active: false },
                ChangeKind::Removed,
            ]
        );
        assert!(events
            .lock()
            .unwrap()
            .iter()
            .all(|event| event.id.as_deref() == Some(goal.meta.id.as_str())));

        drop(subscription);
        panel.add(goal_form("1", "s1", "Term 2", "Write")).unwrap();
        assert_eq!(events.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_failed_validation_does_not_notify() {
        let mut panel = goals(Capabilities::default());
        let (events, listener) = recorder();
        panel.subscribe(listener).detach();

        let _ = panel.add(goal_form("", "", "", ""));

        assert!(events.lock().unwrap().is_empty());
        assert_eq!(panel.listener_count(), 1);
    }

    #[test]
    fn test_unsubscribe_and_detach() {
        let panel = goals(Capabilities::default());

        let subscription = panel.subscribe(|_| {});
        assert_eq!(panel.listener_count(), 1);
        subscription.unsubscribe();
        assert_eq!(panel.listener_count(), 0);

        panel.subscribe(|_| {}).detach();
        assert_eq!(panel.listener_count(), 1);
    }

    #[test]
    fn test_selection_flow() {
        let mut panel = goals(Capabilities::FULL);
        let goal = panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();

        let err = panel
            .select(SelectionState::Viewing("missing".to_string()))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(panel.selection().is_none());

        let err = panel
            .edit_selected(goal_form("1", "s1", "Term 1", "Read more"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        panel
            .select(SelectionState::Editing(goal.meta.id.clone()))
            .unwrap();
        let edited = panel
            .edit_selected(goal_form("1", "s1", "Term 1", "Read more"))
            .unwrap();
        assert_eq!(edited.goal, "Read more");
        assert!(panel.selection().is_none());

        panel
            .select(SelectionState::Deleting(goal.meta.id.clone()))
            .unwrap();
        panel.confirm_delete().unwrap();
        assert!(panel.selection().is_none());
        assert!(panel.is_empty());
    }

    #[test]
    fn test_clear_selection() {
        let mut panel = goals(Capabilities::default());
        let goal = panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();

        panel
            .select(SelectionState::Viewing(goal.meta.id.clone()))
            .unwrap();
        assert_eq!(panel.selection().target(), Some(goal.meta.id.as_str()));

        panel.clear_selection();
        assert!(panel.selection().is_none());
    }

    #[test]
    fn test_remove_clears_matching_selection() {
        let mut panel = goals(Capabilities::FULL);
        let goal = panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();
        panel
            .select(SelectionState::Viewing(goal.meta.id.clone()))
            .unwrap();

        panel.remove(&goal.meta.id).unwrap();

        assert_eq!(panel.selection(), &SelectionState::None);
    }

    #[test]
    fn test_superseded_load_is_discarded() {
        let mut panel = goals(Capabilities::default());

        let stale = panel.begin_load();
        let fresh = panel.begin_load();

        let outcome = panel
            .finish_load(fresh, Ok(vec![]))
            .expect("fresh load applies");
        assert_eq!(outcome, LoadOutcome::Applied(0));

        let outcome = panel
            .finish_load(stale, Err(LoadError::Unavailable("late".to_string())))
            .expect("stale loads are dropped silently");
        assert_eq!(outcome, LoadOutcome::Discarded);
        assert!(matches!(panel.load_state(), LoadState::Ready { count: 0, .. }));
    }

    #[test]
    fn test_load_counts_changes_it_replaces() {
        let mut panel = goals(Capabilities::default());

        let ticket = panel.begin_load();
        assert_eq!(panel.changes_since(&ticket), 0);

        let goal = panel
            .add(goal_form("1", "s1", "Term 1", "Master multiplication tables"))
            .unwrap();
        panel.toggle_active(&goal.meta.id).unwrap();
        assert_eq!(panel.changes_since(&ticket), 2);

        // The fetched list wins over changes made while it was in flight.
        let outcome = panel.finish_load(ticket, Ok(vec![])).unwrap();
        assert_eq!(outcome, LoadOutcome::Applied(0));
        assert!(panel.is_empty());

        let next = panel.begin_load();
        assert_eq!(panel.changes_since(&next), 0);
    }

    #[test]
    fn test_teardown_discards_in_flight_load() {
        let mut panel = goals(Capabilities::default());
        let (events, listener) = recorder();
        panel.subscribe(listener).detach();

        let ticket = panel.begin_load();
        panel.teardown();

        let outcome = panel.finish_load(ticket, Ok(vec![])).unwrap();
        assert_eq!(outcome, LoadOutcome::Discarded);
        assert_eq!(panel.listener_count(), 0);
        assert!(events.lock().unwrap().is_empty());
        assert_eq!(panel.load_state(), &LoadState::Idle);
    }

    #[test]
    fn test_failed_load_keeps_records() {
        let mut panel = goals(Capabilities::default());
        panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();

        let ticket = panel.begin_load();
        let err = panel
            .finish_load(ticket, Err(LoadError::Unavailable("backend down".to_string())))
            .unwrap_err();

        assert!(matches!(err, AppError::Load(_)));
        assert_eq!(panel.len(), 1);
        match panel.load_state() {
            LoadState::Failed { message, .. } => assert!(message.contains("backend down")),
            other => panic!("expected a failed load state, got {:?}", other),
        }
    }

    #[rocket::async_test]
    async fn test_load_from_source() {
        let source = standard_source(false);
        let mut panel = goals(Capabilities::default());
        let (events, listener) = recorder();
        panel.subscribe(listener).detach();

        let count = panel
            .load(&source, Duration::from_secs(5))
            .await
            .expect("standard goals load");

        assert_eq!(count, 3);
        let ids: HashSet<&str> = panel.records().iter().map(|g| g.meta.id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["g1", "g2", "g3"]));
        assert_eq!(panel.get("g2").unwrap().goal, "Write a structured paragraph");
        assert!(!panel.get("g3").unwrap().meta.is_active);
        assert_eq!(
            events.lock().unwrap().last().map(|event| event.change.clone()),
            Some(ChangeKind::Reloaded { count: 3 })
        );
    }

    #[rocket::async_test]
    async fn test_load_failure_is_reported_not_replaced() {
        let mut panel = goals(Capabilities::default());
        panel.add(goal_form("1", "s1", "Term 1", "Read")).unwrap();

        let err = panel
            .load(&FailingSource, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), rocket::http::Status::ServiceUnavailable);
        assert_eq!(panel.len(), 1);
        assert!(matches!(panel.load_state(), LoadState::Failed { .. }));
    }
}
