use std::collections::BTreeMap;

use rocket::State;
use rocket::http::{Header, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::Serialize;
use tracing::info;

use crate::activity::ActivityEntry;
use crate::connectivity::Connectivity;
use crate::controller::LoadState;
use crate::export::users_csv;
use crate::filter::Filter;
use crate::models::{
    Curriculum, CurriculumForm, Directory, Goal, GoalForm, Institution, InstitutionForm,
    Milestone, MilestoneForm, Subject, SubjectForm, User, UserForm,
};
use crate::source::Capabilities;
use crate::state::AppState;
use crate::validation::{ToValidationResponse, ValidationResponse};
use crate::workspace::{LoadReport, Panel, PanelSummary};

type ApiResult<T> = Result<T, Custom<Json<ValidationResponse>>>;

#[derive(FromForm, Default)]
pub struct FilterParams {
    search: Option<String>,
    #[field(name = "curriculumId")]
    #[field(name = "curriculum_id")]
    curriculum_id: Option<String>,
    #[field(name = "subjectId")]
    #[field(name = "subject_id")]
    subject_id: Option<String>,
    term: Option<String>,
    #[field(name = "schoolId")]
    #[field(name = "school_id")]
    school_id: Option<String>,
    active: Option<bool>,
}

impl From<FilterParams> for Filter {
    fn from(params: FilterParams) -> Self {
        Filter {
            search: params.search,
            curriculum_id: params.curriculum_id,
            subject_id: params.subject_id,
            term: params.term,
            school_id: params.school_id,
            active: params.active,
        }
    }
}

/// A record as served to the panel, with the names of related records alongside.
#[derive(Serialize)]
pub struct Row<E: Serialize> {
    #[serde(flatten)]
    pub record: E,
    #[serde(flatten)]
    pub related: BTreeMap<&'static str, String>,
}

impl<E: Panel> Row<E> {
    fn new(record: E, directory: &dyn Directory) -> Self {
        let related = record.row_fields(directory).into_iter().collect();
        Self { record, related }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<E: Serialize> {
    pub items: Vec<Row<E>>,
    pub total: usize,
    pub matched: usize,
    pub load_state: LoadState,
    pub capabilities: Capabilities,
}

async fn list<E: Panel>(state: &AppState, params: FilterParams) -> Json<ListResponse<E>> {
    let workspace = state.workspace.read().await;
    let filter = Filter::from(params);
    let panel = workspace.panel::<E>();

    let items: Vec<Row<E>> = workspace
        .filter::<E>(&filter)
        .into_iter()
        .map(|record| Row::new(record.clone(), &*workspace))
        .collect();

    Json(ListResponse {
        matched: items.len(),
        total: panel.len(),
        load_state: panel.load_state().clone(),
        capabilities: panel.capabilities(),
        items,
    })
}

async fn show<E: Panel>(state: &AppState, id: &str) -> ApiResult<Json<Row<E>>> {
    let workspace = state.workspace.read().await;
    let record = workspace.panel::<E>().get(id)?.clone();
    Ok(Json(Row::new(record, &*workspace)))
}

async fn create<E: Panel>(state: &AppState, form: E::Form) -> ApiResult<Custom<Json<Row<E>>>> {
    let mut workspace = state.workspace.write().await;
    let record = workspace.add::<E>(form)?;
    Ok(Custom(Status::Created, Json(Row::new(record, &*workspace))))
}

async fn update<E: Panel>(state: &AppState, id: &str, form: E::Form) -> ApiResult<Json<Row<E>>> {
    let mut workspace = state.workspace.write().await;
    let record = workspace.edit::<E>(id, form)?;
    Ok(Json(Row::new(record, &*workspace)))
}

async fn delete<E: Panel>(state: &AppState, id: &str) -> ApiResult<Json<Row<E>>> {
    let mut workspace = state.workspace.write().await;
    let record = workspace.remove::<E>(id)?;
    Ok(Json(Row::new(record, &*workspace)))
}

async fn toggle<E: Panel>(state: &AppState, id: &str) -> ApiResult<Json<Row<E>>> {
    let mut workspace = state.workspace.write().await;
    let record = workspace.toggle_active::<E>(id)?;
    Ok(Json(Row::new(record, &*workspace)))
}

// Curricula

#[get("/curricula?<params..>")]
pub async fn api_list_curricula(
    params: FilterParams,
    state: &State<AppState>,
) -> Json<ListResponse<Curriculum>> {
    list::<Curriculum>(state, params).await
}

#[get("/curricula/<id>")]
pub async fn api_get_curriculum(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Curriculum>>> {
    show::<Curriculum>(state, id).await
}

#[post("/curricula", data = "<form>")]
pub async fn api_create_curriculum(
    form: Json<CurriculumForm>,
    state: &State<AppState>,
) -> ApiResult<Custom<Json<Row<Curriculum>>>> {
    create::<Curriculum>(state, form.into_inner()).await
}

#[put("/curricula/<id>", data = "<form>")]
pub async fn api_update_curriculum(
    id: &str,
    form: Json<CurriculumForm>,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Curriculum>>> {
    update::<Curriculum>(state, id, form.into_inner()).await
}

#[delete("/curricula/<id>")]
pub async fn api_delete_curriculum(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Curriculum>>> {
    delete::<Curriculum>(state, id).await
}

#[post("/curricula/<id>/toggle")]
pub async fn api_toggle_curriculum(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Curriculum>>> {
    toggle::<Curriculum>(state, id).await
}

#[derive(Serialize)]
pub struct SubjectOptionsResponse {
    pub subjects: Vec<Row<Subject>>,
    pub warning: Option<&'static str>,
}

/// Active subjects for a curriculum, as offered in the milestone and goal forms.
#[get("/curricula/<id>/subjects")]
pub async fn api_curriculum_subjects(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<SubjectOptionsResponse>> {
    let workspace = state.workspace.read().await;
    workspace.curricula.get(id)?;

    let options = workspace.resolver().subject_options(id);
    let subjects = options
        .subjects
        .into_iter()
        .map(|subject| Row::new(subject.clone(), &*workspace))
        .collect();

    Ok(Json(SubjectOptionsResponse {
        subjects,
        warning: options.warning,
    }))
}

// Subjects

#[get("/subjects?<params..>")]
pub async fn api_list_subjects(
    params: FilterParams,
    state: &State<AppState>,
) -> Json<ListResponse<Subject>> {
    list::<Subject>(state, params).await
}

#[get("/subjects/<id>")]
pub async fn api_get_subject(id: &str, state: &State<AppState>) -> ApiResult<Json<Row<Subject>>> {
    show::<Subject>(state, id).await
}

#[post("/subjects", data = "<form>")]
pub async fn api_create_subject(
    form: Json<SubjectForm>,
    state: &State<AppState>,
) -> ApiResult<Custom<Json<Row<Subject>>>> {
    create::<Subject>(state, form.into_inner()).await
}

#[put("/subjects/<id>", data = "<form>")]
pub async fn api_update_subject(
    id: &str,
    form: Json<SubjectForm>,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Subject>>> {
    update::<Subject>(state, id, form.into_inner()).await
}

#[delete("/subjects/<id>")]
pub async fn api_delete_subject(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Subject>>> {
    delete::<Subject>(state, id).await
}

#[post("/subjects/<id>/toggle")]
pub async fn api_toggle_subject(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Subject>>> {
    toggle::<Subject>(state, id).await
}

#[get("/subjects/<id>/curricula")]
pub async fn api_subject_curricula(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Vec<Row<Curriculum>>>> {
    let workspace = state.workspace.read().await;
    workspace.subjects.get(id)?;

    let curricula = workspace
        .resolver()
        .curricula_for(id)
        .into_iter()
        .map(|curriculum| Row::new(curriculum.clone(), &*workspace))
        .collect();

    Ok(Json(curricula))
}

// Milestones

#[get("/milestones?<params..>")]
pub async fn api_list_milestones(
    params: FilterParams,
    state: &State<AppState>,
) -> Json<ListResponse<Milestone>> {
    list::<Milestone>(state, params).await
}

#[get("/milestones/<id>")]
pub async fn api_get_milestone(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Milestone>>> {
    show::<Milestone>(state, id).await
}

#[post("/milestones", data = "<form>")]
pub async fn api_create_milestone(
    form: Json<MilestoneForm>,
    state: &State<AppState>,
) -> ApiResult<Custom<Json<Row<Milestone>>>> {
    create::<Milestone>(state, form.into_inner()).await
}

#[put("/milestones/<id>", data = "<form>")]
pub async fn api_update_milestone(
    id: &str,
    form: Json<MilestoneForm>,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Milestone>>> {
    update::<Milestone>(state, id, form.into_inner()).await
}

#[delete("/milestones/<id>")]
pub async fn api_delete_milestone(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Milestone>>> {
    delete::<Milestone>(state, id).await
}

#[post("/milestones/<id>/toggle")]
pub async fn api_toggle_milestone(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Milestone>>> {
    toggle::<Milestone>(state, id).await
}

// Goals

#[get("/goals?<params..>")]
pub async fn api_list_goals(
    params: FilterParams,
    state: &State<AppState>,
) -> Json<ListResponse<Goal>> {
    list::<Goal>(state, params).await
}

#[get("/goals/<id>")]
pub async fn api_get_goal(id: &str, state: &State<AppState>) -> ApiResult<Json<Row<Goal>>> {
    show::<Goal>(state, id).await
}

#[post("/goals", data = "<form>")]
pub async fn api_create_goal(
    form: Json<GoalForm>,
    state: &State<AppState>,
) -> ApiResult<Custom<Json<Row<Goal>>>> {
    create::<Goal>(state, form.into_inner()).await
}

#[put("/goals/<id>", data = "<form>")]
pub async fn api_update_goal(
    id: &str,
    form: Json<GoalForm>,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Goal>>> {
    update::<Goal>(state, id, form.into_inner()).await
}

#[delete("/goals/<id>")]
pub async fn api_delete_goal(id: &str, state: &State<AppState>) -> ApiResult<Json<Row<Goal>>> {
    delete::<Goal>(state, id).await
}

#[post("/goals/<id>/toggle")]
pub async fn api_toggle_goal(id: &str, state: &State<AppState>) -> ApiResult<Json<Row<Goal>>> {
    toggle::<Goal>(state, id).await
}

// Users

#[get("/users?<params..>")]
pub async fn api_list_users(
    params: FilterParams,
    state: &State<AppState>,
) -> Json<ListResponse<User>> {
    list::<User>(state, params).await
}

#[get("/users/<id>")]
pub async fn api_get_user(id: &str, state: &State<AppState>) -> ApiResult<Json<Row<User>>> {
    show::<User>(state, id).await
}

#[post("/users", data = "<form>")]
pub async fn api_create_user(
    form: Json<UserForm>,
    state: &State<AppState>,
) -> ApiResult<Custom<Json<Row<User>>>> {
    create::<User>(state, form.into_inner()).await
}

#[put("/users/<id>", data = "<form>")]
pub async fn api_update_user(
    id: &str,
    form: Json<UserForm>,
    state: &State<AppState>,
) -> ApiResult<Json<Row<User>>> {
    update::<User>(state, id, form.into_inner()).await
}

#[delete("/users/<id>")]
pub async fn api_delete_user(id: &str, state: &State<AppState>) -> ApiResult<Json<Row<User>>> {
    delete::<User>(state, id).await
}

#[post("/users/<id>/toggle")]
pub async fn api_toggle_user(id: &str, state: &State<AppState>) -> ApiResult<Json<Row<User>>> {
    toggle::<User>(state, id).await
}

#[derive(Responder)]
#[response(content_type = "text/csv")]
pub struct CsvDownload {
    body: String,
    disposition: Header<'static>,
}

impl CsvDownload {
    fn new(filename: &str, body: String) -> Self {
        Self {
            body,
            disposition: Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename),
            ),
        }
    }
}

/// The users panel as CSV, honouring the same filter as the list.
#[get("/export/users.csv?<params..>")]
pub async fn api_export_users(params: FilterParams, state: &State<AppState>) -> CsvDownload {
    let workspace = state.workspace.read().await;
    let filter = Filter::from(params);
    let users = workspace.filter::<User>(&filter);
    info!(rows = users.len(), "Exporting users");

    CsvDownload::new("users.csv", users_csv(&users, &*workspace))
}

// Institutions

#[get("/institutions?<params..>")]
pub async fn api_list_institutions(
    params: FilterParams,
    state: &State<AppState>,
) -> Json<ListResponse<Institution>> {
    list::<Institution>(state, params).await
}

#[get("/institutions/<id>")]
pub async fn api_get_institution(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Institution>>> {
    show::<Institution>(state, id).await
}

#[post("/institutions", data = "<form>")]
pub async fn api_create_institution(
    form: Json<InstitutionForm>,
    state: &State<AppState>,
) -> ApiResult<Custom<Json<Row<Institution>>>> {
    create::<Institution>(state, form.into_inner()).await
}

#[put("/institutions/<id>", data = "<form>")]
pub async fn api_update_institution(
    id: &str,
    form: Json<InstitutionForm>,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Institution>>> {
    update::<Institution>(state, id, form.into_inner()).await
}

#[delete("/institutions/<id>")]
pub async fn api_delete_institution(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Institution>>> {
    delete::<Institution>(state, id).await
}

#[post("/institutions/<id>/toggle")]
pub async fn api_toggle_institution(
    id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<Row<Institution>>> {
    toggle::<Institution>(state, id).await
}

// Workspace-wide

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub panels: Vec<PanelSummary>,
    pub relations: usize,
    pub connectivity: Connectivity,
}

#[get("/dashboard")]
pub async fn api_dashboard(state: &State<AppState>) -> Json<DashboardResponse> {
    let workspace = state.workspace.read().await;
    Json(DashboardResponse {
        panels: workspace.summary(),
        relations: workspace.relations().len(),
        connectivity: state.monitor.status(),
    })
}

#[get("/activity?<limit>")]
pub async fn api_activity(
    limit: Option<usize>,
    state: &State<AppState>,
) -> Json<Vec<ActivityEntry>> {
    Json(state.activity.recent(limit.unwrap_or(50)))
}

#[post("/reload")]
pub async fn api_reload(state: &State<AppState>) -> Custom<Json<LoadReport>> {
    let report = state.reload().await;
    let status = if report.is_complete() {
        Status::Ok
    } else {
        Status::ServiceUnavailable
    };
    Custom(status, Json(report))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub source: String,
    pub connectivity: Connectivity,
}

#[get("/health")]
pub fn health(state: &State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        source: state.source.name().to_string(),
        connectivity: state.monitor.status(),
    })
}

#[catch(400)]
pub fn bad_request() -> Custom<Json<ValidationResponse>> {
    Status::BadRequest.to_validation_response()
}

#[catch(404)]
pub fn not_found() -> Custom<Json<ValidationResponse>> {
    Status::NotFound.to_validation_response()
}

#[catch(422)]
pub fn unprocessable() -> Custom<Json<ValidationResponse>> {
    Status::UnprocessableEntity.to_validation_response()
}

#[catch(500)]
pub fn internal_error() -> Custom<Json<ValidationResponse>> {
    Status::InternalServerError.to_validation_response()
}
