#[macro_use]
extern crate rocket;

mod activity;
mod api;
mod connectivity;
mod controller;
mod database;
mod env;
mod error;
mod events;
mod export;
mod filter;
mod models;
mod relations;
mod selection;
mod source;
mod state;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;
mod workspace;

use api::{
    api_activity, api_create_curriculum, api_create_goal, api_create_institution,
    api_create_milestone, api_create_subject, api_create_user, api_curriculum_subjects,
    api_dashboard, api_delete_curriculum, api_delete_goal, api_delete_institution,
    api_delete_milestone, api_delete_subject, api_delete_user, api_export_users,
    api_get_curriculum, api_get_goal, api_get_institution, api_get_milestone, api_get_subject,
    api_get_user, api_list_curricula, api_list_goals, api_list_institutions, api_list_milestones,
    api_list_subjects, api_list_users, api_reload, api_subject_curricula, api_toggle_curriculum,
    api_toggle_goal, api_toggle_institution, api_toggle_milestone, api_toggle_subject,
    api_toggle_user, api_update_curriculum, api_update_goal, api_update_institution,
    api_update_milestone, api_update_subject, api_update_user, bad_request, health,
    internal_error, not_found, unprocessable,
};
use env::{Settings, load_environment};
use error::AppError;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use state::AppState;
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Rocket(#[from] rocket::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    if let Err(err) = load_environment() {
        eprintln!("Failed to load environment files: {}", err);
    }
    let _telemetry = init_tracing();

    let settings =
        Settings::from_env().inspect_err(|err| error!(error = %err, "Invalid settings"))?;
    info!(?settings, "Starting school admin");

    let state = AppState::bootstrap(settings).await?;

    let _ = init_rocket(state).launch().await?;
    Ok(())
}

pub fn init_rocket(state: AppState) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .mount(
            "/api",
            routes![
                api_list_curricula,
                api_get_curriculum,
                api_create_curriculum,
                api_update_curriculum,
                api_delete_curriculum,
                api_toggle_curriculum,
                api_curriculum_subjects,
                api_list_subjects,
                api_get_subject,
                api_create_subject,
                api_update_subject,
                api_delete_subject,
                api_toggle_subject,
                api_subject_curricula,
                api_list_milestones,
                api_get_milestone,
                api_create_milestone,
                api_update_milestone,
                api_delete_milestone,
                api_toggle_milestone,
                api_list_goals,
                api_get_goal,
                api_create_goal,
                api_update_goal,
                api_delete_goal,
                api_toggle_goal,
                api_list_users,
                api_get_user,
                api_create_user,
                api_update_user,
                api_delete_user,
                api_toggle_user,
                api_export_users,
                api_list_institutions,
                api_get_institution,
                api_create_institution,
                api_update_institution,
                api_delete_institution,
                api_toggle_institution,
                api_dashboard,
                api_activity,
                api_reload,
            ],
        )
        .register(
            "/api",
            catchers![bad_request, not_found, unprocessable, internal_error],
        )
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Stop background work", |rocket| {
            Box::pin(async move {
                if let Some(state) = rocket.state::<AppState>() {
                    state.shutdown().await;
                }
            })
        }))
}
