//! Handlers for submitting and inspecting generation jobs.

use atelier_core::error::CoreError;
use atelier_core::job::{JobRecord, NewJob};
use atelier_core::params::{parse, ParsedInput};
use atelier_core::types::JobId;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// Request body for `POST /generations`.
#[derive(Debug, Deserialize)]
pub struct SubmitGenerationInput {
    /// Prompt with optional `--flags`, or a `/command`.
    pub text: String,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub private: bool,
}

/// What a submission turned into.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Job(JobRecord),
    Command(atelier_core::command::Command),
}

/// POST /api/v1/generations
///
/// Parse the text. A generation request is persisted as a pending job,
/// spawned on the runner and answered with 202; a slash command is
/// answered with 200 and nothing is persisted.
pub async fn submit_generation(
    State(state): State<AppState>,
    Json(input): Json<SubmitGenerationInput>,
) -> AppResult<Response> {
    if input.user_id.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "user_id must not be empty".into(),
        )));
    }

    let default_model = &state.config.default_model;
    match parse(&input.text, default_model)? {
        ParsedInput::Command(command) => {
            tracing::debug!(user_id = %input.user_id, ?command, "Command received");
            let body = DataResponse {
                data: SubmitOutcome::Command(command),
            };
            Ok((StatusCode::OK, Json(body)).into_response())
        }
        ParsedInput::Generate(params) => {
            let workflow = params.model().unwrap_or(default_model).to_string();
            let job = JobRecord::new(NewJob {
                user_id: input.user_id,
                username: input.username,
                prompt: input.text.trim().to_string(),
                parameters: params,
                workflow,
                private: input.private,
            });
            state.store.insert(&job).await?;
            tracing::info!(job_id = %job.id, workflow = %job.workflow, "Generation job queued");

            state.runner.spawn(job.clone());

            let body = DataResponse {
                data: SubmitOutcome::Job(job),
            };
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/generations/{id}
pub async fn get_generation(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .store
        .find(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Generation job",
            id,
        }))?;

    Ok(Json(DataResponse { data: job }))
}
