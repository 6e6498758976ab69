use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::applications::{self, CandidateApplicationView};
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::notifications;
use crate::state::AppState;

use super::Items;

const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Deserialize)]
pub struct SubmitApplicationRequest {
    pub job_id: Uuid,
    pub message: Option<String>,
}

pub async fn submit_application(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<SubmitApplicationRequest>,
) -> AppResult<(StatusCode, Json<CandidateApplicationView>)> {
    if payload
        .message
        .as_ref()
        .is_some_and(|m| m.chars().count() > MAX_MESSAGE_LEN)
    {
        return Err(AppError::bad_request(format!(
            "message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }

    let mut conn = state.db()?;
    let view = conn.transaction::<_, AppError, _>(|conn| {
        let transition =
            applications::submit_application(conn, user.user_id, payload.job_id, payload.message)?;
        notifications::materialize(conn, std::slice::from_ref(&transition.event))?;
        Ok(applications::load_candidate_view(
            conn,
            transition.application.id,
        )?)
    })?;

    tracing::info!(
        application_id = %view.id,
        job_id = %view.job_id,
        user_id = %user.user_id,
        "application submitted"
    );
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_my_applications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Items<CandidateApplicationView>>> {
    let mut conn = state.db()?;
    let items = applications::list_for_candidate(&mut conn, user.user_id)?;
    Ok(Json(Items { items }))
}
