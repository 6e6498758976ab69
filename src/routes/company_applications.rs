use axum::{
    extract::{Path, Query, State},
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::applications::{self, CompanyApplicationView};
use crate::auth::StaffUser;
use crate::error::{AppError, AppResult};
use crate::notifications;
use crate::state::AppState;

use super::Items;

#[derive(Debug, Default, Deserialize)]
pub struct CompanyApplicationsQuery {
    pub job_id: Option<Uuid>,
}

/// Applications to jobs of companies the caller owns.
pub async fn list_company_applications(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Query(query): Query<CompanyApplicationsQuery>,
) -> AppResult<Json<Items<CompanyApplicationView>>> {
    let mut conn = state.db()?;
    let items = applications::list_for_company_owner(&mut conn, user.user_id, query.job_id)?;
    Ok(Json(Items { items }))
}

pub async fn match_company_application(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Path(application_id): Path<Uuid>,
) -> AppResult<Json<CompanyApplicationView>> {
    let mut conn = state.db()?;
    let view = conn.transaction::<_, AppError, _>(|conn| {
        let transition = applications::match_application(conn, &user.actor(), application_id)?;
        notifications::materialize(conn, std::slice::from_ref(&transition.event))?;
        Ok(applications::load_company_view(
            conn,
            transition.application,
        )?)
    })?;

    tracing::info!(
        application_id = %view.id,
        job_id = %view.job_id,
        user_id = %user.user_id,
        "application matched"
    );
    Ok(Json(view))
}
