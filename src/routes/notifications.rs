use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::notifications::{self, NotificationView};
use crate::state::AppState;

use super::Items;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default, deserialize_with = "crate::utils::query::deserialize_flag")]
    pub only_unread: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<usize>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<NotificationListQuery>,
) -> AppResult<Json<Items<NotificationView>>> {
    let limit = notifications::clamp_limit(query.limit);
    let mut conn = state.db()?;
    let items = notifications::list_for_recipient(
        &mut conn,
        user.user_id,
        query.only_unread.unwrap_or(false),
        limit,
    )?;
    Ok(Json(Items { items }))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<MarkReadResponse>> {
    let mut conn = state.db()?;
    notifications::mark_read(&mut conn, notification_id, user.user_id)?;
    Ok(Json(MarkReadResponse {
        ok: true,
        updated: None,
    }))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<MarkReadResponse>> {
    let mut conn = state.db()?;
    let updated = notifications::mark_all_read(&mut conn, user.user_id)?;
    Ok(Json(MarkReadResponse {
        ok: true,
        updated: Some(updated),
    }))
}
