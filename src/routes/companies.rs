use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::access::CATALOG_MUTATION;
use crate::auth::StaffUser;
use crate::cascade::{DeletionPlan, DeletionRoot};
use crate::error::{AppError, AppResult};
use crate::models::{Company, NewCompany};
use crate::schema::companies;
use crate::state::AppState;
use crate::utils::json::PartialUpdate;

use super::Items;

const COMPANY_LIST_LIMIT: i64 = 50;

const EDITABLE_FIELDS: &[&str] = &[
    "name",
    "hq_city",
    "sector",
    "description",
    "website",
    "social_links",
    "headcount",
    "banner_url",
];

#[derive(Deserialize)]
pub struct CreateCompanyRequest {
    pub name: Option<String>,
    pub hq_city: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub social_links: Option<String>,
    pub headcount: Option<i32>,
    pub banner_url: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = companies)]
struct CompanyChangeset {
    name: Option<String>,
    hq_city: Option<Option<String>>,
    sector: Option<Option<String>>,
    description: Option<Option<String>>,
    website: Option<Option<String>>,
    social_links: Option<Option<String>>,
    headcount: Option<Option<i32>>,
    banner_url: Option<Option<String>>,
    updated_at: NaiveDateTime,
}

impl CompanyChangeset {
    fn from_update(update: &PartialUpdate<'_>) -> Result<Self, String> {
        Ok(Self {
            name: update.required_string("name")?,
            hq_city: update.string("hq_city")?.into_change(),
            sector: update.string("sector")?.into_change(),
            description: update.string("description")?.into_change(),
            website: update.string("website")?.into_change(),
            social_links: update.string("social_links")?.into_change(),
            headcount: update.int("headcount")?.into_change(),
            banner_url: update.string("banner_url")?.into_change(),
            updated_at: Utc::now().naive_utc(),
        })
    }
}

pub async fn list_companies(State(state): State<AppState>) -> AppResult<Json<Items<Company>>> {
    let mut conn = state.db()?;
    let items: Vec<Company> = companies::table
        .order((companies::created_at.desc(), companies::id.desc()))
        .limit(COMPANY_LIST_LIMIT)
        .load(&mut conn)?;
    Ok(Json(Items { items }))
}

pub async fn create_company(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Json(payload): Json<CreateCompanyRequest>,
) -> AppResult<(StatusCode, Json<Company>)> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::bad_request("name is required"))?;

    let new_company = NewCompany {
        id: Uuid::new_v4(),
        name: name.to_string(),
        hq_city: payload.hq_city,
        sector: payload.sector,
        description: payload.description,
        website: payload.website,
        social_links: payload.social_links,
        headcount: payload.headcount,
        banner_url: payload.banner_url,
        created_by: Some(user.user_id),
    };

    let mut conn = state.db()?;
    let company: Company = diesel::insert_into(companies::table)
        .values(&new_company)
        .get_result(&mut conn)?;

    tracing::info!(company_id = %company.id, user_id = %user.user_id, "company created");
    Ok((StatusCode::CREATED, Json(company)))
}

/// The caller's most recently created company, or `null`.
pub async fn my_company(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
) -> AppResult<Json<Option<Company>>> {
    let mut conn = state.db()?;
    let company = companies::table
        .filter(companies::created_by.eq(user.user_id))
        .order((companies::created_at.desc(), companies::id.desc()))
        .first::<Company>(&mut conn)
        .optional()?;
    Ok(Json(company))
}

pub async fn get_company(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Company>> {
    let mut conn = state.db()?;
    let company: Company = companies::table
        .find(company_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_msg("company not found"))?;
    Ok(Json(company))
}

pub async fn update_company(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Path(company_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<Company>> {
    let update = PartialUpdate::parse(&body, EDITABLE_FIELDS).map_err(AppError::bad_request)?;
    let changeset = CompanyChangeset::from_update(&update).map_err(AppError::bad_request)?;

    let mut conn = state.db()?;
    let company = conn.transaction::<Company, AppError, _>(|conn| {
        let existing: Company = companies::table
            .find(company_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_msg("company not found"))?;
        CATALOG_MUTATION
            .evaluate(&user.actor(), existing.created_by)
            .ensure()?;

        Ok(diesel::update(companies::table.find(company_id))
            .set(&changeset)
            .get_result(conn)?)
    })?;

    Ok(Json(company))
}

pub async fn delete_company(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        let existing: Company = companies::table
            .find(company_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_msg("company not found"))?;
        CATALOG_MUTATION
            .evaluate(&user.actor(), existing.created_by)
            .ensure()?;

        DeletionPlan::for_root(DeletionRoot::Company(company_id)).execute(conn)?;
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}
