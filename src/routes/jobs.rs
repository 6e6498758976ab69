use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::access::CATALOG_MUTATION;
use crate::auth::StaffUser;
use crate::cascade::{DeletionPlan, DeletionRoot};
use crate::error::{AppError, AppResult};
use crate::models::{Company, Job, NewJob};
use crate::schema::{companies, jobs};
use crate::state::AppState;
use crate::utils::json::PartialUpdate;

use super::{like_pattern, Page, Paginated};

const DEFAULT_PAGE_SIZE: i64 = 10;

const EDITABLE_FIELDS: &[&str] = &[
    "title",
    "short_desc",
    "full_desc",
    "location",
    "profile_sought",
    "contract_type",
    "work_mode",
    "salary_min",
    "salary_max",
    "currency",
    "tags",
];

#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub q: Option<String>,
    pub company_id: Option<Uuid>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub short_desc: String,
    pub location: Option<String>,
    pub contract_type: Option<String>,
    pub work_mode: Option<String>,
    pub company_name: String,
    pub company_banner_url: Option<String>,
}

#[derive(Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    pub company_name: String,
    pub company_website: Option<String>,
    pub company_banner_url: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub company_id: Option<Uuid>,
    pub title: Option<String>,
    pub short_desc: Option<String>,
    pub full_desc: Option<String>,
    pub location: Option<String>,
    pub profile_sought: Option<String>,
    pub contract_type: Option<String>,
    pub work_mode: Option<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub currency: Option<String>,
    pub tags: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = jobs)]
struct JobChangeset {
    title: Option<String>,
    short_desc: Option<String>,
    full_desc: Option<Option<String>>,
    location: Option<Option<String>>,
    profile_sought: Option<Option<String>>,
    contract_type: Option<Option<String>>,
    work_mode: Option<Option<String>>,
    salary_min: Option<Option<i32>>,
    salary_max: Option<Option<i32>>,
    currency: Option<Option<String>>,
    tags: Option<Option<String>>,
    updated_at: NaiveDateTime,
}

impl JobChangeset {
    fn from_update(update: &PartialUpdate<'_>) -> Result<Self, String> {
        Ok(Self {
            title: update.required_string("title")?,
            short_desc: update.required_string("short_desc")?,
            full_desc: update.string("full_desc")?.into_change(),
            location: update.string("location")?.into_change(),
            profile_sought: update.string("profile_sought")?.into_change(),
            contract_type: update.string("contract_type")?.into_change(),
            work_mode: update.string("work_mode")?.into_change(),
            salary_min: update.int("salary_min")?.into_change(),
            salary_max: update.int("salary_max")?.into_change(),
            currency: update.string("currency")?.into_change(),
            tags: update.string("tags")?.into_change(),
            updated_at: Utc::now().naive_utc(),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> AppResult<Json<Paginated<JobSummary>>> {
    let page = Page::resolve(query.page, query.page_size, DEFAULT_PAGE_SIZE);
    let pattern = like_pattern(query.q.as_deref());
    let mut conn = state.db()?;

    let filtered = || {
        let mut q = jobs::table.inner_join(companies::table).into_boxed();
        if let Some(pattern) = &pattern {
            q = q.filter(
                jobs::title
                    .ilike(pattern.clone())
                    .or(jobs::short_desc.ilike(pattern.clone())),
            );
        }
        if let Some(company_id) = query.company_id {
            q = q.filter(jobs::company_id.eq(company_id));
        }
        q
    };

    let total: i64 = filtered().count().get_result(&mut conn)?;
    let rows: Vec<(Job, Company)> = filtered()
        .order((jobs::created_at.desc(), jobs::id.desc()))
        .limit(page.page_size)
        .offset(page.offset())
        .load(&mut conn)?;

    let items = rows
        .into_iter()
        .map(|(job, company)| JobSummary {
            id: job.id,
            company_id: job.company_id,
            title: job.title,
            short_desc: job.short_desc,
            location: job.location,
            contract_type: job.contract_type,
            work_mode: job.work_mode,
            company_name: company.name,
            company_banner_url: company.banner_url,
        })
        .collect();

    Ok(Json(Paginated::new(items, page, total)))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<JobDetail>> {
    let mut conn = state.db()?;
    let (job, company): (Job, Company) = jobs::table
        .inner_join(companies::table)
        .filter(jobs::id.eq(job_id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_msg("job not found"))?;

    Ok(Json(JobDetail {
        job,
        company_name: company.name,
        company_website: company.website,
        company_banner_url: company.banner_url,
    }))
}

pub async fn create_job(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<Job>)> {
    let (company_id, title, short_desc) = match (
        payload.company_id,
        non_blank(payload.title),
        non_blank(payload.short_desc),
    ) {
        (Some(company_id), Some(title), Some(short_desc)) => (company_id, title, short_desc),
        _ => {
            return Err(AppError::bad_request(
                "company_id, title and short_desc are required",
            ))
        }
    };

    let mut conn = state.db()?;
    let job = conn.transaction::<Job, AppError, _>(|conn| {
        let company: Company = companies::table
            .find(company_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_msg("company not found"))?;
        CATALOG_MUTATION
            .evaluate(&user.actor(), company.created_by)
            .ensure()?;

        let new_job = NewJob {
            id: Uuid::new_v4(),
            company_id,
            title,
            short_desc,
            full_desc: payload.full_desc,
            location: payload.location,
            profile_sought: payload.profile_sought,
            contract_type: payload.contract_type,
            work_mode: payload.work_mode,
            salary_min: payload.salary_min,
            salary_max: payload.salary_max,
            currency: payload.currency,
            tags: payload.tags,
        };
        Ok(diesel::insert_into(jobs::table)
            .values(&new_job)
            .get_result(conn)?)
    })?;

    tracing::info!(job_id = %job.id, company_id = %job.company_id, "job created");
    Ok((StatusCode::CREATED, Json(job)))
}

/// Loads a job's owning company id and checks the caller may mutate it.
fn authorize_job_mutation(
    conn: &mut PgConnection,
    user: &crate::auth::AuthenticatedUser,
    job_id: Uuid,
) -> AppResult<()> {
    let owner: Option<Uuid> = jobs::table
        .inner_join(companies::table)
        .filter(jobs::id.eq(job_id))
        .select(companies::created_by)
        .first::<Option<Uuid>>(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_msg("job not found"))?;
    CATALOG_MUTATION.evaluate(&user.actor(), owner).ensure()
}

pub async fn update_job(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Path(job_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<Job>> {
    let update = PartialUpdate::parse(&body, EDITABLE_FIELDS).map_err(AppError::bad_request)?;
    let changeset = JobChangeset::from_update(&update).map_err(AppError::bad_request)?;

    let mut conn = state.db()?;
    let job = conn.transaction::<Job, AppError, _>(|conn| {
        authorize_job_mutation(conn, &user, job_id)?;
        Ok(diesel::update(jobs::table.find(job_id))
            .set(&changeset)
            .get_result(conn)?)
    })?;

    Ok(Json(job))
}

pub async fn delete_job(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Path(job_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        authorize_job_mutation(conn, &user, job_id)?;
        DeletionPlan::for_root(DeletionRoot::Job(job_id)).execute(conn)?;
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}
