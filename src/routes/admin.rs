use std::collections::{BTreeSet, HashMap};

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

use crate::access::Role;
use crate::applications::{load_profiles_by_user, validate_status_edit};
use crate::auth::{password, AdminUser};
use crate::cascade::{DeletionPlan, DeletionRoot};
use crate::error::{AppError, AppResult};
use crate::models::{Application, Company, Job, User};
use crate::schema::{applications, companies, jobs, profiles, users};
use crate::state::AppState;
use crate::utils::json::PartialUpdate;
use crate::utils::time::{serialize_iso, serialize_iso_opt};

use super::auth::normalize_email;
use super::{like_pattern, Page, Paginated};

const LATEST_LIMIT: i64 = 5;
const DEFAULT_PAGE_SIZE: i64 = 20;

const APPLICATION_FIELDS: &[&str] = &["status", "message", "cv_url"];
const USER_FIELDS: &[&str] = &["email", "role", "password"];

#[derive(Serialize)]
pub struct Totals {
    pub total_users: i64,
    pub total_admins: i64,
    pub total_recruiters: i64,
    pub total_companies: i64,
    pub total_jobs: i64,
    pub total_applications: i64,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct CompanySummary {
    pub id: Uuid,
    pub name: String,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
}

#[derive(Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub title: String,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
    pub company_name: String,
}

#[derive(Serialize)]
pub struct ApplicationSummary {
    pub id: Uuid,
    pub job_id: Uuid,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
    pub status: String,
    pub candidate_email: Option<String>,
    pub job_title: String,
}

#[derive(Serialize)]
pub struct AdminStats {
    pub stats: Totals,
    pub latest_users: Vec<UserSummary>,
    pub latest_companies: Vec<CompanySummary>,
    pub latest_jobs: Vec<JobSummary>,
    pub latest_applications: Vec<ApplicationSummary>,
}

/// An application with candidate fields falling back to live profile and
/// account data when the snapshot is empty.
#[derive(Serialize)]
pub struct AdminApplicationView {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub company_id: Uuid,
    pub company_name: String,
    pub user_id: Option<Uuid>,
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
    pub candidate_phone: Option<String>,
    pub message: Option<String>,
    pub cv_url: Option<String>,
    pub status: String,
    #[serde(serialize_with = "serialize_iso_opt")]
    pub matched_at: Option<NaiveDateTime>,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationListQuery {
    pub q: Option<String>,
    pub job_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(AsChangeset)]
#[diesel(table_name = applications)]
struct ApplicationChangeset {
    status: Option<String>,
    message: Option<Option<String>>,
    cv_url: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = users)]
struct UserChangeset {
    email: Option<String>,
    role: Option<String>,
    password_hash: Option<String>,
    updated_at: NaiveDateTime,
}

pub async fn stats(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<AdminStats>> {
    let mut conn = state.db()?;
    let conn = &mut *conn;

    let stats = Totals {
        total_users: users::table.count().get_result(conn)?,
        total_admins: users::table
            .filter(users::role.eq(Role::Admin.as_str()))
            .count()
            .get_result(conn)?,
        total_recruiters: users::table
            .filter(users::role.eq(Role::Recruiter.as_str()))
            .count()
            .get_result(conn)?,
        total_companies: companies::table.count().get_result(conn)?,
        total_jobs: jobs::table.count().get_result(conn)?,
        total_applications: applications::table.count().get_result(conn)?,
    };

    let latest_users = users::table
        .order((users::created_at.desc(), users::id.desc()))
        .limit(LATEST_LIMIT)
        .load::<User>(conn)?
        .into_iter()
        .map(UserSummary::from)
        .collect();

    let latest_companies = companies::table
        .order((companies::created_at.desc(), companies::id.desc()))
        .limit(LATEST_LIMIT)
        .select((companies::id, companies::name, companies::created_at))
        .load::<(Uuid, String, NaiveDateTime)>(conn)?
        .into_iter()
        .map(|(id, name, created_at)| CompanySummary {
            id,
            name,
            created_at,
        })
        .collect();

    let latest_jobs = jobs::table
        .inner_join(companies::table)
        .order((jobs::created_at.desc(), jobs::id.desc()))
        .limit(LATEST_LIMIT)
        .select((jobs::id, jobs::title, jobs::created_at, companies::name))
        .load::<(Uuid, String, NaiveDateTime, String)>(conn)?
        .into_iter()
        .map(|(id, title, created_at, company_name)| JobSummary {
            id,
            title,
            created_at,
            company_name,
        })
        .collect();

    let latest_applications = applications::table
        .inner_join(jobs::table)
        .left_join(users::table)
        .order((applications::created_at.desc(), applications::id.desc()))
        .limit(LATEST_LIMIT)
        .select((
            applications::id,
            applications::job_id,
            applications::created_at,
            applications::status,
            applications::email,
            users::email.nullable(),
            jobs::title,
        ))
        .load::<(
            Uuid,
            Uuid,
            NaiveDateTime,
            String,
            Option<String>,
            Option<String>,
            String,
        )>(conn)?
        .into_iter()
        .map(
            |(id, job_id, created_at, status, snapshot_email, account_email, job_title)| {
                ApplicationSummary {
                    id,
                    job_id,
                    created_at,
                    status,
                    candidate_email: snapshot_email.or(account_email),
                    job_title,
                }
            },
        )
        .collect();

    Ok(Json(AdminStats {
        stats,
        latest_users,
        latest_companies,
        latest_jobs,
        latest_applications,
    }))
}

/// Application ids matching a free-text term on any candidate, job or
/// company field the admin list shows.
fn search_application_ids(conn: &mut PgConnection, pattern: &str) -> QueryResult<Vec<Uuid>> {
    let mut ids: BTreeSet<Uuid> = BTreeSet::new();

    ids.extend(
        applications::table
            .inner_join(jobs::table.inner_join(companies::table))
            .filter(
                applications::name
                    .ilike(pattern)
                    .or(applications::email.ilike(pattern))
                    .or(jobs::title.ilike(pattern))
                    .or(companies::name.ilike(pattern)),
            )
            .select(applications::id)
            .load::<Uuid>(conn)?,
    );

    let mut candidate_ids: Vec<Uuid> = users::table
        .filter(users::email.ilike(pattern))
        .select(users::id)
        .load(conn)?;
    candidate_ids.extend(
        profiles::table
            .filter(
                profiles::first_name
                    .ilike(pattern)
                    .or(profiles::last_name.ilike(pattern)),
            )
            .select(profiles::user_id)
            .load::<Option<Uuid>>(conn)?
            .into_iter()
            .flatten(),
    );
    if !candidate_ids.is_empty() {
        ids.extend(
            applications::table
                .filter(applications::user_id.eq_any(&candidate_ids))
                .select(applications::id)
                .load::<Uuid>(conn)?,
        );
    }

    Ok(ids.into_iter().collect())
}

fn build_admin_views(
    conn: &mut PgConnection,
    rows: Vec<(Application, (Job, Company))>,
) -> QueryResult<Vec<AdminApplicationView>> {
    let user_ids: Vec<Uuid> = rows.iter().filter_map(|(a, _)| a.user_id).collect();
    let profiles = load_profiles_by_user(conn, &user_ids)?;
    let emails: HashMap<Uuid, String> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        users::table
            .filter(users::id.eq_any(&user_ids))
            .select((users::id, users::email))
            .load::<(Uuid, String)>(conn)?
            .into_iter()
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|(application, (job, company))| {
            let profile = application.user_id.and_then(|id| profiles.get(&id));
            let account_email = application.user_id.and_then(|id| emails.get(&id).cloned());
            AdminApplicationView {
                id: application.id,
                job_id: application.job_id,
                job_title: job.title,
                company_id: company.id,
                company_name: company.name,
                user_id: application.user_id,
                candidate_name: application
                    .name
                    .or_else(|| profile.map(|p| p.full_name()).filter(|n| !n.is_empty())),
                candidate_email: application.email.or(account_email),
                candidate_phone: application
                    .phone
                    .or_else(|| profile.and_then(|p| p.phone.clone())),
                message: application.message,
                cv_url: application.cv_url,
                status: application.status,
                matched_at: application.matched_at,
                created_at: application.created_at,
            }
        })
        .collect())
}

pub async fn list_applications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<ApplicationListQuery>,
) -> AppResult<Json<Paginated<AdminApplicationView>>> {
    let page = Page::resolve(query.page, query.page_size, DEFAULT_PAGE_SIZE);
    let mut conn = state.db()?;

    let matching_ids = match like_pattern(query.q.as_deref()) {
        Some(pattern) => Some(search_application_ids(&mut conn, &pattern)?),
        None => None,
    };

    let filtered = || {
        let mut q = applications::table
            .inner_join(jobs::table.inner_join(companies::table))
            .into_boxed();
        if let Some(job_id) = query.job_id {
            q = q.filter(applications::job_id.eq(job_id));
        }
        if let Some(company_id) = query.company_id {
            q = q.filter(jobs::company_id.eq(company_id));
        }
        if let Some(ids) = &matching_ids {
            q = q.filter(applications::id.eq_any(ids.clone()));
        }
        q
    };

    let total: i64 = filtered().count().get_result(&mut conn)?;
    let rows: Vec<(Application, (Job, Company))> = filtered()
        .order((applications::created_at.desc(), applications::id.desc()))
        .limit(page.page_size)
        .offset(page.offset())
        .load(&mut conn)?;

    let items = build_admin_views(&mut conn, rows)?;
    Ok(Json(Paginated::new(items, page, total)))
}

fn load_admin_view(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> AppResult<AdminApplicationView> {
    let row: (Application, (Job, Company)) = applications::table
        .inner_join(jobs::table.inner_join(companies::table))
        .filter(applications::id.eq(application_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_msg("application not found"))?;
    build_admin_views(conn, vec![row])?
        .pop()
        .ok_or_else(|| AppError::not_found_msg("application not found"))
}

pub async fn get_application(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(application_id): Path<Uuid>,
) -> AppResult<Json<AdminApplicationView>> {
    let mut conn = state.db()?;
    Ok(Json(load_admin_view(&mut conn, application_id)?))
}

pub async fn update_application(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(application_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<AdminApplicationView>> {
    let update = PartialUpdate::parse(&body, APPLICATION_FIELDS).map_err(AppError::bad_request)?;
    let changeset = ApplicationChangeset {
        status: update
            .required_string("status")
            .map_err(AppError::bad_request)?,
        message: update
            .string("message")
            .map_err(AppError::bad_request)?
            .into_change(),
        cv_url: update
            .string("cv_url")
            .map_err(AppError::bad_request)?
            .into_change(),
    };

    let mut conn = state.db()?;
    let view = conn.transaction::<_, AppError, _>(|conn| {
        let current: String = applications::table
            .find(application_id)
            .select(applications::status)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_msg("application not found"))?;
        if let Some(requested) = changeset.status.as_deref() {
            validate_status_edit(&current, requested).map_err(AppError::conflict)?;
        }

        diesel::update(applications::table.find(application_id))
            .set(&changeset)
            .execute(conn)?;
        load_admin_view(conn, application_id)
    })?;

    tracing::info!(application_id = %application_id, admin_id = %admin.user_id, "application edited");
    Ok(Json(view))
}

pub async fn delete_application(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(application_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        let report =
            DeletionPlan::for_root(DeletionRoot::Application(application_id)).execute(conn)?;
        if !report.root_removed {
            return Err(AppError::not_found_msg("application not found"));
        }
        Ok(())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<UserSummary>> {
    let update = PartialUpdate::parse(&body, USER_FIELDS).map_err(AppError::bad_request)?;

    let email = update
        .required_string("email")
        .map_err(AppError::bad_request)?
        .map(|email| normalize_email(&email));
    let role = match update.required_string("role").map_err(AppError::bad_request)? {
        Some(raw) => Some(
            raw.parse::<Role>()
                .map_err(|_| AppError::bad_request("invalid role"))?,
        ),
        None => None,
    };
    let password_hash = match update
        .required_string("password")
        .map_err(AppError::bad_request)?
    {
        Some(plain) => Some(password::hash_password(&plain)?),
        None => None,
    };

    let changeset = UserChangeset {
        email,
        role: role.map(|r| r.as_str().to_string()),
        password_hash,
        updated_at: Utc::now().naive_utc(),
    };

    let mut conn = state.db()?;
    let user = conn.transaction::<User, AppError, _>(|conn| {
        if let Some(email) = changeset.email.as_deref() {
            let taken: Option<Uuid> = users::table
                .filter(users::email.eq(email))
                .filter(users::id.ne(user_id))
                .select(users::id)
                .first(conn)
                .optional()?;
            if taken.is_some() {
                return Err(AppError::conflict("email already exists"));
            }
        }

        diesel::update(users::table.find(user_id))
            .set(&changeset)
            .get_result::<User>(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_msg("user not found"))
    })?;

    tracing::info!(user_id = %user.id, role = %user.role, "user updated by admin");
    Ok(Json(UserSummary::from(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        let report = DeletionPlan::for_root(DeletionRoot::User(user_id)).execute(conn)?;
        if !report.root_removed {
            return Err(AppError::not_found_msg("user not found"));
        }
        Ok(())
    })?;

    tracing::info!(user_id = %user_id, admin_id = %admin.user_id, "user deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}
