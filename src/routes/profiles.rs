use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::{prelude::*, result::DatabaseErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::access::{PROFILE_CONTACT, PROFILE_MUTATION};
use crate::auth::AuthenticatedUser;
use crate::cascade::{DeletionPlan, DeletionRoot};
use crate::error::{AppError, AppResult};
use crate::models::{NewProfile, Profile, User};
use crate::schema::{profiles, users};
use crate::state::AppState;
use crate::utils::json::PartialUpdate;

use super::{like_pattern, Page, Paginated};

const DEFAULT_PAGE_SIZE: i64 = 10;

const EDITABLE_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "date_birth",
    "city",
    "phone",
    "diplomas",
    "experiences",
    "skills",
    "languages",
    "qualities",
    "interests",
    "job_target",
    "motivation",
    "links",
    "avatar_url",
    "contact_email",
    "cv_url",
];

#[derive(Debug, Default, Deserialize)]
pub struct ProfileListQuery {
    pub q: Option<String>,
    pub city: Option<String>,
    pub skills: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Serialize)]
pub struct ProfileListItem {
    #[serde(flatten)]
    pub profile: Profile,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub contact_email: Option<String>,
    pub cv_url: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = profiles)]
struct ProfileChangeset {
    first_name: Option<String>,
    last_name: Option<String>,
    date_birth: Option<Option<NaiveDate>>,
    city: Option<Option<String>>,
    phone: Option<Option<String>>,
    diplomas: Option<Option<String>>,
    experiences: Option<Option<String>>,
    skills: Option<Option<String>>,
    languages: Option<Option<String>>,
    qualities: Option<Option<String>>,
    interests: Option<Option<String>>,
    job_target: Option<Option<String>>,
    motivation: Option<Option<String>>,
    links: Option<Option<String>>,
    avatar_url: Option<Option<String>>,
    contact_email: Option<Option<String>>,
    cv_url: Option<Option<String>>,
    updated_at: NaiveDateTime,
}

impl ProfileChangeset {
    fn from_update(update: &PartialUpdate<'_>) -> Result<Self, String> {
        Ok(Self {
            first_name: update.required_string("first_name")?,
            last_name: update.required_string("last_name")?,
            date_birth: update.date("date_birth")?.into_change(),
            city: update.string("city")?.into_change(),
            phone: update.string("phone")?.into_change(),
            diplomas: update.string("diplomas")?.into_change(),
            experiences: update.string("experiences")?.into_change(),
            skills: update.string("skills")?.into_change(),
            languages: update.string("languages")?.into_change(),
            qualities: update.string("qualities")?.into_change(),
            interests: update.string("interests")?.into_change(),
            job_target: update.string("job_target")?.into_change(),
            motivation: update.string("motivation")?.into_change(),
            links: update.string("links")?.into_change(),
            avatar_url: update.string("avatar_url")?.into_change(),
            contact_email: update.string("contact_email")?.into_change(),
            cv_url: update.string("cv_url")?.into_change(),
            updated_at: Utc::now().naive_utc(),
        })
    }
}

pub async fn list_profiles(
    State(state): State<AppState>,
    caller: Option<AuthenticatedUser>,
    Query(query): Query<ProfileListQuery>,
) -> AppResult<Json<Paginated<ProfileListItem>>> {
    let page = Page::resolve(query.page, query.page_size, DEFAULT_PAGE_SIZE);
    let name_pattern = like_pattern(query.q.as_deref());
    let skills_pattern = like_pattern(query.skills.as_deref());
    let city = query
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let mut conn = state.db()?;

    let filtered = || {
        let mut q = profiles::table.left_join(users::table).into_boxed();
        if let Some(pattern) = &name_pattern {
            q = q.filter(
                profiles::first_name
                    .ilike(pattern.clone())
                    .or(profiles::last_name.ilike(pattern.clone())),
            );
        }
        if let Some(city) = &city {
            q = q.filter(profiles::city.eq(city.clone()));
        }
        if let Some(pattern) = &skills_pattern {
            q = q.filter(profiles::skills.ilike(pattern.clone()));
        }
        q
    };

    let total: i64 = filtered().count().get_result(&mut conn)?;
    let rows: Vec<(Profile, Option<User>)> = filtered()
        .order((profiles::created_at.desc(), profiles::id.desc()))
        .limit(page.page_size)
        .offset(page.offset())
        .load(&mut conn)?;

    let items = rows
        .into_iter()
        .map(|(profile, user)| {
            let visible = contact_visible_to(caller.as_ref(), profile.user_id);
            let (email, role) = match user {
                Some(user) => (visible.then_some(user.email), Some(user.role)),
                None => (None, None),
            };
            ProfileListItem {
                profile: if visible {
                    profile
                } else {
                    without_contact(profile)
                },
                email,
                role,
            }
        })
        .collect();

    Ok(Json(Paginated::new(items, page, total)))
}

pub async fn create_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateProfileRequest>,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let first_name = payload.first_name.as_deref().map(str::trim).unwrap_or("");
    let last_name = payload.last_name.as_deref().map(str::trim).unwrap_or("");
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AppError::bad_request(
            "first_name and last_name are required",
        ));
    }

    let new_profile = NewProfile {
        id: Uuid::new_v4(),
        user_id: Some(user.user_id),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        city: payload.city,
        contact_email: payload.contact_email,
        cv_url: payload.cv_url,
    };

    let mut conn = state.db()?;
    let profile: Profile = match diesel::insert_into(profiles::table)
        .values(&new_profile)
        .get_result(&mut conn)
    {
        Ok(profile) => profile,
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("profile already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    tracing::info!(profile_id = %profile.id, user_id = %user.user_id, "profile created");
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn my_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Option<Profile>>> {
    let mut conn = state.db()?;
    let profile = profiles::table
        .filter(profiles::user_id.eq(user.user_id))
        .first::<Profile>(&mut conn)
        .optional()?;
    Ok(Json(profile))
}

pub async fn get_profile(
    State(state): State<AppState>,
    caller: Option<AuthenticatedUser>,
    Path(profile_id): Path<Uuid>,
) -> AppResult<Json<Profile>> {
    let mut conn = state.db()?;
    let profile = load_profile(&mut conn, profile_id)?;
    if contact_visible_to(caller.as_ref(), profile.user_id) {
        Ok(Json(profile))
    } else {
        Ok(Json(without_contact(profile)))
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(profile_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<Profile>> {
    let update = PartialUpdate::parse(&body, EDITABLE_FIELDS).map_err(AppError::bad_request)?;
    let changeset = ProfileChangeset::from_update(&update).map_err(AppError::bad_request)?;

    let mut conn = state.db()?;
    let profile = conn.transaction::<Profile, AppError, _>(|conn| {
        let existing = load_profile(conn, profile_id)?;
        PROFILE_MUTATION
            .evaluate(&user.actor(), existing.user_id)
            .ensure()?;
        Ok(diesel::update(profiles::table.find(profile_id))
            .set(&changeset)
            .get_result(conn)?)
    })?;

    Ok(Json(profile))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(profile_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        let existing = load_profile(conn, profile_id)?;
        PROFILE_MUTATION
            .evaluate(&user.actor(), existing.user_id)
            .ensure()?;
        DeletionPlan::for_root(DeletionRoot::Profile {
            profile_id,
            user_id: existing.user_id,
        })
        .execute(conn)?;
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Anonymous callers and other accounts get the profile without its
/// contact fields; companies learn them through a match.
fn contact_visible_to(caller: Option<&AuthenticatedUser>, owner_id: Option<Uuid>) -> bool {
    caller.is_some_and(|user| {
        PROFILE_CONTACT
            .evaluate(&user.actor(), owner_id)
            .is_allowed()
    })
}

fn without_contact(mut profile: Profile) -> Profile {
    profile.contact_email = None;
    profile.phone = None;
    profile
}

fn load_profile(conn: &mut PgConnection, profile_id: Uuid) -> AppResult<Profile> {
    profiles::table
        .find(profile_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_msg("profile not found"))
}
