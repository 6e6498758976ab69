//! Application lifecycle: who may apply, the `new -> matched` transition, and
//! the read models shown to candidates and companies.
//!
//! Operations here only touch the `applications` table and report what
//! happened as [`LifecycleEvent`]s. Turning events into notification rows is
//! the caller's job (see [`crate::notifications::materialize`]), inside the
//! same transaction.

use chrono::{NaiveDateTime, Utc};
use diesel::{dsl::exists, prelude::*, result::DatabaseErrorKind, select, PgConnection};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::access::{Actor, APPLICATION_MATCH};
use crate::models::{Application, Company, Job, NewApplication, Profile};
use crate::schema::{applications, companies, jobs, profiles};
use crate::utils::time::serialize_iso_opt;

pub const STATUS_NEW: &str = "new";
pub const STATUS_MATCHED: &str = "matched";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("job not found")]
    JobNotFound,
    #[error("application not found")]
    ApplicationNotFound,
    #[error("application already exists")]
    AlreadyApplied,
    #[error("profile required before applying")]
    ProfileRequired,
    #[error("profile is missing contact email or CV")]
    IncompleteProfile,
    #[error("application belongs to another company")]
    NotCompanyOwner,
    #[error("application already matched")]
    AlreadyMatched,
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Something that happened to an application and that other parties may
/// need to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Submitted {
        application_id: Uuid,
        job_id: Uuid,
        job_title: String,
        candidate_label: String,
        company_owner_id: Option<Uuid>,
    },
    Matched {
        application_id: Uuid,
        job_id: Uuid,
        job_title: String,
        candidate_label: String,
        candidate_user_id: Option<Uuid>,
        company_owner_id: Option<Uuid>,
    },
}

#[derive(Debug)]
pub struct Transition {
    pub application: Application,
    pub event: LifecycleEvent,
}

/// A profile can back an application only with both a contact email and a CV.
pub fn profile_is_complete(contact_email: Option<&str>, cv_url: Option<&str>) -> bool {
    let present = |value: Option<&str>| value.map(|v| !v.trim().is_empty()).unwrap_or(false);
    present(contact_email) && present(cv_url)
}

/// Name shown to the company: the candidate's full name, or their contact
/// email when both name parts are blank.
pub fn candidate_label(full_name: &str, contact_email: Option<&str>) -> String {
    let name = full_name.trim();
    if name.is_empty() {
        contact_email.unwrap_or_default().trim().to_string()
    } else {
        name.to_string()
    }
}

pub fn submit_application(
    conn: &mut PgConnection,
    candidate_id: Uuid,
    job_id: Uuid,
    message: Option<String>,
) -> LifecycleResult<Transition> {
    let (job, company): (Job, Company) = jobs::table
        .inner_join(companies::table)
        .filter(jobs::id.eq(job_id))
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::JobNotFound)?;

    // Fast path only; the unique index on (job_id, user_id) is authoritative.
    let already_applied: bool = select(exists(
        applications::table
            .filter(applications::job_id.eq(job.id))
            .filter(applications::user_id.eq(candidate_id)),
    ))
    .get_result(conn)?;
    if already_applied {
        return Err(LifecycleError::AlreadyApplied);
    }

    let profile: Profile = profiles::table
        .filter(profiles::user_id.eq(candidate_id))
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::ProfileRequired)?;
    if !profile_is_complete(profile.contact_email.as_deref(), profile.cv_url.as_deref()) {
        return Err(LifecycleError::IncompleteProfile);
    }

    let full_name = profile.full_name();
    let new_application = NewApplication {
        id: Uuid::new_v4(),
        job_id: job.id,
        user_id: Some(candidate_id),
        name: (!full_name.is_empty()).then(|| full_name.clone()),
        email: profile.contact_email.clone(),
        phone: profile.phone.clone(),
        message: message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty()),
        cv_url: profile.cv_url.clone(),
        status: STATUS_NEW.to_string(),
    };

    let application: Application = match diesel::insert_into(applications::table)
        .values(&new_application)
        .get_result(conn)
    {
        Ok(application) => application,
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(LifecycleError::AlreadyApplied);
        }
        Err(err) => return Err(LifecycleError::from(err)),
    };

    let event = LifecycleEvent::Submitted {
        application_id: application.id,
        job_id: job.id,
        job_title: job.title,
        candidate_label: candidate_label(&full_name, profile.contact_email.as_deref()),
        company_owner_id: company.created_by,
    };

    Ok(Transition { application, event })
}

pub fn match_application(
    conn: &mut PgConnection,
    actor: &Actor,
    application_id: Uuid,
) -> LifecycleResult<Transition> {
    let (application, (job, company)): (Application, (Job, Company)) = applications::table
        .inner_join(jobs::table.inner_join(companies::table))
        .filter(applications::id.eq(application_id))
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::ApplicationNotFound)?;

    if !APPLICATION_MATCH
        .evaluate(actor, company.created_by)
        .is_allowed()
    {
        return Err(LifecycleError::NotCompanyOwner);
    }
    if application.status == STATUS_MATCHED {
        return Err(LifecycleError::AlreadyMatched);
    }

    // The status guard makes a concurrent second match update zero rows.
    let now = Utc::now().naive_utc();
    let updated: Application = diesel::update(
        applications::table
            .filter(applications::id.eq(application.id))
            .filter(applications::status.ne(STATUS_MATCHED)),
    )
    .set((
        applications::status.eq(STATUS_MATCHED),
        applications::matched_at.eq(now),
    ))
    .get_result(conn)
    .optional()?
    .ok_or(LifecycleError::AlreadyMatched)?;

    let full_name = updated.name.clone().unwrap_or_default();
    let event = LifecycleEvent::Matched {
        application_id: updated.id,
        job_id: job.id,
        job_title: job.title,
        candidate_label: candidate_label(&full_name, updated.email.as_deref()),
        candidate_user_id: updated.user_id,
        company_owner_id: company.created_by,
    };

    Ok(Transition {
        application: updated,
        event,
    })
}

/// Admin edits may retag a pending application but never enter or leave
/// `matched`: that transition belongs to [`match_application`].
pub fn validate_status_edit(current: &str, requested: &str) -> Result<(), &'static str> {
    if requested.trim().is_empty() {
        return Err("status cannot be empty");
    }
    if current == STATUS_MATCHED && requested != STATUS_MATCHED {
        return Err("matched applications cannot change status");
    }
    if current != STATUS_MATCHED && requested == STATUS_MATCHED {
        return Err("use the match operation to match an application");
    }
    Ok(())
}

pub fn contact_visible(status: &str) -> bool {
    status == STATUS_MATCHED
}

/// An application as its candidate sees it.
#[derive(Debug, Serialize)]
pub struct CandidateApplicationView {
    pub id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    #[serde(serialize_with = "serialize_iso_opt")]
    pub matched_at: Option<NaiveDateTime>,
    pub created_at: String,
    pub job_title: String,
    pub job_location: Option<String>,
    pub contract_type: Option<String>,
    pub company_name: String,
}

impl CandidateApplicationView {
    pub fn new(application: Application, job: Job, company: Company) -> Self {
        Self {
            id: application.id,
            job_id: application.job_id,
            status: application.status,
            matched_at: application.matched_at,
            created_at: crate::utils::time::to_iso(application.created_at),
            job_title: job.title,
            job_location: job.location,
            contract_type: job.contract_type,
            company_name: company.name,
        }
    }
}

pub fn load_candidate_view(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> QueryResult<CandidateApplicationView> {
    let (application, (job, company)): (Application, (Job, Company)) = applications::table
        .inner_join(jobs::table.inner_join(companies::table))
        .filter(applications::id.eq(application_id))
        .first(conn)?;
    Ok(CandidateApplicationView::new(application, job, company))
}

pub fn list_for_candidate(
    conn: &mut PgConnection,
    candidate_id: Uuid,
) -> QueryResult<Vec<CandidateApplicationView>> {
    let rows: Vec<(Application, (Job, Company))> = applications::table
        .inner_join(jobs::table.inner_join(companies::table))
        .filter(applications::user_id.eq(candidate_id))
        .order((applications::created_at.desc(), applications::id.desc()))
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(application, (job, company))| CandidateApplicationView::new(application, job, company))
        .collect())
}

/// An application as the owning company sees it. Contact fields stay hidden
/// until the application is matched.
#[derive(Debug, Serialize)]
pub struct CompanyApplicationView {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub company_id: Uuid,
    pub status: String,
    #[serde(serialize_with = "serialize_iso_opt")]
    pub matched_at: Option<NaiveDateTime>,
    pub created_at: String,
    pub message: Option<String>,
    pub candidate_name: Option<String>,
    pub profile_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub job_target: Option<String>,
    pub skills: Option<String>,
    pub motivation: Option<String>,
    pub avatar_url: Option<String>,
    pub cv_url: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl CompanyApplicationView {
    pub fn new(application: Application, job: &Job, profile: Option<&Profile>) -> Self {
        let visible = contact_visible(&application.status);
        let candidate_name = profile
            .map(Profile::full_name)
            .filter(|name| !name.is_empty())
            .or_else(|| application.name.clone());
        Self {
            id: application.id,
            job_id: application.job_id,
            job_title: job.title.clone(),
            company_id: job.company_id,
            status: application.status,
            matched_at: application.matched_at,
            created_at: crate::utils::time::to_iso(application.created_at),
            message: application.message,
            candidate_name,
            profile_id: profile.map(|p| p.id),
            first_name: profile.map(|p| p.first_name.clone()),
            last_name: profile.map(|p| p.last_name.clone()),
            city: profile.and_then(|p| p.city.clone()),
            job_target: profile.and_then(|p| p.job_target.clone()),
            skills: profile.and_then(|p| p.skills.clone()),
            motivation: profile.and_then(|p| p.motivation.clone()),
            avatar_url: profile.and_then(|p| p.avatar_url.clone()),
            cv_url: profile
                .and_then(|p| p.cv_url.clone())
                .or_else(|| application.cv_url.clone()),
            contact_email: if visible {
                profile
                    .and_then(|p| p.contact_email.clone())
                    .or(application.email)
            } else {
                None
            },
            contact_phone: if visible {
                profile.and_then(|p| p.phone.clone()).or(application.phone)
            } else {
                None
            },
        }
    }
}

pub fn list_for_company_owner(
    conn: &mut PgConnection,
    owner_id: Uuid,
    job_id: Option<Uuid>,
) -> QueryResult<Vec<CompanyApplicationView>> {
    let mut query = applications::table
        .inner_join(jobs::table.inner_join(companies::table))
        .filter(companies::created_by.eq(owner_id))
        .order((applications::created_at.desc(), applications::id.desc()))
        .into_boxed();
    if let Some(job_id) = job_id {
        query = query.filter(jobs::id.eq(job_id));
    }
    let rows: Vec<(Application, (Job, Company))> = query.load(conn)?;

    let candidate_ids: Vec<Uuid> = rows.iter().filter_map(|(a, _)| a.user_id).collect();
    let profiles = load_profiles_by_user(conn, &candidate_ids)?;

    Ok(rows
        .into_iter()
        .map(|(application, (job, _company))| {
            let profile = application.user_id.and_then(|id| profiles.get(&id));
            CompanyApplicationView::new(application, &job, profile)
        })
        .collect())
}

pub fn load_company_view(
    conn: &mut PgConnection,
    application: Application,
) -> QueryResult<CompanyApplicationView> {
    let job: Job = jobs::table.find(application.job_id).first(conn)?;
    let profile: Option<Profile> = match application.user_id {
        Some(user_id) => profiles::table
            .filter(profiles::user_id.eq(user_id))
            .first(conn)
            .optional()?,
        None => None,
    };
    Ok(CompanyApplicationView::new(application, &job, profile.as_ref()))
}

pub(crate) fn load_profiles_by_user(
    conn: &mut PgConnection,
    user_ids: &[Uuid],
) -> QueryResult<std::collections::HashMap<Uuid, Profile>> {
    if user_ids.is_empty() {
        return Ok(Default::default());
    }
    let rows: Vec<Profile> = profiles::table
        .filter(profiles::user_id.eq_any(user_ids))
        .load(conn)?;
    Ok(rows
        .into_iter()
        .filter_map(|profile| profile.user_id.map(|id| (id, profile)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_needs_email_and_cv() {
        assert!(profile_is_complete(Some("a@x.com"), Some("cv1")));
        assert!(!profile_is_complete(None, Some("cv1")));
        assert!(!profile_is_complete(Some("a@x.com"), None));
        assert!(!profile_is_complete(Some("  "), Some("cv1")));
        assert!(!profile_is_complete(Some("a@x.com"), Some("")));
    }

    #[test]
    fn candidate_label_falls_back_to_email() {
        assert_eq!(candidate_label("Ada Lovelace", Some("a@x.com")), "Ada Lovelace");
        assert_eq!(candidate_label("  ", Some("a@x.com")), "a@x.com");
        assert_eq!(candidate_label("", None), "");
    }

    #[test]
    fn status_edits_cannot_touch_matched() {
        assert!(validate_status_edit(STATUS_NEW, "reviewing").is_ok());
        assert!(validate_status_edit(STATUS_NEW, STATUS_MATCHED).is_err());
        assert!(validate_status_edit(STATUS_MATCHED, STATUS_NEW).is_err());
        assert!(validate_status_edit(STATUS_MATCHED, STATUS_MATCHED).is_ok());
        assert!(validate_status_edit(STATUS_NEW, " ").is_err());
    }

    #[test]
    fn contact_is_hidden_until_matched() {
        assert!(!contact_visible(STATUS_NEW));
        assert!(!contact_visible("reviewing"));
        assert!(contact_visible(STATUS_MATCHED));
    }
}
