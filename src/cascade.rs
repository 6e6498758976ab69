//! Dependency-ordered deletion plans.
//!
//! Every delete of a user, profile, company, job or application goes through
//! a [`DeletionPlan`]: a fixed list of steps that removes dependents before
//! the rows they hang off, ending with the root itself. Foreign-key cascades
//! exist in the schema as a backstop only.

use diesel::{prelude::*, PgConnection};
use uuid::Uuid;

use crate::schema::{applications, companies, jobs, notifications, profiles, users};

/// Entity kinds ordered by dependency depth. A plan never deletes a kind
/// after a kind that ranks above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Entity {
    Notification,
    Application,
    Job,
    Company,
    Profile,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionRoot {
    User(Uuid),
    Profile {
        profile_id: Uuid,
        user_id: Option<Uuid>,
    },
    Company(Uuid),
    Job(Uuid),
    Application(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStep {
    /// Notifications pointing at applications the user submitted.
    NotificationsForUserApplications(Uuid),
    NotificationsForRecipient(Uuid),
    /// Notifications pointing at jobs, or applications to jobs, of every
    /// company the user owns.
    NotificationsForOwnedCompanies(Uuid),
    NotificationsForCompany(Uuid),
    NotificationsForJob(Uuid),
    NotificationsForApplication(Uuid),
    ApplicationsOfUser(Uuid),
    ApplicationsForOwnedCompanies(Uuid),
    ApplicationsForCompany(Uuid),
    ApplicationsForJob(Uuid),
    Application(Uuid),
    JobsOfOwnedCompanies(Uuid),
    JobsOfCompany(Uuid),
    Job(Uuid),
    CompaniesOwnedBy(Uuid),
    Company(Uuid),
    ProfileOfUser(Uuid),
    Profile(Uuid),
    User(Uuid),
}

impl DeletionStep {
    pub fn entity(&self) -> Entity {
        use DeletionStep::*;
        match self {
            NotificationsForUserApplications(_)
            | NotificationsForRecipient(_)
            | NotificationsForOwnedCompanies(_)
            | NotificationsForCompany(_)
            | NotificationsForJob(_)
            | NotificationsForApplication(_) => Entity::Notification,
            ApplicationsOfUser(_)
            | ApplicationsForOwnedCompanies(_)
            | ApplicationsForCompany(_)
            | ApplicationsForJob(_)
            | Application(_) => Entity::Application,
            JobsOfOwnedCompanies(_) | JobsOfCompany(_) | Job(_) => Entity::Job,
            CompaniesOwnedBy(_) | Company(_) => Entity::Company,
            ProfileOfUser(_) | Profile(_) => Entity::Profile,
            User(_) => Entity::User,
        }
    }

    fn label(&self) -> &'static str {
        use DeletionStep::*;
        match self {
            NotificationsForUserApplications(_) => "notifications_for_user_applications",
            NotificationsForRecipient(_) => "notifications_for_recipient",
            NotificationsForOwnedCompanies(_) => "notifications_for_owned_companies",
            NotificationsForCompany(_) => "notifications_for_company",
            NotificationsForJob(_) => "notifications_for_job",
            NotificationsForApplication(_) => "notifications_for_application",
            ApplicationsOfUser(_) => "applications_of_user",
            ApplicationsForOwnedCompanies(_) => "applications_for_owned_companies",
            ApplicationsForCompany(_) => "applications_for_company",
            ApplicationsForJob(_) => "applications_for_job",
            Application(_) => "application",
            JobsOfOwnedCompanies(_) => "jobs_of_owned_companies",
            JobsOfCompany(_) => "jobs_of_company",
            Job(_) => "job",
            CompaniesOwnedBy(_) => "companies_owned_by",
            Company(_) => "company",
            ProfileOfUser(_) => "profile_of_user",
            Profile(_) => "profile",
            User(_) => "user",
        }
    }

    fn execute(&self, conn: &mut PgConnection) -> QueryResult<usize> {
        use DeletionStep::*;
        match *self {
            NotificationsForUserApplications(user_id) => {
                let application_ids: Vec<Uuid> = applications::table
                    .filter(applications::user_id.eq(user_id))
                    .select(applications::id)
                    .load(conn)?;
                delete_notifications_for(conn, &[], &application_ids)
            }
            NotificationsForRecipient(user_id) => diesel::delete(
                notifications::table.filter(notifications::recipient_user_id.eq(user_id)),
            )
            .execute(conn),
            NotificationsForOwnedCompanies(user_id) => {
                let company_ids = owned_company_ids(conn, user_id)?;
                let job_ids = job_ids_for_companies(conn, &company_ids)?;
                let application_ids = application_ids_for_jobs(conn, &job_ids)?;
                delete_notifications_for(conn, &job_ids, &application_ids)
            }
            NotificationsForCompany(company_id) => {
                let job_ids = job_ids_for_companies(conn, &[company_id])?;
                let application_ids = application_ids_for_jobs(conn, &job_ids)?;
                delete_notifications_for(conn, &job_ids, &application_ids)
            }
            NotificationsForJob(job_id) => {
                let application_ids = application_ids_for_jobs(conn, &[job_id])?;
                delete_notifications_for(conn, &[job_id], &application_ids)
            }
            NotificationsForApplication(application_id) => {
                delete_notifications_for(conn, &[], &[application_id])
            }
            ApplicationsOfUser(user_id) => {
                diesel::delete(applications::table.filter(applications::user_id.eq(user_id)))
                    .execute(conn)
            }
            ApplicationsForOwnedCompanies(user_id) => {
                let company_ids = owned_company_ids(conn, user_id)?;
                let job_ids = job_ids_for_companies(conn, &company_ids)?;
                delete_applications_for_jobs(conn, &job_ids)
            }
            ApplicationsForCompany(company_id) => {
                let job_ids = job_ids_for_companies(conn, &[company_id])?;
                delete_applications_for_jobs(conn, &job_ids)
            }
            ApplicationsForJob(job_id) => delete_applications_for_jobs(conn, &[job_id]),
            Application(application_id) => {
                diesel::delete(applications::table.find(application_id)).execute(conn)
            }
            JobsOfOwnedCompanies(user_id) => {
                let company_ids = owned_company_ids(conn, user_id)?;
                diesel::delete(jobs::table.filter(jobs::company_id.eq_any(&company_ids)))
                    .execute(conn)
            }
            JobsOfCompany(company_id) => {
                diesel::delete(jobs::table.filter(jobs::company_id.eq(company_id))).execute(conn)
            }
            Job(job_id) => diesel::delete(jobs::table.find(job_id)).execute(conn),
            CompaniesOwnedBy(user_id) => {
                diesel::delete(companies::table.filter(companies::created_by.eq(user_id)))
                    .execute(conn)
            }
            Company(company_id) => diesel::delete(companies::table.find(company_id)).execute(conn),
            ProfileOfUser(user_id) => {
                diesel::delete(profiles::table.filter(profiles::user_id.eq(user_id)))
                    .execute(conn)
            }
            Profile(profile_id) => diesel::delete(profiles::table.find(profile_id)).execute(conn),
            User(user_id) => diesel::delete(users::table.find(user_id)).execute(conn),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    root: DeletionRoot,
    steps: Vec<DeletionStep>,
}

impl DeletionPlan {
    pub fn for_root(root: DeletionRoot) -> Self {
        use DeletionStep::*;
        let steps = match root {
            DeletionRoot::User(id) => vec![
                NotificationsForUserApplications(id),
                NotificationsForRecipient(id),
                NotificationsForOwnedCompanies(id),
                ApplicationsOfUser(id),
                ApplicationsForOwnedCompanies(id),
                JobsOfOwnedCompanies(id),
                CompaniesOwnedBy(id),
                ProfileOfUser(id),
                User(id),
            ],
            DeletionRoot::Profile {
                profile_id,
                user_id,
            } => {
                // Applications were snapshotted from this profile.
                let mut steps = Vec::with_capacity(3);
                if let Some(user_id) = user_id {
                    steps.push(NotificationsForUserApplications(user_id));
                    steps.push(ApplicationsOfUser(user_id));
                }
                steps.push(Profile(profile_id));
                steps
            }
            DeletionRoot::Company(id) => vec![
                NotificationsForCompany(id),
                ApplicationsForCompany(id),
                JobsOfCompany(id),
                Company(id),
            ],
            DeletionRoot::Job(id) => vec![NotificationsForJob(id), ApplicationsForJob(id), Job(id)],
            DeletionRoot::Application(id) => {
                vec![NotificationsForApplication(id), Application(id)]
            }
        };
        Self { root, steps }
    }

    pub fn root(&self) -> DeletionRoot {
        self.root
    }

    pub fn steps(&self) -> &[DeletionStep] {
        &self.steps
    }

    /// Runs every step in order. Callers wrap this in a transaction so a
    /// failing step leaves nothing half-deleted.
    pub fn execute(&self, conn: &mut PgConnection) -> QueryResult<DeletionReport> {
        let mut removed = Vec::with_capacity(self.steps.len());
        let mut root_removed = false;
        let last = self.steps.len().saturating_sub(1);

        for (index, step) in self.steps.iter().enumerate() {
            let count = step.execute(conn)?;
            if count > 0 {
                tracing::debug!(step = step.label(), rows = count, "deletion step");
            }
            if index == last {
                root_removed = count > 0;
            }
            removed.push((*step, count));
        }

        tracing::info!(
            root = ?self.root,
            rows = removed.iter().map(|(_, count)| count).sum::<usize>(),
            root_removed,
            "deletion plan executed"
        );

        Ok(DeletionReport {
            removed,
            root_removed,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub removed: Vec<(DeletionStep, usize)>,
    pub root_removed: bool,
}

impl DeletionReport {
    pub fn total(&self) -> usize {
        self.removed.iter().map(|(_, count)| count).sum()
    }
}

fn owned_company_ids(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<Uuid>> {
    companies::table
        .filter(companies::created_by.eq(user_id))
        .select(companies::id)
        .load(conn)
}

fn job_ids_for_companies(conn: &mut PgConnection, company_ids: &[Uuid]) -> QueryResult<Vec<Uuid>> {
    if company_ids.is_empty() {
        return Ok(Vec::new());
    }
    jobs::table
        .filter(jobs::company_id.eq_any(company_ids))
        .select(jobs::id)
        .load(conn)
}

fn application_ids_for_jobs(conn: &mut PgConnection, job_ids: &[Uuid]) -> QueryResult<Vec<Uuid>> {
    if job_ids.is_empty() {
        return Ok(Vec::new());
    }
    applications::table
        .filter(applications::job_id.eq_any(job_ids))
        .select(applications::id)
        .load(conn)
}

fn delete_applications_for_jobs(conn: &mut PgConnection, job_ids: &[Uuid]) -> QueryResult<usize> {
    if job_ids.is_empty() {
        return Ok(0);
    }
    diesel::delete(applications::table.filter(applications::job_id.eq_any(job_ids))).execute(conn)
}

fn delete_notifications_for(
    conn: &mut PgConnection,
    job_ids: &[Uuid],
    application_ids: &[Uuid],
) -> QueryResult<usize> {
    if job_ids.is_empty() && application_ids.is_empty() {
        return Ok(0);
    }
    diesel::delete(
        notifications::table.filter(
            notifications::job_id
                .eq_any(job_ids)
                .or(notifications::application_id.eq_any(application_ids)),
        ),
    )
    .execute(conn)
}
