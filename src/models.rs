use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::*;
use crate::utils::time::{serialize_iso, serialize_iso_opt};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = profiles)]
#[diesel(belongs_to(User))]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub date_birth: Option<NaiveDate>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub diplomas: Option<String>,
    pub experiences: Option<String>,
    pub skills: Option<String>,
    pub languages: Option<String>,
    pub qualities: Option<String>,
    pub interests: Option<String>,
    pub job_target: Option<String>,
    pub motivation: Option<String>,
    pub links: Option<String>,
    pub avatar_url: Option<String>,
    pub contact_email: Option<String>,
    pub cv_url: Option<String>,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_iso")]
    pub updated_at: NaiveDateTime,
}

impl Profile {
    /// First and last name joined, skipping empty parts.
    pub fn full_name(&self) -> String {
        join_name(Some(&self.first_name), Some(&self.last_name))
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub city: Option<String>,
    pub contact_email: Option<String>,
    pub cv_url: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = companies)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub hq_city: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub social_links: Option<String>,
    pub headcount: Option<i32>,
    pub banner_url: Option<String>,
    pub created_by: Option<Uuid>,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_iso")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = companies)]
pub struct NewCompany {
    pub id: Uuid,
    pub name: String,
    pub hq_city: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub social_links: Option<String>,
    pub headcount: Option<i32>,
    pub banner_url: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = jobs)]
#[diesel(belongs_to(Company))]
pub struct Job {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub short_desc: String,
    pub full_desc: Option<String>,
    pub location: Option<String>,
    pub profile_sought: Option<String>,
    pub contract_type: Option<String>,
    pub work_mode: Option<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub currency: Option<String>,
    pub tags: Option<String>,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_iso")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub short_desc: String,
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

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = applications)]
#[diesel(belongs_to(Job))]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub cv_url: Option<String>,
    pub status: String,
    #[serde(serialize_with = "serialize_iso_opt")]
    pub matched_at: Option<NaiveDateTime>,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = applications)]
pub struct NewApplication {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub cv_url: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_user_id: Uuid,
    pub kind: String,
    pub message: String,
    pub job_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: Uuid,
    pub recipient_user_id: Uuid,
    pub kind: String,
    pub message: String,
    pub job_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
}

/// Joins name parts with a single space, ignoring missing or blank parts.
pub fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::join_name;

    #[test]
    fn joins_both_parts() {
        assert_eq!(join_name(Some(" Ada "), Some("Lovelace")), "Ada Lovelace");
    }

    #[test]
    fn skips_blank_parts() {
        assert_eq!(join_name(Some("  "), Some("Lovelace")), "Lovelace");
        assert_eq!(join_name(None, None), "");
    }
}
