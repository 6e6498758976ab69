//! Notification fan-out.
//!
//! Lifecycle events are materialized into rows synchronously, in the
//! caller's transaction. Delivery is polling: recipients list their rows and
//! mark them read.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::applications::LifecycleEvent;
use crate::models::{join_name, NewNotification, Notification};
use crate::schema::{applications, companies, jobs, notifications, profiles, users};
use crate::utils::time::{serialize_iso, serialize_iso_opt};

pub const KIND_APPLICATION_NEW: &str = "application:new";
pub const KIND_APPLICATION_MATCHED: &str = "application:matched";

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type NotificationResult<T> = Result<T, NotificationError>;

/// One notification row to write for an event, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: Uuid,
    pub kind: &'static str,
    pub message: String,
    pub job_id: Uuid,
    pub application_id: Uuid,
}

/// Who hears about an event, and what they are told.
///
/// A submission notifies the company owner. A match notifies both sides so
/// each one receives the other's contact details.
pub fn deliveries(event: &LifecycleEvent) -> Vec<Delivery> {
    match event {
        LifecycleEvent::Submitted {
            application_id,
            job_id,
            job_title,
            candidate_label,
            company_owner_id,
        } => company_owner_id
            .map(|owner| Delivery {
                recipient: owner,
                kind: KIND_APPLICATION_NEW,
                message: format!("{candidate_label} applied to {job_title}."),
                job_id: *job_id,
                application_id: *application_id,
            })
            .into_iter()
            .collect(),
        LifecycleEvent::Matched {
            application_id,
            job_id,
            job_title,
            candidate_label,
            candidate_user_id,
            company_owner_id,
        } => {
            let mut out = Vec::with_capacity(2);
            if let Some(candidate) = candidate_user_id {
                out.push(Delivery {
                    recipient: *candidate,
                    kind: KIND_APPLICATION_MATCHED,
                    message: format!("Your application for {job_title} was accepted."),
                    job_id: *job_id,
                    application_id: *application_id,
                });
            }
            if let Some(owner) = company_owner_id {
                out.push(Delivery {
                    recipient: *owner,
                    kind: KIND_APPLICATION_MATCHED,
                    message: format!("You matched with {candidate_label} for {job_title}."),
                    job_id: *job_id,
                    application_id: *application_id,
                });
            }
            out
        }
    }
}

/// Writes one notification row per delivery of each event.
pub fn materialize(
    conn: &mut PgConnection,
    events: &[LifecycleEvent],
) -> QueryResult<Vec<Notification>> {
    let rows: Vec<NewNotification> = events
        .iter()
        .flat_map(deliveries)
        .map(|delivery| NewNotification {
            id: Uuid::new_v4(),
            recipient_user_id: delivery.recipient,
            kind: delivery.kind.to_string(),
            message: delivery.message,
            job_id: Some(delivery.job_id),
            application_id: Some(delivery.application_id),
        })
        .collect();

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    diesel::insert_into(notifications::table)
        .values(&rows)
        .get_results(conn)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactRole {
    Company,
    Candidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDisclosure {
    pub role: ContactRole,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Both sides of a matched application, as needed for disclosure.
#[derive(Debug, Clone, Default)]
pub struct MatchParties {
    pub candidate_user_id: Option<Uuid>,
    pub candidate_email: Option<String>,
    pub candidate_name: Option<String>,
    pub company_owner_id: Option<Uuid>,
    pub company_owner_email: Option<String>,
    pub company_name: Option<String>,
}

/// The counterpart's contact for a matched notification, oriented by who
/// is reading it. Other notification kinds disclose nothing.
pub fn disclose(
    recipient: Uuid,
    kind: &str,
    parties: Option<&MatchParties>,
) -> Option<ContactDisclosure> {
    if kind != KIND_APPLICATION_MATCHED {
        return None;
    }
    let parties = parties?;
    if parties.candidate_user_id == Some(recipient) {
        return Some(ContactDisclosure {
            role: ContactRole::Company,
            email: parties.company_owner_email.clone(),
            name: parties.company_name.clone(),
        });
    }
    if parties.company_owner_id == Some(recipient) {
        return Some(ContactDisclosure {
            role: ContactRole::Candidate,
            email: parties.candidate_email.clone(),
            name: parties.candidate_name.clone(),
        });
    }
    None
}

#[derive(Debug, Serialize)]
pub struct NotificationView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub job_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub is_read: bool,
    #[serde(serialize_with = "serialize_iso_opt")]
    pub read_at: Option<NaiveDateTime>,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: NaiveDateTime,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub contact_role: Option<ContactRole>,
}

impl NotificationView {
    fn new(notification: Notification, disclosure: Option<ContactDisclosure>) -> Self {
        let (contact_email, contact_name, contact_role) = match disclosure {
            Some(d) => (d.email, d.name, Some(d.role)),
            None => (None, None, None),
        };
        Self {
            id: notification.id,
            kind: notification.kind,
            message: notification.message,
            job_id: notification.job_id,
            application_id: notification.application_id,
            is_read: notification.is_read,
            read_at: notification.read_at,
            created_at: notification.created_at,
            contact_email,
            contact_name,
            contact_role,
        }
    }
}

/// Clamps a requested page size to `1..=100`, defaulting to 20.
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

pub fn list_for_recipient(
    conn: &mut PgConnection,
    recipient: Uuid,
    only_unread: bool,
    limit: i64,
) -> QueryResult<Vec<NotificationView>> {
    let mut query = notifications::table
        .filter(notifications::recipient_user_id.eq(recipient))
        .order((notifications::created_at.desc(), notifications::id.desc()))
        .limit(limit)
        .into_boxed();
    if only_unread {
        query = query.filter(notifications::is_read.eq(false));
    }
    let items: Vec<Notification> = query.load(conn)?;

    let matched_application_ids: Vec<Uuid> = items
        .iter()
        .filter(|n| n.kind == KIND_APPLICATION_MATCHED)
        .filter_map(|n| n.application_id)
        .collect();
    let parties = load_match_parties(conn, &matched_application_ids)?;

    Ok(items
        .into_iter()
        .map(|notification| {
            let disclosure = disclose(
                recipient,
                &notification.kind,
                notification
                    .application_id
                    .and_then(|id| parties.get(&id)),
            );
            NotificationView::new(notification, disclosure)
        })
        .collect())
}

fn load_match_parties(
    conn: &mut PgConnection,
    application_ids: &[Uuid],
) -> QueryResult<HashMap<Uuid, MatchParties>> {
    if application_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, Option<Uuid>, String, Option<Uuid>)> = applications::table
        .inner_join(jobs::table.inner_join(companies::table))
        .filter(applications::id.eq_any(application_ids))
        .select((
            applications::id,
            applications::user_id,
            companies::name,
            companies::created_by,
        ))
        .load(conn)?;

    let owner_ids: Vec<Uuid> = rows.iter().filter_map(|row| row.3).collect();
    let candidate_ids: Vec<Uuid> = rows.iter().filter_map(|row| row.1).collect();

    let owner_emails: HashMap<Uuid, String> = if owner_ids.is_empty() {
        HashMap::new()
    } else {
        users::table
            .filter(users::id.eq_any(&owner_ids))
            .select((users::id, users::email))
            .load::<(Uuid, String)>(conn)?
            .into_iter()
            .collect()
    };

    let candidate_contacts: HashMap<Uuid, (Option<String>, String)> = if candidate_ids.is_empty()
    {
        HashMap::new()
    } else {
        profiles::table
            .filter(profiles::user_id.eq_any(&candidate_ids))
            .select((
                profiles::user_id,
                profiles::contact_email,
                profiles::first_name,
                profiles::last_name,
            ))
            .load::<(Option<Uuid>, Option<String>, String, String)>(conn)?
            .into_iter()
            .filter_map(|(user_id, email, first, last)| {
                user_id.map(|id| (id, (email, join_name(Some(&first), Some(&last)))))
            })
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|(application_id, candidate, company_name, owner)| {
            let contact = candidate.and_then(|id| candidate_contacts.get(&id));
            let parties = MatchParties {
                candidate_user_id: candidate,
                candidate_email: contact.and_then(|(email, _)| email.clone()),
                candidate_name: contact
                    .map(|(_, name)| name.clone())
                    .filter(|name| !name.is_empty()),
                company_owner_id: owner,
                company_owner_email: owner.and_then(|id| owner_emails.get(&id).cloned()),
                company_name: Some(company_name),
            };
            (application_id, parties)
        })
        .collect())
}

/// Marks one notification read and stamps `read_at`, again on repeat calls.
/// Only the recipient can do this; anyone else gets `NotFound`, same as for a
/// missing id.
pub fn mark_read(
    conn: &mut PgConnection,
    notification_id: Uuid,
    recipient: Uuid,
) -> NotificationResult<()> {
    let updated = diesel::update(
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::recipient_user_id.eq(recipient)),
    )
    .set((
        notifications::is_read.eq(true),
        notifications::read_at.eq(Utc::now().naive_utc()),
    ))
    .execute(conn)?;

    if updated == 0 {
        return Err(NotificationError::NotFound);
    }
    Ok(())
}

pub fn mark_all_read(conn: &mut PgConnection, recipient: Uuid) -> QueryResult<usize> {
    diesel::update(
        notifications::table
            .filter(notifications::recipient_user_id.eq(recipient))
            .filter(notifications::is_read.eq(false)),
    )
    .set((
        notifications::is_read.eq(true),
        notifications::read_at.eq(Utc::now().naive_utc()),
    ))
    .execute(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched_event(candidate: Option<Uuid>, owner: Option<Uuid>) -> LifecycleEvent {
        LifecycleEvent::Matched {
            application_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            job_title: "Rust Engineer".to_string(),
            candidate_label: "Ada Lovelace".to_string(),
            candidate_user_id: candidate,
            company_owner_id: owner,
        }
    }

    #[test]
    fn submission_notifies_company_owner_only() {
        let owner = Uuid::new_v4();
        let event = LifecycleEvent::Submitted {
            application_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            job_title: "Rust Engineer".to_string(),
            candidate_label: "a@x.com".to_string(),
            company_owner_id: Some(owner),
        };
        let out = deliveries(&event);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient, owner);
        assert_eq!(out[0].kind, KIND_APPLICATION_NEW);
        assert_eq!(out[0].message, "a@x.com applied to Rust Engineer.");
    }

    #[test]
    fn submission_without_owner_notifies_nobody() {
        let event = LifecycleEvent::Submitted {
            application_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            job_title: "Rust Engineer".to_string(),
            candidate_label: "Ada".to_string(),
            company_owner_id: None,
        };
        assert!(deliveries(&event).is_empty());
    }

    #[test]
    fn match_notifies_both_parties() {
        let candidate = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let out = deliveries(&matched_event(Some(candidate), Some(owner)));
        let recipients: Vec<Uuid> = out.iter().map(|d| d.recipient).collect();
        assert_eq!(recipients, vec![candidate, owner]);
        assert!(out.iter().all(|d| d.kind == KIND_APPLICATION_MATCHED));
        assert!(out[0].message.contains("Rust Engineer"));
    }

    #[test]
    fn anonymous_match_notifies_owner_only() {
        let owner = Uuid::new_v4();
        let out = deliveries(&matched_event(None, Some(owner)));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient, owner);
    }

    fn parties(candidate: Uuid, owner: Uuid) -> MatchParties {
        MatchParties {
            candidate_user_id: Some(candidate),
            candidate_email: Some("a@x.com".to_string()),
            candidate_name: Some("Ada Lovelace".to_string()),
            company_owner_id: Some(owner),
            company_owner_email: Some("r@corp.com".to_string()),
            company_name: Some("Corp".to_string()),
        }
    }

    #[test]
    fn disclosure_points_at_the_counterpart() {
        let candidate = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let p = parties(candidate, owner);

        let to_candidate = disclose(candidate, KIND_APPLICATION_MATCHED, Some(&p)).unwrap();
        assert_eq!(to_candidate.role, ContactRole::Company);
        assert_eq!(to_candidate.email.as_deref(), Some("r@corp.com"));
        assert_eq!(to_candidate.name.as_deref(), Some("Corp"));

        let to_owner = disclose(owner, KIND_APPLICATION_MATCHED, Some(&p)).unwrap();
        assert_eq!(to_owner.role, ContactRole::Candidate);
        assert_eq!(to_owner.email.as_deref(), Some("a@x.com"));
        assert_eq!(to_owner.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn no_disclosure_before_match_or_to_strangers() {
        let candidate = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let p = parties(candidate, owner);
        assert!(disclose(owner, KIND_APPLICATION_NEW, Some(&p)).is_none());
        assert!(disclose(Uuid::new_v4(), KIND_APPLICATION_MATCHED, Some(&p)).is_none());
        assert!(disclose(candidate, KIND_APPLICATION_MATCHED, None).is_none());
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), 100);
        assert_eq!(clamp_limit(Some(42)), 42);
    }
}
