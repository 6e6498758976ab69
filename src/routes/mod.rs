use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod admin;
pub mod applications;
pub mod auth;
pub mod companies;
pub mod company_applications;
pub mod health;
pub mod jobs;
pub mod notifications;
pub mod profiles;

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Page {
    pub fn resolve(page: Option<i64>, page_size: Option<i64>, default_size: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: Page, total: i64) -> Self {
        Self {
            items,
            page: page.page,
            page_size: page.page_size,
            total,
        }
    }
}

#[derive(Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

/// `%term%` for ILIKE filters, or `None` when the term is blank.
pub(crate) fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| format!("%{value}%"))
}

fn cors_layer(origins: Option<&String>) -> CorsLayer {
    let allow_origin = match origins {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_ref());

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me).delete(auth::delete_me));

    let company_routes = Router::new()
        .route(
            "/",
            get(companies::list_companies).post(companies::create_company),
        )
        .route(
            "/:id",
            get(companies::get_company)
                .put(companies::update_company)
                .delete(companies::delete_company),
        );

    let job_routes = Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/:id",
            get(jobs::get_job)
                .patch(jobs::update_job)
                .delete(jobs::delete_job),
        );

    let profile_routes = Router::new()
        .route(
            "/",
            get(profiles::list_profiles).post(profiles::create_profile),
        )
        .route(
            "/:id",
            get(profiles::get_profile)
                .put(profiles::update_profile)
                .delete(profiles::delete_profile),
        );

    let application_routes = Router::new()
        .route(
            "/",
            get(admin::list_applications).post(applications::submit_application),
        )
        .route(
            "/:id",
            get(admin::get_application)
                .patch(admin::update_application)
                .delete(admin::delete_application),
        );

    let me_routes = Router::new()
        .route("/applications", get(applications::list_my_applications))
        .route("/profile", get(profiles::my_profile))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/read-all",
            post(notifications::mark_all_notifications_read),
        )
        .route(
            "/notifications/:id/read",
            post(notifications::mark_notification_read),
        );

    let company_application_routes = Router::new()
        .route("/", get(company_applications::list_company_applications))
        .route(
            "/:id/match",
            post(company_applications::match_company_application),
        );

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/companies", company_routes)
        .route("/my/company", get(companies::my_company))
        .nest("/jobs", job_routes)
        .nest("/profiles", profile_routes)
        .nest("/applications", application_routes)
        .nest("/me", me_routes)
        .nest("/company/applications", company_application_routes)
        .route("/admin/stats", get(admin::stats))
        .route(
            "/users/:id",
            axum::routing::patch(admin::update_user).delete(admin::delete_user),
        )
        .route("/health", get(health::health_check))
        .route("/health/db", get(health::db_ping));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        assert_eq!(
            Page::resolve(Some(0), Some(1000), 10),
            Page {
                page: 1,
                page_size: 100
            }
        );
        let page = Page::resolve(Some(3), None, 20);
        assert_eq!(page.page_size, 20);
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn blank_search_terms_are_ignored() {
        assert_eq!(like_pattern(Some("  ")), None);
        assert_eq!(like_pattern(None), None);
        assert_eq!(like_pattern(Some(" rust ")).as_deref(), Some("%rust%"));
    }
}
