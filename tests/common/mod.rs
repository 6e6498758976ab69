use std::env;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use jobboard::auth::jwt::JwtService;
use jobboard::auth::password;
use jobboard::config::AppConfig;
use jobboard::db::{self, PgPool};
use jobboard::models::NewUser;
use jobboard::routes;
use jobboard::state::AppState;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self { state, router })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    pub async fn insert_user(&self, email: &str, password: &str, role: &str) -> Result<Uuid> {
        let email = email.to_string();
        let password = password.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let user = NewUser {
                id: Uuid::new_v4(),
                email,
                password_hash: password::hash_password(&password)?,
                role,
            };
            diesel::insert_into(jobboard::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .post_json(
                "/api/auth/login",
                &json!({ "email": email, "password": password }),
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_json(response.into_body()).await?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response without access_token"))
    }

    /// Inserts a user and returns its id with a fresh token.
    pub async fn user_with_token(&self, email: &str, role: &str) -> Result<(Uuid, String)> {
        let password = "s3cret-pass";
        let id = self.insert_user(email, password, role).await?;
        let token = self.login_token(email, password).await?;
        Ok((id, token))
    }

    /// Runs a raw `SELECT COUNT(*) ...` and returns the count.
    #[allow(dead_code)]
    pub async fn count(&self, sql: &str) -> Result<i64> {
        #[derive(QueryableByName)]
        struct Count {
            #[diesel(sql_type = diesel::sql_types::BigInt)]
            count: i64,
        }

        let sql = sql.to_string();
        self.with_conn(move |conn| {
            let row: Count = diesel::sql_query(sql)
                .get_result(conn)
                .context("count query failed")?;
            Ok(row.count)
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

/// A recruiter owning one company with one job, plus a candidate with a
/// complete profile. Used by the lifecycle flows.
#[allow(dead_code)]
pub struct Marketplace {
    pub recruiter_id: Uuid,
    pub recruiter_token: String,
    pub company_id: String,
    pub job_id: String,
    pub candidate_id: Uuid,
    pub candidate_token: String,
    pub profile_id: String,
}

#[allow(dead_code)]
impl Marketplace {
    pub async fn seed(app: &TestApp) -> Result<Self> {
        let (recruiter_id, recruiter_token) =
            app.user_with_token("r@corp.com", "recruiter").await?;
        let (candidate_id, candidate_token) = app.user_with_token("a@x.com", "user").await?;

        let company = expect_json(
            app.post_json(
                "/api/companies",
                &json!({ "name": "Corp", "hq_city": "Lyon" }),
                Some(&recruiter_token),
            )
            .await?,
            StatusCode::CREATED,
        )
        .await?;
        let company_id = id_of(&company)?;

        let job = expect_json(
            app.post_json(
                "/api/jobs",
                &json!({
                    "company_id": company_id,
                    "title": "Rust Engineer",
                    "short_desc": "Build the backend",
                    "location": "Remote",
                }),
                Some(&recruiter_token),
            )
            .await?,
            StatusCode::CREATED,
        )
        .await?;
        let job_id = id_of(&job)?;

        let profile = expect_json(
            app.post_json(
                "/api/profiles",
                &json!({
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "contact_email": "a@x.com",
                    "cv_url": "cv1",
                }),
                Some(&candidate_token),
            )
            .await?,
            StatusCode::CREATED,
        )
        .await?;
        let profile_id = id_of(&profile)?;

        Ok(Self {
            recruiter_id,
            recruiter_token,
            company_id,
            job_id,
            candidate_id,
            candidate_token,
            profile_id,
        })
    }

    /// Submits the candidate's application and returns its id.
    pub async fn apply(&self, app: &TestApp) -> Result<String> {
        let created = expect_json(
            app.post_json(
                "/api/applications",
                &json!({ "job_id": self.job_id, "message": "Hello" }),
                Some(&self.candidate_token),
            )
            .await?,
            StatusCode::CREATED,
        )
        .await?;
        id_of(&created)
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_to_json(body: Body) -> Result<Value> {
    let bytes = body_to_vec(body).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

/// Asserts the status and returns the JSON body.
pub async fn expect_json(response: hyper::Response<Body>, status: StatusCode) -> Result<Value> {
    let actual = response.status();
    let body = body_to_json(response.into_body()).await.unwrap_or(Value::Null);
    ensure!(
        actual == status,
        "expected status {status}, got {actual} with body {body}"
    );
    Ok(body)
}

pub fn id_of(value: &Value) -> Result<String> {
    value["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("response without id: {value}"))
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        db::run_migrations(&mut conn)?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE notifications, applications, jobs, companies, profiles, users CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
