//! Async device registry.
//!
//! [`DeviceRegistry`] validates registration requests, resolves the gateway
//! environment, and runs the repository calls on the blocking pool. Every
//! storage call first awaits the bootstrap latch, so the canonical unique
//! index is guaranteed to exist before the first upsert.

use herald_core::{
    Environment, Platform, PushToken, RecordId, UserId, ValidationError, infer_environment,
};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::bootstrap::{BootstrapReport, run_bootstrap};
use crate::connection::{ConnectionPool, with_connection};
use crate::errors::{RegistryError, Result};
use crate::models::{DeviceRegistration, NewRegistration};
use crate::repositories::DeviceRegistrationRepo;

/// Raw registration request as received from a client.
#[derive(Clone, Debug, Default)]
pub struct RegisterDevice {
    /// Owning user id (unvalidated).
    pub user_id: String,
    /// Device token in any accepted form.
    pub token: String,
    /// Platform name; defaults to iOS.
    pub platform: Option<String>,
    /// Explicit environment; inferred from the request origin when absent.
    pub environment: Option<String>,
    /// App identifier override.
    pub topic: Option<String>,
}

impl RegisterDevice {
    fn validate(self, origin: Option<&str>) -> std::result::Result<NewRegistration, ValidationError> {
        let user_id = UserId::parse(&self.user_id)?;
        let push_token = PushToken::parse(&self.token)?;
        let platform = match non_empty(self.platform.as_deref()) {
            Some(raw) => raw.parse()?,
            None => Platform::Ios,
        };
        let environment = match non_empty(self.environment.as_deref()) {
            Some(raw) => raw.parse()?,
            None => infer_environment(origin),
        };
        let topic = non_empty(self.topic.as_deref()).map(str::to_string);

        Ok(NewRegistration {
            user_id,
            platform,
            push_token,
            environment,
            topic,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Result of a successful registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registered {
    /// Registration id.
    pub id: RecordId,
    /// Whether a new row was created.
    pub created: bool,
    /// Environment the token was stored under.
    pub environment: Environment,
    /// Rows of other owners removed because they held the same token.
    pub reassigned: usize,
}

/// Persistent map from users to their current push registrations.
pub struct DeviceRegistry {
    pool: ConnectionPool,
    bootstrapped: OnceCell<BootstrapReport>,
}

impl DeviceRegistry {
    /// Wrap a connection pool. Nothing touches storage until the first call.
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            bootstrapped: OnceCell::new(),
        }
    }

    /// The underlying pool (shared with the outbox).
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Migrate and repair the schema once per process.
    ///
    /// Concurrent first callers wait on a single run. A failed run leaves the
    /// latch unset, so the next caller retries.
    pub async fn bootstrap(&self) -> Result<&BootstrapReport> {
        self.bootstrapped
            .get_or_try_init(|| async {
                let report = with_connection(&self.pool, run_bootstrap).await?;
                info!(
                    migrations = report.migrations_applied,
                    index_created = report.index_created,
                    "device registry bootstrapped"
                );
                Ok::<_, RegistryError>(report)
            })
            .await
    }

    /// Validate and upsert a registration.
    ///
    /// Validation happens before any storage access; an invalid request never
    /// triggers the bootstrap or a write.
    pub async fn register(&self, request: RegisterDevice, origin: Option<&str>) -> Result<Registered> {
        let new = request.validate(origin)?;
        let _ = self.bootstrap().await?;

        let user_id = new.user_id.clone();
        let environment = new.environment;
        let token_prefix = new.push_token.prefix().to_string();

        let outcome = with_connection(&self.pool, move |conn| {
            match DeviceRegistrationRepo::upsert(conn, &new) {
                Err(err) if err.is_unique_violation() => {
                    warn!(
                        user_id = %new.user_id,
                        error = %err,
                        "registration hit a foreign unique constraint, overwriting by (user_id, platform)"
                    );
                    DeviceRegistrationRepo::overwrite_by_user_platform(conn, &new)
                }
                other => other,
            }
        })
        .await?;

        if outcome.reassigned > 0 {
            info!(
                %user_id,
                token = %token_prefix,
                removed = outcome.reassigned,
                "push token reassigned from another registration"
            );
        }
        debug!(
            %user_id,
            %environment,
            token = %token_prefix,
            created = outcome.created,
            "device registered"
        );

        Ok(Registered {
            id: outcome.id,
            created: outcome.created,
            environment,
            reassigned: outcome.reassigned,
        })
    }

    /// Current registrations of `user_id` on one platform, sandbox before
    /// production.
    pub async fn lookup(&self, user_id: &UserId, platform: Platform) -> Result<Vec<DeviceRegistration>> {
        let _ = self.bootstrap().await?;
        let user_id = user_id.clone();
        with_connection(&self.pool, move |conn| {
            DeviceRegistrationRepo::find_by_user(conn, &user_id, platform)
        })
        .await
    }

    /// Current registrations of `user_id` across every platform.
    pub async fn lookup_all(&self, user_id: &UserId) -> Result<Vec<DeviceRegistration>> {
        let _ = self.bootstrap().await?;
        let user_id = user_id.clone();
        with_connection(&self.pool, move |conn| {
            let mut all = Vec::new();
            for platform in Platform::ALL {
                all.extend(DeviceRegistrationRepo::find_by_user(conn, &user_id, platform)?);
            }
            Ok(all)
        })
        .await
    }

    /// Delete a registration. Returns whether a row was removed.
    pub async fn remove(&self, id: &RecordId) -> Result<bool> {
        let _ = self.bootstrap().await?;
        let id = id.clone();
        with_connection(&self.pool, move |conn| DeviceRegistrationRepo::delete(conn, &id)).await
    }

    /// Delete a registration only if it still holds `token`.
    pub async fn remove_if_token(&self, id: &RecordId, token: &PushToken) -> Result<bool> {
        let _ = self.bootstrap().await?;
        let id = id.clone();
        let token = token.clone();
        with_connection(&self.pool, move |conn| {
            DeviceRegistrationRepo::delete_if_token(conn, &id, &token)
        })
        .await
    }
}
