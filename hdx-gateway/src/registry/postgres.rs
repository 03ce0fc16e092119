//! sqlx-backed [`RegistryStore`] over the three registry tables.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::error;

use crate::error::GatewayError;
use crate::registry::model::{
    BridgeEntry, BridgeProfile, ConsentManagerEntry, RoutingEntry, ServiceEndpoint, ServiceProfile,
    ServiceRole,
};
use crate::registry::store::RegistryStore;

const COMPONENT: &str = "pg_registry_store";

const SELECT_CM: &str =
    "SELECT suffix, name, url, active, blocklisted FROM consent_manager WHERE suffix = $1";
const CREATE_CM_ENTRY: &str = "INSERT INTO consent_manager (suffix, name, url, active, blocklisted) \
     VALUES ($1, $2, $3, $4, $5)";
const UPDATE_CM_ENTRY: &str = "UPDATE consent_manager SET name = $1, url = $2, active = $3, blocklisted = $4, \
     date_modified = timezone('utc'::text, now()) WHERE suffix = $5";

const SELECT_BRIDGE: &str =
    "SELECT bridge_id, name, url, active, blocklisted FROM bridge WHERE bridge_id = $1";
const INSERT_BRIDGE_ENTRY: &str =
    "INSERT INTO bridge (bridge_id, name, url, active, blocklisted) VALUES ($1, $2, $3, $4, $5)";
const UPDATE_BRIDGE_ENTRY: &str = "UPDATE bridge SET name = $1, url = $2, active = $3, blocklisted = $4, \
     date_modified = timezone('utc'::text, now()) WHERE bridge_id = $5";

const SELECT_BRIDGE_SERVICE: &str =
    "SELECT service_id FROM bridge_service WHERE bridge_id = $1 AND service_id = $2";
const SELECT_ACTIVE_BRIDGE_SERVICES: &str = "SELECT service_id, is_provider, is_consumer, is_health_locker FROM bridge_service \
     WHERE bridge_id = $1 AND active = TRUE";
const SELECT_SERVICES_BY_SERVICE_ID: &str = "SELECT service_id, name, active, is_provider, is_consumer, is_health_locker, endpoints \
     FROM bridge_service WHERE service_id = $1";
const SELECT_BRIDGE_PROFILE: &str = "SELECT bridge_id, name, url, active, blocklisted, date_created, date_modified \
     FROM bridge WHERE bridge_id = $1";
const RESOLVE_CM: &str =
    "SELECT suffix, url, active, blocklisted FROM consent_manager WHERE suffix = $1";

fn role_column(role: ServiceRole) -> &'static str {
    match role {
        ServiceRole::Provider => "is_provider",
        ServiceRole::Consumer => "is_consumer",
        ServiceRole::HealthLocker => "is_health_locker",
    }
}

fn store_failure(operation: &'static str, err: sqlx::Error) -> GatewayError {
    error!(component = COMPONENT, operation, err = %err, "store operation failed");
    GatewayError::StoreOperationFailed(Box::new(err))
}

/// Relational registry store over a shared Postgres pool.
pub struct PgRegistryStore {
    pool: PgPool,
}

impl PgRegistryStore {
    /// Wraps an existing pool and applies the schema migration.
    pub async fn connect(pool: PgPool) -> Result<Self, GatewayError> {
        Self::migrate(&pool)
            .await
            .map_err(|err| store_failure("migrate", err))?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS consent_manager (
                suffix TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL,
                active BOOLEAN NOT NULL,
                blocklisted BOOLEAN NOT NULL,
                date_created TIMESTAMPTZ NOT NULL DEFAULT timezone('utc'::text, now()),
                date_modified TIMESTAMPTZ NOT NULL DEFAULT timezone('utc'::text, now())
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bridge (
                bridge_id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL DEFAULT '',
                active BOOLEAN NOT NULL,
                blocklisted BOOLEAN NOT NULL,
                date_created TIMESTAMPTZ NOT NULL DEFAULT timezone('utc'::text, now()),
                date_modified TIMESTAMPTZ NOT NULL DEFAULT timezone('utc'::text, now())
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bridge_service (
                bridge_id TEXT NOT NULL REFERENCES bridge (bridge_id),
                service_id TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                active BOOLEAN NOT NULL DEFAULT TRUE,
                is_provider BOOLEAN NOT NULL DEFAULT FALSE,
                is_consumer BOOLEAN NOT NULL DEFAULT FALSE,
                is_health_locker BOOLEAN NOT NULL DEFAULT FALSE,
                endpoints JSONB,
                date_created TIMESTAMPTZ NOT NULL DEFAULT timezone('utc'::text, now()),
                date_modified TIMESTAMPTZ NOT NULL DEFAULT timezone('utc'::text, now()),
                PRIMARY KEY (bridge_id, service_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bridge_service_service_id ON bridge_service (service_id)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    fn roles_from_row(row: &PgRow) -> Result<Vec<ServiceRole>, sqlx::Error> {
        let mut roles = Vec::new();
        if row.try_get::<bool, _>("is_provider")? {
            roles.push(ServiceRole::Provider);
        }
        if row.try_get::<bool, _>("is_consumer")? {
            roles.push(ServiceRole::Consumer);
        }
        if row.try_get::<bool, _>("is_health_locker")? {
            roles.push(ServiceRole::HealthLocker);
        }
        Ok(roles)
    }

    fn endpoints_from_row(row: &PgRow) -> Result<Vec<ServiceEndpoint>, sqlx::Error> {
        let endpoints: Option<Json<Vec<ServiceEndpoint>>> = row.try_get("endpoints")?;
        Ok(endpoints.map(|json| json.0).unwrap_or_default())
    }

    fn service_profile_from_rows(rows: &[PgRow]) -> Result<Option<ServiceProfile>, sqlx::Error> {
        let Some(first) = rows.first() else {
            return Ok(None);
        };

        // A service id can span several bridge rows; roles and endpoints merge
        // across all of them, the scalar columns come from the last row as in
        // the source system.
        let mut roles = Vec::new();
        let mut endpoints = Vec::new();
        let mut profile = ServiceProfile {
            id: first.try_get("service_id")?,
            name: first.try_get("name")?,
            active: first.try_get("active")?,
            roles: Vec::new(),
            endpoints: Vec::new(),
        };
        for row in rows {
            profile.name = row.try_get("name")?;
            profile.active = row.try_get("active")?;
            for role in Self::roles_from_row(row)? {
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
            endpoints.extend(Self::endpoints_from_row(row)?);
        }
        profile.roles = roles;
        profile.endpoints = endpoints;
        Ok(Some(profile))
    }
}

#[async_trait]
impl RegistryStore for PgRegistryStore {
    async fn find_consent_manager(
        &self,
        suffix: &str,
    ) -> Result<Option<ConsentManagerEntry>, GatewayError> {
        let row = sqlx::query(SELECT_CM)
            .bind(suffix)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| store_failure("find_consent_manager", err))?;

        row.map(|row| {
            Ok(ConsentManagerEntry {
                suffix: row.try_get("suffix")?,
                name: row.try_get("name")?,
                url: row.try_get("url")?,
                active: row.try_get("active")?,
                blocklisted: row.try_get("blocklisted")?,
            })
        })
        .transpose()
        .map_err(|err| store_failure("find_consent_manager", err))
    }

    async fn create_consent_manager(
        &self,
        entry: &ConsentManagerEntry,
    ) -> Result<(), GatewayError> {
        sqlx::query(CREATE_CM_ENTRY)
            .bind(&entry.suffix)
            .bind(&entry.name)
            .bind(&entry.url)
            .bind(entry.active)
            .bind(entry.blocklisted)
            .execute(&self.pool)
            .await
            .map_err(|err| store_failure("create_consent_manager", err))?;
        Ok(())
    }

    async fn update_consent_manager(
        &self,
        entry: &ConsentManagerEntry,
    ) -> Result<(), GatewayError> {
        sqlx::query(UPDATE_CM_ENTRY)
            .bind(&entry.name)
            .bind(&entry.url)
            .bind(entry.active)
            .bind(entry.blocklisted)
            .bind(&entry.suffix)
            .execute(&self.pool)
            .await
            .map_err(|err| store_failure("update_consent_manager", err))?;
        Ok(())
    }

    async fn find_bridge(&self, bridge_id: &str) -> Result<Option<BridgeEntry>, GatewayError> {
        let row = sqlx::query(SELECT_BRIDGE)
            .bind(bridge_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| store_failure("find_bridge", err))?;

        row.map(|row| {
            Ok(BridgeEntry {
                id: row.try_get("bridge_id")?,
                name: row.try_get("name")?,
                url: row.try_get("url")?,
                active: row.try_get("active")?,
                blocklisted: row.try_get("blocklisted")?,
            })
        })
        .transpose()
        .map_err(|err| store_failure("find_bridge", err))
    }

    async fn create_bridge(&self, entry: &BridgeEntry) -> Result<(), GatewayError> {
        sqlx::query(INSERT_BRIDGE_ENTRY)
            .bind(&entry.id)
            .bind(&entry.name)
            .bind(&entry.url)
            .bind(entry.active)
            .bind(entry.blocklisted)
            .execute(&self.pool)
            .await
            .map_err(|err| store_failure("create_bridge", err))?;
        Ok(())
    }

    async fn update_bridge(&self, entry: &BridgeEntry) -> Result<(), GatewayError> {
        sqlx::query(UPDATE_BRIDGE_ENTRY)
            .bind(&entry.name)
            .bind(&entry.url)
            .bind(entry.active)
            .bind(entry.blocklisted)
            .bind(&entry.id)
            .execute(&self.pool)
            .await
            .map_err(|err| store_failure("update_bridge", err))?;
        Ok(())
    }

    async fn service_exists_for_other_bridge(
        &self,
        service_id: &str,
        role: ServiceRole,
        excluding_bridge_id: &str,
    ) -> Result<bool, GatewayError> {
        let query = format!(
            "SELECT service_id FROM bridge_service WHERE service_id = $1 AND {} = TRUE AND bridge_id != $2",
            role_column(role)
        );
        let row = sqlx::query(&query)
            .bind(service_id)
            .bind(excluding_bridge_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| store_failure("service_exists_for_other_bridge", err))?;
        Ok(row.is_some())
    }

    async fn bridge_service_exists(
        &self,
        bridge_id: &str,
        service_id: &str,
    ) -> Result<bool, GatewayError> {
        let row = sqlx::query(SELECT_BRIDGE_SERVICE)
            .bind(bridge_id)
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| store_failure("bridge_service_exists", err))?;
        Ok(row.is_some())
    }

    async fn insert_bridge_service(
        &self,
        bridge_id: &str,
        service_id: &str,
        name: &str,
        role_active: &HashMap<ServiceRole, bool>,
        endpoints: &[ServiceEndpoint],
    ) -> Result<(), GatewayError> {
        let pairs: Vec<(ServiceRole, bool)> =
            role_active.iter().map(|(role, active)| (*role, *active)).collect();

        let mut columns = String::new();
        let mut values = String::new();
        for (position, (role, _)) in pairs.iter().enumerate() {
            columns.push_str(", ");
            columns.push_str(role_column(*role));
            values.push_str(&format!(", ${}", position + 6));
        }
        let query = format!(
            "INSERT INTO bridge_service (bridge_id, service_id, name, active, endpoints{columns}) \
             VALUES ($1, $2, $3, $4, $5{values})"
        );

        let mut insert = sqlx::query(&query)
            .bind(bridge_id)
            .bind(service_id)
            .bind(name)
            .bind(true)
            .bind(Json(endpoints.to_vec()));
        for (_, active) in &pairs {
            insert = insert.bind(*active);
        }
        insert
            .execute(&self.pool)
            .await
            .map_err(|err| store_failure("insert_bridge_service", err))?;
        Ok(())
    }

    async fn update_bridge_service(
        &self,
        bridge_id: &str,
        service_id: &str,
        name: &str,
        role_active: &HashMap<ServiceRole, bool>,
    ) -> Result<(), GatewayError> {
        let pairs: Vec<(ServiceRole, bool)> =
            role_active.iter().map(|(role, active)| (*role, *active)).collect();

        let mut assignments = String::new();
        for (position, (role, _)) in pairs.iter().enumerate() {
            assignments.push_str(&format!(", {} = ${}", role_column(*role), position + 4));
        }
        let query = format!(
            "UPDATE bridge_service SET name = $3, date_modified = timezone('utc'::text, now()){assignments} \
             FROM bridge WHERE bridge_service.bridge_id = bridge.bridge_id \
             AND bridge_service.bridge_id = $1 AND bridge_service.service_id = $2 \
             AND bridge.active = TRUE AND bridge_service.active = TRUE"
        );

        let mut update = sqlx::query(&query)
            .bind(bridge_id)
            .bind(service_id)
            .bind(name);
        for (_, active) in &pairs {
            update = update.bind(*active);
        }
        update
            .execute(&self.pool)
            .await
            .map_err(|err| store_failure("update_bridge_service", err))?;
        Ok(())
    }

    async fn list_active_services_for_bridge(
        &self,
        bridge_id: &str,
    ) -> Result<Vec<(String, ServiceRole)>, GatewayError> {
        let rows = sqlx::query(SELECT_ACTIVE_BRIDGE_SERVICES)
            .bind(bridge_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| store_failure("list_active_services_for_bridge", err))?;

        let mut services = Vec::new();
        for row in &rows {
            let service_id: String = row
                .try_get("service_id")
                .map_err(|err| store_failure("list_active_services_for_bridge", err))?;
            let roles = Self::roles_from_row(row)
                .map_err(|err| store_failure("list_active_services_for_bridge", err))?;
            for role in roles {
                services.push((service_id.clone(), role));
            }
        }
        Ok(services)
    }

    async fn list_services_by_role(
        &self,
        role: ServiceRole,
    ) -> Result<Vec<ServiceProfile>, GatewayError> {
        let query = format!(
            "SELECT service_id, name, active, is_provider, is_consumer, is_health_locker, endpoints \
             FROM bridge_service WHERE {} = TRUE",
            role_column(role)
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| store_failure("list_services_by_role", err))?;

        rows.iter()
            .map(|row| {
                Ok(ServiceProfile {
                    id: row.try_get("service_id")?,
                    name: row.try_get("name")?,
                    active: row.try_get("active")?,
                    roles: Self::roles_from_row(row)?,
                    endpoints: Self::endpoints_from_row(row)?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|err| store_failure("list_services_by_role", err))
    }

    async fn service_profile(
        &self,
        service_id: &str,
    ) -> Result<Option<ServiceProfile>, GatewayError> {
        let rows = sqlx::query(SELECT_SERVICES_BY_SERVICE_ID)
            .bind(service_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| store_failure("service_profile", err))?;

        Self::service_profile_from_rows(&rows).map_err(|err| store_failure("service_profile", err))
    }

    async fn bridge_profile(
        &self,
        bridge_id: &str,
    ) -> Result<Option<BridgeProfile>, GatewayError> {
        let row = sqlx::query(SELECT_BRIDGE_PROFILE)
            .bind(bridge_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| store_failure("bridge_profile", err))?;

        row.map(|row| {
            Ok(BridgeProfile {
                id: row.try_get("bridge_id")?,
                name: row.try_get("name")?,
                url: row.try_get("url")?,
                active: row.try_get("active")?,
                blocklisted: row.try_get("blocklisted")?,
                created_at: row.try_get::<DateTime<Utc>, _>("date_created")?,
                modified_at: row.try_get::<DateTime<Utc>, _>("date_modified")?,
            })
        })
        .transpose()
        .map_err(|err| store_failure("bridge_profile", err))
    }

    async fn resolve_consent_manager(
        &self,
        suffix: &str,
    ) -> Result<Option<RoutingEntry>, GatewayError> {
        let row = sqlx::query(RESOLVE_CM)
            .bind(suffix)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| store_failure("resolve_consent_manager", err))?;

        row.map(|row| {
            Ok(RoutingEntry {
                id: row.try_get("suffix")?,
                base_url: row.try_get("url")?,
                active: row.try_get("active")?,
                blocklisted: row.try_get("blocklisted")?,
            })
        })
        .transpose()
        .map_err(|err| store_failure("resolve_consent_manager", err))
    }

    async fn resolve_bridge_service(
        &self,
        service_id: &str,
        role: ServiceRole,
    ) -> Result<Option<RoutingEntry>, GatewayError> {
        let query = format!(
            "SELECT bridge_service.service_id, bridge.url, bridge.active, bridge.blocklisted \
             FROM bridge JOIN bridge_service ON bridge_service.bridge_id = bridge.bridge_id \
             WHERE bridge_service.service_id = $1 AND bridge_service.active = TRUE \
             AND bridge_service.{} = TRUE",
            role_column(role)
        );
        let row = sqlx::query(&query)
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| store_failure("resolve_bridge_service", err))?;

        row.map(|row| {
            Ok(RoutingEntry {
                id: row.try_get("service_id")?,
                base_url: row.try_get("url")?,
                active: row.try_get("active")?,
                blocklisted: row.try_get("blocklisted")?,
            })
        })
        .transpose()
        .map_err(|err| store_failure("resolve_bridge_service", err))
    }
}
