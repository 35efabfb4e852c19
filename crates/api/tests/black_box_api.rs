use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use stratum_api::app::{build_app, AppDeps};
use stratum_audit::{AuditAction, AuditRecord, UNKNOWN_ACTOR};
use stratum_auth::{
    AccountDirectory, Hs256TokenVerifier, ManagedTable, PermissionScope, PermissionStore, TablePermission,
    TenantAccount, TokenClaims, TokenStrategy, UserAccount,
};
use stratum_core::{
    Environment, RoleId, StoreError, StoreResult, SystemClock, TenantId, UserId, UuidGenerator,
};
use stratum_infra::{
    DatabaseHealth, InMemoryAccountDirectory, InMemoryAuditStore, InMemoryPermissionStore, StaticHealthProbe,
};

const SECRET: &str = "black-box-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(deps: AppDeps) -> Self {
        // Same router as prod, bound to an ephemeral port with peer addresses.
        let app = build_app(deps);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Account {
    user_id: UserId,
    tenant_id: TenantId,
    role_id: RoleId,
}

impl Account {
    fn token(&self) -> String {
        let now = Utc::now();
        let claims = TokenClaims::for_user(
            self.user_id,
            self.tenant_id,
            self.role_id,
            now,
            now + ChronoDuration::minutes(10),
        );
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("failed to encode jwt")
    }
}

/// Tenant A: an admin with full access and a viewer who may only read their
/// own user record. Tenant B: one admin.
struct World {
    directory: Arc<InMemoryAccountDirectory>,
    permissions: Arc<InMemoryPermissionStore>,
    audit: Arc<InMemoryAuditStore>,
    admin: Account,
    viewer: Account,
    outsider: Account,
}

impl World {
    async fn new() -> Self {
        let directory = Arc::new(InMemoryAccountDirectory::new());
        let permissions = Arc::new(InMemoryPermissionStore::new());

        let tenant_a = add_tenant(&directory, "Acme");
        let tenant_b = add_tenant(&directory, "Globex");
        let admin = add_user(&directory, tenant_a, "admin@acme.test");
        let viewer = add_user(&directory, tenant_a, "viewer@acme.test");
        let outsider = add_user(&directory, tenant_b, "admin@globex.test");

        for user in [admin.user_id, outsider.user_id] {
            for table in ManagedTable::ALL {
                permissions
                    .upsert(user, table.table_name(), TablePermission::full(PermissionScope::All))
                    .await
                    .unwrap();
            }
        }
        permissions
            .upsert(
                viewer.user_id,
                "users",
                TablePermission {
                    can_read: true,
                    scope: PermissionScope::Own,
                    ..TablePermission::default()
                },
            )
            .await
            .unwrap();

        Self {
            directory,
            permissions,
            audit: Arc::new(InMemoryAuditStore::new()),
            admin,
            viewer,
            outsider,
        }
    }

    fn deps(&self, directory: Arc<dyn AccountDirectory>) -> AppDeps {
        AppDeps {
            environment: Environment::Test,
            strategy: Arc::new(TokenStrategy::new(
                Arc::new(Hs256TokenVerifier::new(SECRET.as_bytes())),
                directory.clone(),
                Arc::new(SystemClock),
            )),
            permissions: self.permissions.clone(),
            directory,
            audit: self.audit.clone(),
            health: Arc::new(DatabaseHealth::new(Arc::new(StaticHealthProbe { healthy: true }))),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            cors_origins: Vec::new(),
        }
    }

    async fn serve(&self) -> TestServer {
        TestServer::spawn(self.deps(self.directory.clone())).await
    }

    async fn audit_records(&self, n: usize) -> Vec<AuditRecord> {
        // Audit writes are fire-and-forget; poll briefly.
        for _ in 0..50 {
            let records = self.audit.snapshot();
            if records.len() >= n {
                return records;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.audit.snapshot()
    }
}

fn add_tenant(directory: &InMemoryAccountDirectory, name: &str) -> TenantId {
    let id = TenantId::new();
    directory.insert_tenant(TenantAccount {
        id,
        name: name.to_string(),
        is_active: true,
    });
    id
}

fn add_user(directory: &InMemoryAccountDirectory, tenant_id: TenantId, email: &str) -> Account {
    let account = Account {
        user_id: UserId::new(),
        tenant_id,
        role_id: RoleId::new(),
    };
    directory.insert_user(UserAccount {
        id: account.user_id,
        email: email.to_string(),
        tenant_id,
        role_id: account.role_id,
        is_active: true,
    });
    account
}

/// Directory whose backing database refuses connections.
struct UnreachableDirectory;

#[async_trait]
impl AccountDirectory for UnreachableDirectory {
    async fn find_user(&self, _id: UserId) -> StoreResult<Option<UserAccount>> {
        Err(StoreError::backend("connect ECONNREFUSED 127.0.0.1:5432"))
    }

    async fn find_tenant(&self, _id: TenantId) -> StoreResult<Option<TenantAccount>> {
        Err(StoreError::backend("connect ECONNREFUSED 127.0.0.1:5432"))
    }
}

#[tokio::test]
async fn health_is_public_and_carries_a_request_id() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let request_id = res.headers().get("x-request-id").unwrap().to_str().unwrap().to_string();
    assert!(!request_id.is_empty());

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"]["healthy"], true);
}

#[tokio::test]
async fn inbound_request_id_is_echoed_on_errors() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/whoami"))
        .header("x-request-id", "req-abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers().get("x-request-id").unwrap(), "req-abc-123");

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["requestId"], "req-abc-123");
}

#[tokio::test]
async fn missing_credentials_are_401_and_audited_as_login() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/permissions/me"))
        .header("user-agent", "black-box/1.0")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["error"]["message"], "Unauthorized");
    assert_eq!(body["error"]["path"], "/permissions/me");
    assert!(body["error"]["timestamp"].is_string());

    let records = world.audit_records(1).await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.action, AuditAction::Login);
    assert_eq!(record.entity_id, UNKNOWN_ACTOR);
    assert_eq!(record.user_id, None);
    assert_eq!(record.tenant_id, None);
    assert_eq!(record.user_agent, "black-box/1.0");
    assert_eq!(record.ip_address, "127.0.0.1");
    assert_eq!(record.changes["status"], 401);
    assert_eq!(record.changes["path"], "/permissions/me");
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/whoami"))
        .header("authorization", "Token xyz")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/whoami"))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_returns_the_resolved_principal() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/whoami"))
        .bearer_auth(world.admin.token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["id"], world.admin.user_id.to_string());
    assert_eq!(body["tenantId"], world.admin.tenant_id.to_string());
    assert_eq!(body["email"], "admin@acme.test");

    let res = client
        .get(server.url("/health/auth"))
        .bearer_auth(world.admin.token())
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["strategy"], "token");
}

#[tokio::test]
async fn insufficient_scope_is_403_and_audited_as_access() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    // OWN read satisfies /permissions/me ...
    let res = client
        .get(server.url("/permissions/me"))
        .bearer_auth(world.viewer.token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["permissions"]["users"]["canRead"], true);
    assert_eq!(body["permissions"]["users"]["scope"], "OWN");

    // ... but not the ALL requirement on /permissions/tables.
    let res = client
        .get(server.url("/permissions/tables"))
        .bearer_auth(world.viewer.token())
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(body["error"]["message"], "Insufficient permissions");

    let records = world.audit_records(1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Access);
    assert_eq!(records[0].user_id, Some(world.viewer.user_id));
    assert_eq!(records[0].tenant_id, Some(world.viewer.tenant_id));
    assert_eq!(records[0].ip_address, "203.0.113.7");
}

#[tokio::test]
async fn own_scope_covers_own_record_only() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    let own = client
        .get(server.url(&format!("/permissions/user/{}", world.viewer.user_id)))
        .bearer_auth(world.viewer.token())
        .send()
        .await
        .unwrap();
    assert_eq!(own.status(), StatusCode::OK);

    let other = client
        .get(server.url(&format!("/permissions/user/{}", world.admin.user_id)))
        .bearer_auth(world.viewer.token())
        .send()
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn head_is_guarded_like_get() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    for path in ["/audit-logs", "/permissions/tables"] {
        let res = client
            .head(server.url(path))
            .bearer_auth(world.viewer.token())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "HEAD {path}");
    }

    let res = client.head(server.url("/audit-logs")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .head(server.url("/audit-logs"))
        .bearer_auth(world.admin.token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.head(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_404_and_not_audited() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/no-such-thing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "Cannot GET /no-such-thing");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(world.audit.snapshot().is_empty());
}

#[tokio::test]
async fn replace_rejects_invalid_tables_without_writing() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();
    let before = world.permissions.row_count();

    let res = client
        .patch(server.url(&format!("/permissions/user/{}", world.viewer.user_id)))
        .bearer_auth(world.admin.token())
        .json(&json!({
            "permissions": [
                { "tableName": "tenants", "canCreate": false, "canRead": true, "canUpdate": false, "canDelete": false, "scope": "ALL" },
                { "tableName": "payroll", "canCreate": true, "canRead": true, "canUpdate": true, "canDelete": true, "scope": "ALL" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Invalid table name: payroll");
    assert_eq!(world.permissions.row_count(), before);
}

#[tokio::test]
async fn replace_overwrites_and_revokes_omitted_tables() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    let res = client
        .patch(server.url(&format!("/permissions/user/{}", world.viewer.user_id)))
        .bearer_auth(world.admin.token())
        .json(&json!({
            "permissions": [
                { "tableName": "tenants", "canCreate": false, "canRead": true, "canUpdate": true, "canDelete": false, "scope": "OWN" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["userId"], world.viewer.user_id.to_string());
    let permissions = body["permissions"].as_object().unwrap();
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions["tenants"]["canUpdate"], true);
    assert!(!permissions.contains_key("users"));

    // The viewer's users grant was revoked, so /permissions/me now fails.
    let res = client
        .get(server.url("/permissions/me"))
        .bearer_auth(world.viewer.token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn grant_and_revoke_single_table() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();
    let path = format!("/permissions/user/{}/audit_logs", world.viewer.user_id);

    let res = client
        .put(server.url(&path))
        .bearer_auth(world.admin.token())
        .json(&json!({ "canRead": true, "scope": "ALL" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tableName"], "audit_logs");
    assert_eq!(body["permission"]["canRead"], true);
    assert_eq!(body["permission"]["canDelete"], false);

    let res = client
        .delete(server.url(&path))
        .bearer_auth(world.admin.token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let remaining = world.permissions.find_one(world.viewer.user_id, "audit_logs").await.unwrap();
    assert_eq!(remaining, None);
}

#[tokio::test]
async fn users_of_other_tenants_are_not_found() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url(&format!("/permissions/user/{}", world.viewer.user_id)))
        .bearer_auth(world.outsider.token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["message"], "User not found");
}

#[tokio::test]
async fn deactivated_user_loses_access_immediately() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();
    let token = world.viewer.token();

    world.directory.set_user_active(world.viewer.user_id, false);

    let res = client
        .get(server.url("/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unreachable_directory_is_503_and_not_audited() {
    let world = World::new().await;
    let server = TestServer::spawn(world.deps(Arc::new(UnreachableDirectory))).await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/whoami"))
        .bearer_auth(world.admin.token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "DATABASE_UNAVAILABLE");
    assert!(!body.to_string().contains("ECONNREFUSED"));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(world.audit.snapshot().is_empty());
}

#[tokio::test]
async fn tenant_audit_log_lists_newest_first() {
    let world = World::new().await;
    let server = world.serve().await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let res = client
            .get(server.url("/permissions/tables"))
            .bearer_auth(world.viewer.token())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
    assert_eq!(world.audit_records(2).await.len(), 2);

    let res = client
        .get(server.url("/audit-logs?page=1&limit=1"))
        .bearer_auth(world.admin.token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["limit"], 1);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["action"], "ACCESS");

    // Another tenant sees none of them.
    let res = client
        .get(server.url("/audit-logs"))
        .bearer_auth(world.outsider.token())
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
}
