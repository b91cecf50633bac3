// Install API endpoints
// One handler per install operation. Each turns a request into connection parameters,
// runs the operation, and wraps the outcome in the response envelope.

use log::info;

use crate::database::catalog::USER_TABLE;
use crate::database::differ::SchemaDiff;
use crate::database::provisioning::UserRole;
use crate::installation::{Installer, Operation};
use crate::models::requests::{CreateAdminRequest, InstallConnectionRequest};
use crate::models::responses::{AdminAccountDto, ApiResponse};

/// Path, operation and role the external router needs to dispatch a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub operation: Operation,
    pub role: UserRole,
}

pub fn routes() -> Vec<Route> {
    Operation::ALL
        .iter()
        .map(|&operation| Route {
            path: operation.path(),
            operation,
            role: operation.required_role(),
        })
        .collect()
}

pub fn find_route(path: &str) -> Option<Route> {
    routes().into_iter().find(|r| r.path == path)
}

pub async fn verify(installer: &Installer, req: &InstallConnectionRequest) -> ApiResponse<String> {
    info!("[PHASE: install] [STEP: verify] verify requested for {}", req.host);

    let params = match req.to_parameters(installer.default_engine()) {
        Ok(p) => p,
        Err(e) => return ApiResponse::from_error(&e),
    };
    match installer.verify(&params).await {
        Ok(_) => ApiResponse::ok("OK".to_string()),
        Err(e) => ApiResponse::from_error(&e),
    }
}

pub async fn table_info_list(
    installer: &Installer,
    req: &InstallConnectionRequest,
) -> ApiResponse<Vec<SchemaDiff>> {
    info!("[PHASE: install] [STEP: inspect] table info requested for {}", req.host);

    let params = match req.to_parameters(installer.default_engine()) {
        Ok(p) => p,
        Err(e) => return ApiResponse::from_error(&e),
    };
    ApiResponse::from_result(installer.inspect(&params).await)
}

pub async fn create_table(
    installer: &Installer,
    req: &InstallConnectionRequest,
) -> ApiResponse<Vec<SchemaDiff>> {
    info!("[PHASE: install] [STEP: migrate] table creation requested for {}", req.host);

    let params = match req.to_parameters(installer.default_engine()) {
        Ok(p) => p,
        Err(e) => return ApiResponse::from_error(&e),
    };
    ApiResponse::from_result(installer.migrate(&params).await)
}

pub async fn create_admin(
    installer: &Installer,
    req: &CreateAdminRequest,
) -> ApiResponse<AdminAccountDto> {
    info!(
        "[PHASE: install] [STEP: provision] administrator {} requested for {}",
        req.admin_username, req.connection.host
    );

    let params = match req.connection.to_parameters(installer.default_engine()) {
        Ok(p) => p,
        Err(e) => return ApiResponse::from_error(&e),
    };
    match installer.provision(&params, &req.identity()).await {
        Ok(account) => ApiResponse::ok_with_message(
            AdminAccountDto::from(&account),
            format!("Administrator created in {}", USER_TABLE),
        ),
        Err(e) => ApiResponse::from_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::Catalog;
    use crate::database::differ::SchemaDiffer;
    use crate::database::memory::{MemoryConnector, MemoryStore};
    use crate::database::migrator::Migrator;
    use crate::database::provisioning::AdminProvisioner;
    use crate::error::ErrorKind;
    use crate::security::password::Pbkdf2Hasher;
    use std::sync::Arc;

    fn installer(connector: MemoryConnector) -> Installer {
        Installer::new(
            Catalog::standard(),
            Arc::new(connector),
            SchemaDiffer::new(),
            Migrator::default(),
            AdminProvisioner::new(Arc::new(Pbkdf2Hasher::new(1_000).unwrap())),
        )
    }

    fn request(port: Option<&str>) -> InstallConnectionRequest {
        InstallConnectionRequest {
            engine: None,
            host: "127.0.0.1".to_string(),
            port: port.map(str::to_string),
            schema: "tank".to_string(),
            username: "root".to_string(),
            password: "pw".to_string(),
        }
    }

    #[test]
    fn route_table_matches_install_paths() {
        let paths: Vec<&str> = routes().iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                "/api/install/verify",
                "/api/install/table/info/list",
                "/api/install/create/table",
                "/api/install/create/admin",
            ]
        );
        assert_eq!(
            find_route("/api/install/create/table").map(|r| r.operation),
            Some(Operation::Migrate)
        );
        assert!(find_route("/api/install/unknown").is_none());
        assert!(routes().iter().all(|r| r.role == UserRole::Guest));
    }

    #[tokio::test]
    async fn malformed_port_fails_before_connecting() {
        let connector = MemoryConnector::new(MemoryStore::new());
        let installer = installer(connector.clone());

        for resp in [
            verify(&installer, &request(Some("abc"))).await.error_kind,
            table_info_list(&installer, &request(Some("abc"))).await.error_kind,
            create_table(&installer, &request(Some("abc"))).await.error_kind,
        ] {
            assert_eq!(resp, Some(ErrorKind::InvalidInput));
        }
        assert_eq!(connector.open_count(), 0);
    }

    #[tokio::test]
    async fn verify_returns_success_marker() {
        let installer = installer(MemoryConnector::new(MemoryStore::new()));
        let resp = verify(&installer, &request(None)).await;
        assert!(resp.success);
        assert_eq!(resp.data.as_deref(), Some("OK"));
        assert_eq!(resp.status_code(), 200);
    }

    #[tokio::test]
    async fn unreachable_database_is_connection_error() {
        let installer = installer(MemoryConnector::refusing());
        let resp = table_info_list(&installer, &request(Some("3306"))).await;
        assert!(!resp.success);
        assert_eq!(resp.error_kind, Some(ErrorKind::ConnectionError));
        assert_eq!(resp.status_code(), 500);
    }

    #[tokio::test]
    async fn table_list_then_create_converges() {
        let installer = installer(MemoryConnector::new(MemoryStore::new()));

        let listed = table_info_list(&installer, &request(None)).await;
        let listed = listed.data.unwrap();
        assert!(listed.iter().all(|d| !d.table_exists));

        let created = create_table(&installer, &request(None)).await;
        assert!(created.success);
        assert!(created.data.unwrap().iter().all(SchemaDiff::is_converged));
    }

    #[tokio::test]
    async fn create_admin_from_form_fields() {
        let store = MemoryStore::new();
        let installer = installer(MemoryConnector::new(store.clone()));
        let req: CreateAdminRequest = serde_json::from_value(serde_json::json!({
            "mysqlHost": "127.0.0.1",
            "mysqlPort": "3306",
            "mysqlSchema": "tank",
            "mysqlUsername": "root",
            "mysqlPassword": "pw",
            "adminUsername": "admin_1",
            "adminEmail": "a@b.com",
            "adminPassword": "abcdef",
        }))
        .unwrap();

        let resp = create_admin(&installer, &req).await;

        assert!(resp.success, "{:?}", resp.error);
        let dto = resp.data.unwrap();
        assert_eq!(dto.role, UserRole::Administrator);
        let stored = store.accounts(USER_TABLE);
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0].password, "abcdef");

        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("password").is_none());
    }

    #[tokio::test]
    async fn create_admin_rejects_short_password() {
        let installer = installer(MemoryConnector::new(MemoryStore::new()));
        let req = CreateAdminRequest {
            connection: request(None),
            admin_username: "admin_1".to_string(),
            admin_email: "a@b.com".to_string(),
            admin_password: "abc12".to_string(),
        };

        let resp = create_admin(&installer, &req).await;

        assert_eq!(resp.error_kind, Some(ErrorKind::InvalidInput));
        assert_eq!(resp.status_code(), 400);
    }
}
