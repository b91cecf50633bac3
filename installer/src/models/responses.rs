// API response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::database::provisioning::{AdminAccount, UserRole};
use crate::error::{ErrorKind, InstallError};

/// Uniform envelope returned by every install handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured failure context: failing entity, migration progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            message: None,
            detail: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_kind: Some(kind),
            message: None,
            detail: None,
        }
    }

    pub fn from_error(err: &InstallError) -> Self {
        let detail = match err {
            InstallError::Migration(failure) => serde_json::to_value(failure).ok(),
            InstallError::SchemaInspection { entity, .. } => Some(json!({ "entity": entity })),
            _ => None,
        };
        Self {
            detail,
            ..Self::fail(err.kind(), err.to_string())
        }
    }

    pub fn from_result(result: Result<T, InstallError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }

    /// Status the router should answer with.
    pub fn status_code(&self) -> u16 {
        match self.error_kind {
            Some(kind) => kind.status_code(),
            None => 200,
        }
    }
}

/// Administrator as reported back to the operator. The password hash is never echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAccountDto {
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub create_time: DateTime<Utc>,
}

impl From<&AdminAccount> for AdminAccountDto {
    fn from(account: &AdminAccount) -> Self {
        Self {
            uuid: account.uuid.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role,
            create_time: account.create_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::migrator::MigrationFailure;

    #[test]
    fn success_envelope_omits_error_fields() {
        let json = serde_json::to_value(ApiResponse::ok("OK")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "OK");
        assert!(json.get("error").is_none());
        assert!(json.get("errorKind").is_none());
    }

    #[test]
    fn migration_failure_carries_partial_progress() {
        let err = InstallError::Migration(MigrationFailure {
            completed: vec!["tank20_dashboard".to_string()],
            failed: "tank20_download_token".to_string(),
            error: "disk full".to_string(),
        });
        let resp: ApiResponse<()> = ApiResponse::from_error(&err);
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["errorKind"], "MIGRATION_ERROR");
        assert_eq!(json["detail"]["failed"], "tank20_download_token");
        assert_eq!(json["detail"]["completed"][0], "tank20_dashboard");
        assert_eq!(resp.status_code(), 500);
    }

    #[test]
    fn invalid_input_maps_to_400() {
        let resp: ApiResponse<()> =
            ApiResponse::from_error(&InstallError::invalid_input("bad port"));
        assert_eq!(resp.status_code(), 400);
        assert_eq!(resp.error.as_deref(), Some("bad port"));
    }

    #[test]
    fn schema_inspection_detail_names_entity() {
        let resp: ApiResponse<()> =
            ApiResponse::from_error(&InstallError::schema_inspection("tank20_user", "denied"));
        assert_eq!(resp.detail.unwrap()["entity"], "tank20_user");
    }
}
