// API request models
// Field names match the install form; engine-neutral names are accepted as aliases.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::database::connection::{ConnectionParameters, DatabaseEngine};
use crate::database::provisioning::AdminIdentity;
use crate::error::InstallError;

/// Connection fields shared by every install request.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConnectionRequest {
    /// mysql / postgres / sqlserver; falls back to the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(rename = "mysqlHost", alias = "host", default)]
    pub host: String,
    /// Kept as text so a malformed value can be reported instead of rejected by the decoder
    #[serde(
        rename = "mysqlPort",
        alias = "port",
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<String>,
    #[serde(rename = "mysqlSchema", alias = "schema", default)]
    pub schema: String,
    #[serde(rename = "mysqlUsername", alias = "username", default)]
    pub username: String,
    #[serde(rename = "mysqlPassword", alias = "password", default)]
    pub password: String,
}

impl fmt::Debug for InstallConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallConnectionRequest")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("schema", &self.schema)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl InstallConnectionRequest {
    /// Validate the raw form values into connection parameters. No I/O.
    pub fn to_parameters(
        &self,
        default_engine: DatabaseEngine,
    ) -> Result<ConnectionParameters, InstallError> {
        let engine = match self.engine.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.parse()?,
            _ => default_engine,
        };

        ConnectionParameters::from_raw(
            engine,
            &self.host,
            self.port.as_deref(),
            &self.schema,
            &self.username,
            &self.password,
        )
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAdminRequest {
    #[serde(flatten)]
    pub connection: InstallConnectionRequest,
    #[serde(rename = "adminUsername", default)]
    pub admin_username: String,
    #[serde(rename = "adminEmail", default)]
    pub admin_email: String,
    #[serde(rename = "adminPassword", default)]
    pub admin_password: String,
}

impl fmt::Debug for CreateAdminRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateAdminRequest")
            .field("connection", &self.connection)
            .field("admin_username", &self.admin_username)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &"***")
            .finish()
    }
}

impl CreateAdminRequest {
    pub fn identity(&self) -> AdminIdentity {
        AdminIdentity {
            username: self.admin_username.clone(),
            email: self.admin_email.clone(),
            password: self.admin_password.clone(),
        }
    }
}

/// Accept `"3306"`, `3306` or null for a port.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a port number or string, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn form_field_names_deserialize() {
        let req: InstallConnectionRequest = serde_json::from_str(
            r#"{"mysqlHost":"127.0.0.1","mysqlPort":"3306","mysqlSchema":"tank",
                "mysqlUsername":"root","mysqlPassword":"pw"}"#,
        )
        .unwrap();
        assert_eq!(req.host, "127.0.0.1");
        assert_eq!(req.port.as_deref(), Some("3306"));
        assert_eq!(req.schema, "tank");
    }

    #[test]
    fn engine_neutral_aliases_and_numeric_port() {
        let req: InstallConnectionRequest = serde_json::from_str(
            r#"{"engine":"postgres","host":"pg","port":5433,"schema":"tank","username":"u","password":"p"}"#,
        )
        .unwrap();
        let params = req.to_parameters(DatabaseEngine::MySql).unwrap();
        assert_eq!(params.engine, DatabaseEngine::Postgres);
        assert_eq!(params.port, Some(5433));
    }

    #[test]
    fn missing_engine_uses_default() {
        let req = InstallConnectionRequest {
            host: "db".to_string(),
            ..Default::default()
        };
        let params = req.to_parameters(DatabaseEngine::SqlServer).unwrap();
        assert_eq!(params.engine, DatabaseEngine::SqlServer);
        assert_eq!(params.effective_port(), 1433);
    }

    #[test]
    fn bad_port_and_engine_are_invalid_input() {
        let req = InstallConnectionRequest {
            host: "db".to_string(),
            port: Some("abc".to_string()),
            ..Default::default()
        };
        let err = req.to_parameters(DatabaseEngine::MySql).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let req = InstallConnectionRequest {
            engine: Some("oracle".to_string()),
            ..Default::default()
        };
        let err = req.to_parameters(DatabaseEngine::MySql).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn create_admin_flattens_connection_fields() {
        let req: CreateAdminRequest = serde_json::from_str(
            r#"{"mysqlHost":"db","mysqlSchema":"tank","adminUsername":"admin_1",
                "adminEmail":"a@b.com","adminPassword":"abcdef"}"#,
        )
        .unwrap();
        assert_eq!(req.connection.host, "db");
        let identity = req.identity();
        assert_eq!(identity.username, "admin_1");
        assert_eq!(identity.email, "a@b.com");
    }

    #[test]
    fn debug_hides_passwords() {
        let req = CreateAdminRequest {
            connection: InstallConnectionRequest {
                password: "db-secret".to_string(),
                ..Default::default()
            },
            admin_password: "admin-secret".to_string(),
            ..Default::default()
        };
        let debug = format!("{:?}", req);
        assert!(!debug.contains("db-secret"));
        assert!(!debug.contains("admin-secret"));
    }
}
