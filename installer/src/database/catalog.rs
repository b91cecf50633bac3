// Schema catalog
// Expected shape of every table the application depends on.

use serde::{Deserialize, Serialize};

/// Prefix shared by every application table.
pub const TABLE_PREFIX: &str = "tank20_";

/// Table that holds user accounts (administrators included).
pub const USER_TABLE: &str = "tank20_user";

/// Declared storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    /// 36-character textual UUID
    Uuid,
    /// Bounded string
    Varchar(u16),
    /// Unbounded text
    Text,
    Bool,
    Int,
    BigInt,
    DateTime,
    /// Attribute that points at another entity; never backed by a column
    Reference,
}

/// One field of an entity definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    pub db_name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub primary_key: bool,
    /// False for computed/virtual attributes the differ ignores
    pub physical: bool,
}

impl FieldDescriptor {
    /// A non-null storage column.
    pub fn column(name: &str, db_name: &str, field_type: FieldType) -> Self {
        FieldDescriptor {
            name: name.to_string(),
            db_name: db_name.to_string(),
            field_type,
            nullable: false,
            primary_key: false,
            physical: true,
        }
    }

    /// An attribute with no storage column behind it.
    pub fn virtual_attr(name: &str, field_type: FieldType) -> Self {
        FieldDescriptor {
            name: name.to_string(),
            db_name: String::new(),
            field_type,
            nullable: true,
            primary_key: false,
            physical: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Static description of one logical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        EntityDefinition {
            name: name.into(),
            fields,
        }
    }

    /// Fields backed by real storage columns, in declaration order.
    pub fn physical_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.physical)
    }

    pub fn virtual_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.physical)
    }

    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.physical_fields()
            .filter(|f| f.primary_key)
            .map(|f| f.db_name.as_str())
            .collect()
    }

    pub fn field_by_column(&self, db_name: &str) -> Option<&FieldDescriptor> {
        self.physical_fields().find(|f| f.db_name == db_name)
    }
}

/// Fixed, ordered sequence of the entities the application needs.
#[derive(Debug, Clone)]
pub struct Catalog {
    entities: Vec<EntityDefinition>,
}

impl Catalog {
    pub fn new(entities: Vec<EntityDefinition>) -> Self {
        Catalog { entities }
    }

    /// The application's own tables.
    pub fn standard() -> Self {
        Catalog::new(vec![
            dashboard(),
            download_token(),
            footprint(),
            image_cache(),
            matter(),
            preference(),
            session(),
            upload_token(),
            user(),
        ])
    }

    pub fn list_entities(&self) -> &[EntityDefinition] {
        &self.entities
    }

    pub fn find(&self, name: &str) -> Option<&EntityDefinition> {
        self.entities.iter().find(|e| e.name == name)
    }
}

fn table(name: &str) -> String {
    format!("{}{}", TABLE_PREFIX, name)
}

/// Columns every entity inherits.
fn base_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::column("uuid", "uuid", FieldType::Uuid).primary_key(),
        FieldDescriptor::column("sort", "sort", FieldType::BigInt),
        FieldDescriptor::column("updateTime", "update_time", FieldType::DateTime),
        FieldDescriptor::column("createTime", "create_time", FieldType::DateTime),
    ]
}

fn with_base(rest: Vec<FieldDescriptor>) -> Vec<FieldDescriptor> {
    let mut fields = base_fields();
    fields.extend(rest);
    fields
}

fn dashboard() -> EntityDefinition {
    EntityDefinition::new(
        table("dashboard"),
        with_base(vec![
            FieldDescriptor::column("invokeNum", "invoke_num", FieldType::BigInt),
            FieldDescriptor::column("totalInvokeNum", "total_invoke_num", FieldType::BigInt),
            FieldDescriptor::column("uv", "uv", FieldType::BigInt),
            FieldDescriptor::column("totalUv", "total_uv", FieldType::BigInt),
            FieldDescriptor::column("matterNum", "matter_num", FieldType::BigInt),
            FieldDescriptor::column("totalMatterNum", "total_matter_num", FieldType::BigInt),
            FieldDescriptor::column("fileSize", "file_size", FieldType::BigInt),
            FieldDescriptor::column("totalFileSize", "total_file_size", FieldType::BigInt),
            FieldDescriptor::column("avgCost", "avg_cost", FieldType::BigInt),
            FieldDescriptor::column("dt", "dt", FieldType::Varchar(45)),
        ]),
    )
}

fn download_token() -> EntityDefinition {
    EntityDefinition::new(
        table("download_token"),
        with_base(vec![
            FieldDescriptor::column("userUuid", "user_uuid", FieldType::Uuid),
            FieldDescriptor::column("matterUuid", "matter_uuid", FieldType::Uuid),
            FieldDescriptor::column("expireTime", "expire_time", FieldType::DateTime),
            FieldDescriptor::column("ip", "ip", FieldType::Varchar(128)),
        ]),
    )
}

fn footprint() -> EntityDefinition {
    EntityDefinition::new(
        table("footprint"),
        with_base(vec![
            FieldDescriptor::column("userUuid", "user_uuid", FieldType::Uuid),
            FieldDescriptor::column("ip", "ip", FieldType::Varchar(128)),
            FieldDescriptor::column("host", "host", FieldType::Varchar(45)),
            FieldDescriptor::column("uri", "uri", FieldType::Varchar(255)),
            FieldDescriptor::column("params", "params", FieldType::Text).nullable(),
            FieldDescriptor::column("cost", "cost", FieldType::Int),
            FieldDescriptor::column("success", "success", FieldType::Bool),
        ]),
    )
}

fn image_cache() -> EntityDefinition {
    EntityDefinition::new(
        table("image_cache"),
        with_base(vec![
            FieldDescriptor::column("userUuid", "user_uuid", FieldType::Uuid),
            FieldDescriptor::column("matterUuid", "matter_uuid", FieldType::Uuid),
            FieldDescriptor::column("mode", "mode", FieldType::Varchar(512)),
            FieldDescriptor::column("md5", "md5", FieldType::Varchar(45)),
            FieldDescriptor::column("size", "size", FieldType::BigInt),
            FieldDescriptor::column("path", "path", FieldType::Varchar(512)),
            FieldDescriptor::virtual_attr("matter", FieldType::Reference),
        ]),
    )
}

fn matter() -> EntityDefinition {
    EntityDefinition::new(
        table("matter"),
        with_base(vec![
            FieldDescriptor::column("puuid", "puuid", FieldType::Uuid),
            FieldDescriptor::column("userUuid", "user_uuid", FieldType::Uuid),
            FieldDescriptor::column("dir", "dir", FieldType::Bool),
            FieldDescriptor::column("alien", "alien", FieldType::Bool),
            FieldDescriptor::column("name", "name", FieldType::Varchar(255)),
            FieldDescriptor::column("md5", "md5", FieldType::Varchar(45)),
            FieldDescriptor::column("size", "size", FieldType::BigInt),
            FieldDescriptor::column("privacy", "privacy", FieldType::Bool),
            FieldDescriptor::column("path", "path", FieldType::Varchar(1024)),
            FieldDescriptor::column("times", "times", FieldType::BigInt),
            FieldDescriptor::virtual_attr("parent", FieldType::Reference),
            FieldDescriptor::virtual_attr("children", FieldType::Reference),
        ]),
    )
}

fn preference() -> EntityDefinition {
    EntityDefinition::new(
        table("preference"),
        with_base(vec![
            FieldDescriptor::column("name", "name", FieldType::Varchar(45)),
            FieldDescriptor::column("logoUrl", "logo_url", FieldType::Varchar(255)),
            FieldDescriptor::column("faviconUrl", "favicon_url", FieldType::Varchar(255)),
            FieldDescriptor::column("footerLine1", "footer_line1", FieldType::Varchar(1024)),
            FieldDescriptor::column("footerLine2", "footer_line2", FieldType::Varchar(1024)),
            FieldDescriptor::column("version", "version", FieldType::Varchar(45)),
        ]),
    )
}

fn session() -> EntityDefinition {
    EntityDefinition::new(
        table("session"),
        with_base(vec![
            FieldDescriptor::column("userUuid", "user_uuid", FieldType::Uuid),
            FieldDescriptor::column("ip", "ip", FieldType::Varchar(128)),
            FieldDescriptor::column("expireTime", "expire_time", FieldType::DateTime),
        ]),
    )
}

fn upload_token() -> EntityDefinition {
    EntityDefinition::new(
        table("upload_token"),
        with_base(vec![
            FieldDescriptor::column("userUuid", "user_uuid", FieldType::Uuid),
            FieldDescriptor::column("folderUuid", "folder_uuid", FieldType::Uuid),
            FieldDescriptor::column("matterUuid", "matter_uuid", FieldType::Uuid),
            FieldDescriptor::column("expireTime", "expire_time", FieldType::DateTime),
            FieldDescriptor::column("filename", "filename", FieldType::Varchar(255)),
            FieldDescriptor::column("privacy", "privacy", FieldType::Bool),
            FieldDescriptor::column("size", "size", FieldType::BigInt),
            FieldDescriptor::column("ip", "ip", FieldType::Varchar(128)),
        ]),
    )
}

fn user() -> EntityDefinition {
    EntityDefinition::new(
        USER_TABLE,
        with_base(vec![
            FieldDescriptor::column("role", "role", FieldType::Varchar(45)),
            FieldDescriptor::column("username", "username", FieldType::Varchar(45)),
            FieldDescriptor::column("password", "password", FieldType::Varchar(255)),
            FieldDescriptor::column("email", "email", FieldType::Varchar(45)),
            FieldDescriptor::column("phone", "phone", FieldType::Varchar(45)),
            FieldDescriptor::column("gender", "gender", FieldType::Varchar(45)),
            FieldDescriptor::column("city", "city", FieldType::Varchar(45)),
            FieldDescriptor::column("avatarUrl", "avatar_url", FieldType::Varchar(255)),
            FieldDescriptor::column("lastIp", "last_ip", FieldType::Varchar(128)),
            FieldDescriptor::column("lastTime", "last_time", FieldType::DateTime),
            FieldDescriptor::column("sizeLimit", "size_limit", FieldType::BigInt),
            FieldDescriptor::column("status", "status", FieldType::Varchar(45)),
        ]),
    )
}
