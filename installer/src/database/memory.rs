// In-memory storage engine for tests.
// Implements the same capability traits as a live connection, with failure injection.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::database::catalog::{Catalog, EntityDefinition, FieldDescriptor};
use crate::database::connection::{ConnectError, ConnectionParameters, DbConnector};
use crate::database::provisioning::AdminAccount;
use crate::database::storage::{AccountStore, SchemaStore, Session};
use crate::error::InstallError;

#[derive(Default)]
struct State {
    tables: BTreeMap<String, BTreeSet<String>>,
    accounts: BTreeMap<String, Vec<AdminAccount>>,
    tables_created: usize,
    columns_added: Vec<String>,
    fail_metadata: HashSet<String>,
    fail_ddl: HashSet<String>,
    fail_inserts: bool,
    fail_ping: bool,
    fail_close: bool,
    closes: usize,
}

/// Shared handle; clones see the same schema.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog table with every physical column except `missing`.
    pub fn create_table_without(&self, table: &str, missing: &[&str]) {
        let catalog = Catalog::standard();
        let entity = catalog.find(table).expect("table not in catalog");
        let columns = entity
            .physical_fields()
            .map(|f| f.db_name.clone())
            .filter(|c| !missing.contains(&c.as_str()))
            .collect();
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(table.to_string(), columns);
    }

    pub fn fail_metadata_for(&self, table: &str) {
        self.state.lock().unwrap().fail_metadata.insert(table.to_string());
    }

    pub fn fail_ddl_for(&self, table: &str) {
        self.state.lock().unwrap().fail_ddl.insert(table.to_string());
    }

    pub fn fail_inserts(&self) {
        self.state.lock().unwrap().fail_inserts = true;
    }

    pub fn fail_ping(&self) {
        self.state.lock().unwrap().fail_ping = true;
    }

    pub fn fail_close(&self) {
        self.state.lock().unwrap().fail_close = true;
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.state.lock().unwrap().tables.contains_key(table)
    }

    pub fn tables_created(&self) -> usize {
        self.state.lock().unwrap().tables_created
    }

    pub fn columns_added(&self) -> Vec<String> {
        self.state.lock().unwrap().columns_added.clone()
    }

    /// Number of structural changes applied so far.
    pub fn ddl_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.tables_created + state.columns_added.len()
    }

    pub fn accounts(&self, table: &str) -> Vec<AdminAccount> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl SchemaStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        if self.state.lock().unwrap().fail_ping {
            bail!("server has gone away");
        }
        Ok(())
    }

    async fn has_table(&self, table: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.fail_metadata.contains(table) {
            bail!("SELECT command denied on information_schema for {}", table);
        }
        Ok(state.tables.contains_key(table))
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.fail_metadata.contains(table) {
            bail!("SELECT command denied on information_schema for {}", table);
        }
        Ok(state
            .tables
            .get(table)
            .map(|cols| cols.contains(column))
            .unwrap_or(false))
    }

    async fn ensure_table(&self, entity: &EntityDefinition) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_ddl.contains(&entity.name) {
            bail!("CREATE command denied for table {}", entity.name);
        }
        if !state.tables.contains_key(&entity.name) {
            let columns = entity.physical_fields().map(|f| f.db_name.clone()).collect();
            state.tables.insert(entity.name.clone(), columns);
            state.tables_created += 1;
        }
        Ok(())
    }

    async fn ensure_column(&self, table: &str, field: &FieldDescriptor) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_ddl.contains(table) {
            bail!("ALTER command denied for table {}", table);
        }
        let added = match state.tables.get_mut(table) {
            Some(columns) => columns.insert(field.db_name.clone()),
            None => bail!("Table {} doesn't exist", table),
        };
        if added {
            state.columns_added.push(format!("{}.{}", table, field.db_name));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, table: &str, account: &AdminAccount) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_inserts {
            bail!("INSERT command denied for table {}", table);
        }
        state
            .accounts
            .entry(table.to_string())
            .or_default()
            .push(account.clone());
        Ok(())
    }
}

#[async_trait]
impl Session for MemoryStore {
    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.closes += 1;
        if state.fail_close {
            bail!("connection reset while closing");
        }
        Ok(())
    }
}

/// Hands out sessions over one shared `MemoryStore`.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
    opens: Arc<AtomicUsize>,
    refuse: bool,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            opens: Arc::new(AtomicUsize::new(0)),
            refuse: false,
        }
    }

    /// Connector whose every open fails as an unreachable server would.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DbConnector for MemoryConnector {
    async fn open(&self, params: &ConnectionParameters) -> Result<Box<dyn Session>, InstallError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        params.connection_string()?;
        if self.refuse {
            return Err(InstallError::Connection(ConnectError {
                user_message: "Unable to connect. Verify host, credentials, schema and network access."
                    .to_string(),
                internal_details: format!("connection refused: {}", params.host),
            }));
        }
        Ok(Box::new(self.store.clone()) as Box<dyn Session>)
    }
}
