//! Command transports for inventory switches

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use ztpflow_actions::TransportFactory;
use ztpflow_exec::{
    ConnectionInfo, Credentials, ExecError, LocalExecutor, RemoteExecutor, SshExecutor,
};
use ztpflow_inventory::Inventory;

/// Hands out one transport per switch, reused across stages
///
/// Group actions and switches whose address is the local machine run
/// through `sh -c`; everything else goes over SSH.
pub struct InventoryTransports {
    inventory: Arc<Inventory>,
    credentials: Arc<Credentials>,
    default_user: String,
    local: Arc<dyn RemoteExecutor>,
    cache: Mutex<HashMap<String, Arc<dyn RemoteExecutor>>>,
}

impl InventoryTransports {
    /// Create a factory over `inventory`
    pub fn new(
        inventory: Arc<Inventory>,
        credentials: Arc<Credentials>,
        default_user: impl Into<String>,
    ) -> Self {
        Self {
            inventory,
            credentials,
            default_user: default_user.into(),
            local: Arc::new(LocalExecutor::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn create(&self, name: &str) -> Result<Arc<dyn RemoteExecutor>, ExecError> {
        let entry = self.inventory.host(name).ok_or_else(|| {
            ExecError::Credentials(format!("switch {name} is not in the inventory"))
        })?;

        if entry.is_local() {
            return Ok(Arc::clone(&self.local));
        }

        let user = entry
            .user
            .clone()
            .or_else(|| self.credentials.username.clone())
            .unwrap_or_else(|| self.default_user.clone());
        let conn_info = ConnectionInfo::new(entry.address(), user).with_port(entry.port);
        debug!(
            switch = %name,
            addr = %conn_info.host,
            port = conn_info.port,
            "creating SSH transport"
        );
        Ok(Arc::new(SshExecutor::new(conn_info, Arc::clone(&self.credentials))))
    }
}

#[async_trait]
impl TransportFactory for InventoryTransports {
    async fn transport(&self, host: Option<&str>) -> Result<Arc<dyn RemoteExecutor>, ExecError> {
        let Some(name) = host else {
            return Ok(Arc::clone(&self.local));
        };

        let mut cache = self.cache.lock().await;
        if let Some(existing) = cache.get(name) {
            return Ok(Arc::clone(existing));
        }
        let transport = self.create(name)?;
        cache.insert(name.to_string(), Arc::clone(&transport));
        Ok(transport)
    }
}
