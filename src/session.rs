use std::sync::{Arc, Mutex, Weak};

use crate::{
    catalog::GameCatalog,
    clan::ClanManager,
    equipment::EquipmentManager,
    error::{SyncError, connection_error},
    guard::GuardTable,
    inventory::InventoryManager,
    notify::{Notification, NotificationSink},
    progress::ProgressManager,
    task::{TaskDependencies, TaskManager},
    transport::{
        connection::{ConnectionState, Transport},
        ports::OutboundPort,
        registry::{DisconnectInfo, ListenerId},
        wire::{Authenticate, ClientRecord, ServerRecord, tags},
    },
};

pub const SESSION_CREDENTIAL_ENV: &str = "IDLELINK_SESSION_CREDENTIAL";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub session_credential: String,
    pub client_version: String,
    pub config_version: u32,
    pub placeholders: bool,
}

/// Outbound handle that does not keep the transport alive. Managers live in
/// listener closures owned by the transport's registry.
struct WeakOutbound(Weak<Transport>);

impl OutboundPort for WeakOutbound {
    fn send(&self, record: &ClientRecord) -> Result<(), SyncError> {
        let transport = self
            .0
            .upgrade()
            .ok_or_else(|| connection_error("transport dropped"))?;
        transport.send(record)
    }
}

/// One player session: the transport plus every domain manager wired to it.
pub struct GameClient {
    transport: Arc<Transport>,
    guards: GuardTable,
    inventory: InventoryManager,
    equipment: EquipmentManager,
    progress: ProgressManager,
    tasks: TaskManager,
    clan: ClanManager,
    listeners: Mutex<Vec<ListenerId>>,
}

impl GameClient {
    pub fn new(
        transport: Arc<Transport>,
        catalog: Arc<dyn GameCatalog>,
        guards: GuardTable,
        notifier: Arc<dyn NotificationSink>,
        options: SessionOptions,
    ) -> Self {
        let outbound: Arc<dyn OutboundPort> = Arc::new(WeakOutbound(Arc::downgrade(&transport)));

        let inventory = InventoryManager::new(
            Arc::clone(&catalog),
            Arc::clone(&outbound),
            guards.clone(),
            Arc::clone(&notifier),
            options.placeholders,
        );
        let equipment = EquipmentManager::new(
            Arc::clone(&catalog),
            inventory.clone(),
            Arc::clone(&outbound),
            guards.clone(),
            Arc::clone(&notifier),
        );
        let progress = ProgressManager::new(Arc::clone(&catalog), Arc::clone(&notifier));
        let tasks = TaskManager::new(TaskDependencies {
            catalog,
            inventory: inventory.clone(),
            equipment: equipment.clone(),
            progress: progress.clone(),
            outbound: Arc::clone(&outbound),
            guards: guards.clone(),
            notifier: Arc::clone(&notifier),
        });
        let clan = ClanManager::new(outbound, guards.clone(), Arc::clone(&notifier));

        let client = Self {
            transport,
            guards,
            inventory,
            equipment,
            progress,
            tasks,
            clan,
            listeners: Mutex::new(Vec::new()),
        };
        let listeners = client.install(notifier, options);
        *client.listeners.lock().expect("lock poisoned") = listeners;
        client
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn guards(&self) -> &GuardTable {
        &self.guards
    }

    pub fn inventory(&self) -> &InventoryManager {
        &self.inventory
    }

    pub fn equipment(&self) -> &EquipmentManager {
        &self.equipment
    }

    pub fn progress(&self) -> &ProgressManager {
        &self.progress
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn clan(&self) -> &ClanManager {
        &self.clan
    }

    pub fn connect(&self, url: &str) -> Result<(), SyncError> {
        self.transport.connect(url)
    }

    pub fn close(&self) -> Result<(), SyncError> {
        self.transport.close()
    }

    /// Removes every listener this session installed. Returns how many were
    /// still registered.
    pub fn shutdown(&self) -> usize {
        let ids = std::mem::take(&mut *self.listeners.lock().expect("lock poisoned"));
        let removed = self.transport.registry().unregister_all(ids);
        tracing::info!(target: "session", removed = removed, "session_listeners_removed");
        removed
    }

    fn install(&self, notifier: Arc<dyn NotificationSink>, options: SessionOptions) -> Vec<ListenerId> {
        let registry = self.transport.registry();
        let mut ids = Vec::new();
        ids.extend(self.inventory.install(registry));
        ids.extend(self.equipment.install(registry));
        ids.extend(self.progress.install(registry));
        ids.extend(self.tasks.install(registry));
        ids.extend(self.clan.install(registry));

        let transport = Arc::downgrade(&self.transport);
        ids.push(registry.register_connect(move || {
            let Some(transport) = transport.upgrade() else {
                return;
            };
            let record = ClientRecord::Authenticate(Authenticate {
                session_credential: options.session_credential.clone(),
                client_version: options.client_version.clone(),
                config_version: options.config_version,
            });
            match transport.send(&record) {
                Ok(()) => tracing::info!(target: "session", "authenticate_sent"),
                Err(err) => tracing::error!(
                    target: "session",
                    error = %err,
                    "authenticate_send_failed"
                ),
            }
        }));

        let guards = self.guards.clone();
        let (inventory, equipment, progress, tasks, clan) = (
            self.inventory.clone(),
            self.equipment.clone(),
            self.progress.clone(),
            self.tasks.clone(),
            self.clan.clone(),
        );
        ids.push(registry.register_disconnect(move |info: &DisconnectInfo| {
            tracing::info!(
                target: "session",
                code = info.code,
                reason = %info.reason,
                was_connected = info.was_connected,
                "session_state_discarded"
            );
            tasks.reset();
            clan.reset();
            equipment.reset();
            inventory.reset();
            progress.reset();
            guards.clear();
        }));

        ids.push(registry.register_error(|reason| {
            tracing::debug!(target: "session", reason = %reason, "link_error_observed");
        }));

        ids.push(registry.register_packet(tags::SERVER_ERROR, move |record| {
            if let ServerRecord::ServerError { message, code } = record {
                tracing::warn!(
                    target: "session",
                    code = ?code,
                    message = %message,
                    "server_error_received"
                );
                notifier.notify(Notification::ServerError {
                    message: message.clone(),
                    code: code.clone(),
                });
            }
        }));

        ids
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        let listeners = self
            .listeners
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let ids = std::mem::take(listeners);
        if !ids.is_empty() {
            self.transport.registry().unregister_all(ids);
        }
    }
}
