pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod websocket;

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::ChatService;
use crate::store::{
    MessageStore, OrderDirectory, PgMessageStore, PgOrderDirectory, PgUserDirectory, UserDirectory,
};
use crate::websocket::ConnectionManager;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub chat_service: ChatService,
    pub users: Arc<dyn UserDirectory>,
    pub connections: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let messages: Arc<dyn MessageStore> = Arc::new(PgMessageStore::new(pool.clone()));
        let users: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool.clone()));
        let orders: Arc<dyn OrderDirectory> = Arc::new(PgOrderDirectory::new(pool.clone()));
        Self::from_parts(pool, messages, users, orders)
    }

    /// Wire the state from explicit store implementations. Tests run
    /// the chat stack against in-memory stores through this.
    pub fn from_parts(
        pool: PgPool,
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
        orders: Arc<dyn OrderDirectory>,
    ) -> Self {
        let connections = Arc::new(ConnectionManager::new());
        let chat_service = ChatService::new(
            messages,
            users.clone(),
            orders,
            connections.clone(),
        );

        Self {
            pool,
            chat_service,
            users,
            connections,
        }
    }
}
