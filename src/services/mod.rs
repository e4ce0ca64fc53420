pub mod access_policy;
pub mod chat_service;

pub use chat_service::ChatService;
