pub mod chat_dto;
