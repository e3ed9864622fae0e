pub mod accounts_schema;
pub mod accounts_service;

pub use accounts_schema::{LoginRequest, RefreshRequest, RegisterRequest};
pub use accounts_service::{AccountsService, PASSWORDS_DO_NOT_MATCH};
