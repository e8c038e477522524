//! Business logic services

pub mod identity;
pub mod import_history;
pub mod import_lock;
pub mod import_processor;
pub mod record_store;
pub mod resolver;
pub mod spreadsheet;
pub mod validator;
