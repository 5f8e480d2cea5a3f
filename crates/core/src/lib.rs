pub mod config;
pub mod directory;
pub mod error;
pub mod import;
pub mod limits;
pub mod password;
pub mod registry;
pub mod roles;
pub mod types;
