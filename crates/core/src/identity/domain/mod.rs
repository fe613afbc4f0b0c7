pub mod identity;
pub mod identity_repository;
pub mod identity_store;
pub mod matcher;
