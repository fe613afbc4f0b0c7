pub mod directory_importer;
pub mod in_memory_identity_repository;
pub mod json_identity_repository;
