pub mod blob;
pub mod db;
pub mod types;
