pub mod advisor;
pub mod aggregate;
pub mod catalog;
pub mod db;
pub mod goals;
pub mod models;
pub mod service;
pub mod store;
