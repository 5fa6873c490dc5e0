//! HTTP handlers for entity CRUD, procedures, views and read queries.

pub mod entity;
pub mod procedures;
pub mod queries;
pub mod views;
