//! Services: generic catalog-driven CRUD, transactional procedures, views and read queries.

mod crud;
pub mod procedures;
pub mod queries;
mod validation;
pub mod views;

pub use crud::{CrudService, ListParams};
pub use procedures::ProcedureService;
pub use queries::QueryService;
pub use validation::RequestValidator;
pub use views::{ViewService, VIEWS};
