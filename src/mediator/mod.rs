//! Schema-driven CRUD operations over a document store

pub mod crud;

pub use crud::{CrudHooks, CrudMediator, NoHooks};
