//! Generic entity services built on the authorization pipeline

pub mod crud;
pub mod hooks;
pub mod query_builder;
pub mod read;
pub mod request;

pub use crud::CrudService;
pub use hooks::{NoHooks, WriteHooks};
pub use query_builder::{ListParams, ListQuery, ListQueryBuilder};
pub use read::ReadService;
pub use request::{
    DeleteRequest, EntityFilter, GetHistoryRequest, GetListRequest, ListFilter, ListPage,
    UpdateMultipleRequest,
};
