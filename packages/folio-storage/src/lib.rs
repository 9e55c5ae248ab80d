pub mod chunks;
pub mod collections;
pub mod db;
pub mod memory;
pub mod models;
pub mod principals;
pub mod schema;
pub mod store;
pub mod vector;

mod error;

pub use error::Error;
pub use store::{BoxFuture, CreateMode, CreateOutcome, NearestQuery, SchemaState, Store};

pub type Result<T, E = Error> = std::result::Result<T, E>;
