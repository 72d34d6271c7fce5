pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod schema;
pub mod server;
pub mod store;
pub mod wait;

use diesel_async::AsyncPgConnection;

/// Short-hand for the database pool type to use throughout the app.
pub type DbPool = diesel_async::pooled_connection::deadpool::Pool<AsyncPgConnection>;

pub type Conn = diesel_async::pooled_connection::deadpool::Object<AsyncPgConnection>;
