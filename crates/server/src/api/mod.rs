pub mod handlers;
pub mod harvest;
pub mod middleware;
pub mod routes;

pub use routes::create_router;
