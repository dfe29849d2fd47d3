pub mod handler;
pub mod server;

pub use handler::{ApiError, ArticleHandler};
pub use server::{app, router, serve, serve_with_shutdown};
