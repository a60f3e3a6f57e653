pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod profiles;
pub mod routes;

pub use handlers::{ApiError, ErrorResponse};
pub use routes::create_router;
