mod error;
pub use error::ApiError;

mod handler;
pub use handler::AdminHandler;

mod adapter;
pub use adapter::CoordinationAdapter;

mod http;
pub use http::HttpApi;

pub use axum;
