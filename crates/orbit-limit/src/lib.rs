mod limiter;
pub use limiter::RateLimiter;
