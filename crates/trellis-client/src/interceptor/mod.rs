//! Interceptor pipelines
//!
//! Outgoing requests flow through an ordered [`request::RequestInterceptorChain`]
//! before transport executes; the transport outcome flows through an ordered
//! [`response::ResponseInterceptorChain`] of staged success/failure hooks.

pub mod request;
pub mod response;
