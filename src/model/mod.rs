//! Build request model

mod request;
mod validate;

pub use request::*;
pub use validate::validate_request;
