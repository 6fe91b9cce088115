//! Step functions. Each takes the current message and returns the next one;
//! only fatal conditions come back as `Err`.

pub mod initialize;
pub mod nl_response;
pub mod reasoning;
pub mod schema_understanding;
pub mod sql_generation;
