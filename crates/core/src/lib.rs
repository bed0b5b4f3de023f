#![forbid(unsafe_code)]

pub mod codec;
pub mod model;
pub mod ordering;
pub mod validate;
