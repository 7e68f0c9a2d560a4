pub mod converse;
pub mod mapping;
pub mod payload;
pub mod responses;
