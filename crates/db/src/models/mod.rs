//! Row structs for the database tables.

pub mod generation_job;
