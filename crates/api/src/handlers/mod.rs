pub mod broadcast;
pub mod generations;
