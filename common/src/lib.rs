pub mod buffer3;
pub mod log_setup;
