//! Background tasks.

pub mod key_rotation;

pub use key_rotation::start_key_rotation_task;
