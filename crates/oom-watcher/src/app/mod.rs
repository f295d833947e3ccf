pub mod core;
pub mod tasks;

pub use self::core::Application;
