pub(crate) mod convert;
pub(crate) mod listeners;
pub mod require;
