pub mod up;
pub mod validate;
