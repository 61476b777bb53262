pub mod check;
pub mod roles;
pub mod validate;
