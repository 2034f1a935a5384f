pub mod auth_record;
pub mod prelude;
