pub use super::auth_record::Entity as AuthRecord;
