pub mod authz;
pub mod password;
