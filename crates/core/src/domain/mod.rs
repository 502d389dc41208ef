pub mod billing;
pub mod customer;
pub mod plan;
pub mod subscription;
