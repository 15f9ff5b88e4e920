pub mod invoice;
pub mod lease;
pub mod subscription;
