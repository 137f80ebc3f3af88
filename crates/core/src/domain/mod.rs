pub mod event;
pub mod request;
pub mod role;
pub mod status;
