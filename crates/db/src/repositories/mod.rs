mod memory;
mod request;

pub use memory::InMemoryRequestRepository;
pub use request::SqlRequestRepository;
pub use travelink_core::repository::{RepositoryError, RequestRepository, Revision};
