pub mod connection;
pub mod project;
pub mod taxonomy;

pub use connection::CloudConnectionRepository;
pub use project::ProjectRepository;
pub use taxonomy::TaxonomyRepository;
