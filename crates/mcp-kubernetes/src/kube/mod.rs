pub mod context;
pub mod resources;
pub mod templates;

pub use context::ClientProvider;
