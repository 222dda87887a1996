// API module
//
// HTTP surface over a shared CubeChain handle

pub mod docs;
pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use docs::ApiDoc;
pub use routes::configure_routes;
