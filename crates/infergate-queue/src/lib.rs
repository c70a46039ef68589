// Queue backends for the correlation engine

pub mod http;
pub mod memory;

pub use http::HttpQueueClient;
pub use memory::InMemoryQueue;
