// Infergate HTTP gateway
//
// Route modules follow the routes(state) convention and are merged into the
// server router by the binary.

pub mod health;
pub mod metrics;
pub mod predictions;
pub mod services;
pub mod sinks;
pub mod telemetry;
