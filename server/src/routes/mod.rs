// HTTP routes
pub mod debug;
pub mod health;
pub mod ingest;
pub mod results;

pub use debug::*;
pub use health::*;
pub use ingest::*;
pub use results::*;
