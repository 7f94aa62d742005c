pub mod distance_table;
pub mod messages;
pub mod node;

pub use distance_table::*;
pub use messages::*;
pub use node::*;
