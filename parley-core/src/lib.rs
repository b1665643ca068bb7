pub mod error;
pub mod ids;
pub mod model;
pub mod utils;

pub use error::{Error, Result};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use model::*;
