pub use self::queue::{IntoIter, Queue};

mod queue;
