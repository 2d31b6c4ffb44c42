#![allow(dead_code)]

pub mod builders;
pub mod mock_iterator;
pub mod strategies;

pub use builders::*;
pub use mock_iterator::*;
pub use strategies::*;
