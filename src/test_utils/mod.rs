//! the test_utils folder here will share utils or test components between unit
//! tests of the bus and watch modules
mod common;

pub use common::*;
