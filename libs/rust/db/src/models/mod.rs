pub mod prelude;

pub mod proposal;
