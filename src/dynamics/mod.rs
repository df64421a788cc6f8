mod second_order;

pub use second_order::{Interpolatable, SecondOrderDynamics};
