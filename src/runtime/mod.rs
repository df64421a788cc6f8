//! Runtime records of active manipulations.

mod grab_info;
mod manipulation_info;

pub use grab_info::RuntimeGrabInfo;
pub use manipulation_info::RuntimeManipulationInfo;
