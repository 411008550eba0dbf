//! Policy evaluation port and the tensor seam the objectives use.

pub mod port;
pub mod tensor;

pub use port::{Evaluation, PolicyPort, Prediction};
pub use tensor::{HostTensor, LossTensor};
