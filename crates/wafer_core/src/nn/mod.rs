//! Small dense network on `nalgebra` matrices
//!
//! Just enough to train the pattern classifier: dense, batch-norm and dropout
//! layers, softmax cross-entropy and Adam.

pub mod layers;
pub mod loss;
pub mod optim;
pub mod param;

mod network;

pub use layers::{Activation, BatchNorm1d, Dense, Dropout};
pub use loss::{argmax_rows, softmax, softmax_cross_entropy};
pub use network::{Layer, Network};
pub use optim::Adam;
pub use param::Param;
