use nalgebra::DMatrix;
use rand_chacha::ChaCha8Rng;

use super::layers::{Activation, BatchNorm1d, Dense, Dropout};
use super::loss::softmax;
use super::optim::Adam;
use crate::config::TrainerConfig;

#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    BatchNorm(BatchNorm1d),
    Dropout(Dropout),
}

impl Layer {
    fn infer(&self, x: &DMatrix<f32>) -> DMatrix<f32> {
        match self {
            Layer::Dense(l) => l.infer(x),
            Layer::BatchNorm(l) => l.infer(x),
            Layer::Dropout(l) => l.infer(x),
        }
    }

    fn forward_train(&mut self, x: &DMatrix<f32>, rng: &mut ChaCha8Rng) -> DMatrix<f32> {
        match self {
            Layer::Dense(l) => l.forward_train(x),
            Layer::BatchNorm(l) => l.forward_train(x),
            Layer::Dropout(l) => l.forward_train(x, rng),
        }
    }

    fn backward(&mut self, grad: &DMatrix<f32>) -> DMatrix<f32> {
        match self {
            Layer::Dense(l) => l.backward(grad),
            Layer::BatchNorm(l) => l.backward(grad),
            Layer::Dropout(l) => l.backward(grad),
        }
    }
}

/// Feed-forward classifier network producing logits
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    input_dim: usize,
    output_dim: usize,
}

impl Network {
    /// Dense(ReLU, L2) → BatchNorm → Dropout per hidden width, then a linear
    /// output layer.
    pub fn new(input_dim: usize, output_dim: usize, config: &TrainerConfig, rng: &mut ChaCha8Rng) -> Self {
        let mut layers = Vec::new();
        let mut width = input_dim;
        for (&units, &rate) in config.hidden_units.iter().zip(config.dropout.iter()) {
            layers.push(Layer::Dense(Dense::new(width, units, Activation::Relu, rng).with_l2(config.l2)));
            layers.push(Layer::BatchNorm(BatchNorm1d::new(units, config.bn_momentum, config.bn_epsilon)));
            layers.push(Layer::Dropout(Dropout::new(rate)));
            width = units;
        }
        layers.push(Layer::Dense(Dense::new(width, output_dim, Activation::Linear, rng)));
        Self { layers, input_dim, output_dim }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Trainable parameter count
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| match layer {
                Layer::Dense(d) => d.weights.len() + d.bias.len(),
                Layer::BatchNorm(b) => b.gamma.len() + b.beta.len(),
                Layer::Dropout(_) => 0,
            })
            .sum()
    }

    /// Training pass: batch statistics, dropout active, activations cached
    pub fn forward_train(&mut self, x: &DMatrix<f32>, rng: &mut ChaCha8Rng) -> DMatrix<f32> {
        self.layers
            .iter_mut()
            .fold(x.clone(), |h, layer| layer.forward_train(&h, rng))
    }

    /// Backpropagate logit gradients, accumulating parameter gradients
    pub fn backward(&mut self, grad_logits: &DMatrix<f32>) {
        self.layers
            .iter_mut()
            .rev()
            .fold(grad_logits.clone(), |g, layer| layer.backward(&g));
    }

    /// Sum of L2 penalties over regularized kernels
    pub fn l2_penalty(&self) -> f32 {
        self.layers
            .iter()
            .map(|layer| match layer {
                Layer::Dense(d) => d.weights.l2_penalty(),
                _ => 0.0,
            })
            .sum()
    }

    pub fn apply_gradients(&mut self, optimizer: &mut Adam) {
        optimizer.begin_step();
        for layer in self.layers.iter_mut() {
            match layer {
                Layer::Dense(d) => d.params_mut().into_iter().for_each(|p| optimizer.update(p)),
                Layer::BatchNorm(b) => b.params_mut().into_iter().for_each(|p| optimizer.update(p)),
                Layer::Dropout(_) => {}
            }
        }
    }

    /// Inference logits: running statistics, no dropout
    pub fn logits(&self, x: &DMatrix<f32>) -> DMatrix<f32> {
        self.layers.iter().fold(x.clone(), |h, layer| layer.infer(&h))
    }

    /// Inference probabilities, one row per input row
    pub fn predict_proba(&self, x: &DMatrix<f32>) -> DMatrix<f32> {
        softmax(&self.logits(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::loss::softmax_cross_entropy;
    use rand::SeedableRng;

    #[test]
    fn test_default_architecture() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let net = Network::new(36, 21, &TrainerConfig::default(), &mut rng);
        assert_eq!(net.layers().len(), 7);
        // 36*128+128 + 2*128 + 128*64+64 + 2*64 + 64*21+21
        assert_eq!(net.parameter_count(), 4736 + 256 + 8256 + 128 + 1365);
    }

    #[test]
    fn test_inference_is_deterministic_and_normalized() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let net = Network::new(4, 3, &TrainerConfig::default(), &mut rng);
        let x = DMatrix::from_row_slice(2, 4, &[0.1, 0.2, 0.3, 0.4, 1.0, 0.0, 0.5, 0.5]);
        let a = net.predict_proba(&x);
        assert_eq!(a, net.predict_proba(&x));
        for row in a.row_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_learns_separable_toy_problem() {
        let config = TrainerConfig { hidden_units: [16, 8], dropout: [0.0, 0.0], ..Default::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut net = Network::new(2, 2, &config, &mut rng);
        let mut adam = Adam::new(0.01, 0.9, 0.999, 1e-7);
        let x = DMatrix::from_row_slice(4, 2, &[0.0, 1.0, 0.1, 0.9, 1.0, 0.0, 0.9, 0.1]);
        let y = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0]);

        let (first, _, _) = softmax_cross_entropy(&net.forward_train(&x, &mut rng), &y);
        let mut last = first;
        for _ in 0..200 {
            let logits = net.forward_train(&x, &mut rng);
            let (loss, _, grad) = softmax_cross_entropy(&logits, &y);
            net.backward(&grad);
            net.apply_gradients(&mut adam);
            last = loss;
        }
        assert!(last < first * 0.5, "{first} -> {last}");
    }
}
