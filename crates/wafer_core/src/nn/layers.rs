//! Dense, batch-norm and dropout layers
//!
//! Rows are samples, columns are features. `forward_train` caches what
//! `backward` needs; `infer` takes `&self` and caches nothing.

use nalgebra::DMatrix;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::param::Param;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Linear,
}

/// Fully connected layer `y = act(x W + b)`
#[derive(Debug, Clone)]
pub struct Dense {
    pub weights: Param,
    pub bias: Param,
    activation: Activation,
    input: Option<DMatrix<f32>>,
    pre_activation: Option<DMatrix<f32>>,
}

impl Dense {
    /// He-uniform init: U(-sqrt(6 / fan_in), sqrt(6 / fan_in))
    pub fn new(inputs: usize, outputs: usize, activation: Activation, rng: &mut ChaCha8Rng) -> Self {
        let limit = (6.0 / inputs.max(1) as f32).sqrt();
        let weights = DMatrix::from_fn(inputs, outputs, |_, _| rng.gen_range(-limit..limit));
        Self {
            weights: Param::new("kernel", weights),
            bias: Param::new("bias", DMatrix::zeros(1, outputs)),
            activation,
            input: None,
            pre_activation: None,
        }
    }

    /// L2 penalty on the kernel only; biases stay unregularized
    pub fn with_l2(mut self, l2: f32) -> Self {
        self.weights = self.weights.with_decay(l2);
        self
    }

    pub fn inputs(&self) -> usize {
        self.weights.value.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.value.ncols()
    }

    fn affine(&self, x: &DMatrix<f32>) -> DMatrix<f32> {
        let mut z = x * &self.weights.value;
        for (j, b) in self.bias.value.iter().enumerate() {
            z.column_mut(j).add_scalar_mut(*b);
        }
        z
    }

    fn activate(&self, z: &DMatrix<f32>) -> DMatrix<f32> {
        match self.activation {
            Activation::Relu => z.map(|v| if v < 0.0 { 0.0 } else { v }),
            Activation::Linear => z.clone(),
        }
    }

    pub fn infer(&self, x: &DMatrix<f32>) -> DMatrix<f32> {
        self.activate(&self.affine(x))
    }

    pub fn forward_train(&mut self, x: &DMatrix<f32>) -> DMatrix<f32> {
        let z = self.affine(x);
        let y = self.activate(&z);
        self.input = Some(x.clone());
        self.pre_activation = Some(z);
        y
    }

    pub fn backward(&mut self, grad_output: &DMatrix<f32>) -> DMatrix<f32> {
        let (Some(x), Some(z)) = (self.input.take(), self.pre_activation.take()) else {
            return DMatrix::zeros(grad_output.nrows(), self.inputs());
        };
        let dz = match self.activation {
            Activation::Relu => grad_output.zip_map(&z, |g, v| if v > 0.0 { g } else { 0.0 }),
            Activation::Linear => grad_output.clone(),
        };
        self.weights.grad += x.transpose() * &dz;
        let bias_grad = DMatrix::from_fn(1, dz.ncols(), |_, j| dz.column(j).sum());
        self.bias.grad += bias_grad;
        dz * self.weights.value.transpose()
    }

    pub fn params_mut(&mut self) -> [&mut Param; 2] {
        [&mut self.weights, &mut self.bias]
    }
}

/// Per-feature batch normalization with running statistics for inference
#[derive(Debug, Clone)]
pub struct BatchNorm1d {
    pub gamma: Param,
    pub beta: Param,
    running_mean: Vec<f32>,
    running_var: Vec<f32>,
    momentum: f32,
    epsilon: f32,
    normalized: Option<DMatrix<f32>>,
    inv_std: Vec<f32>,
}

impl BatchNorm1d {
    pub fn new(features: usize, momentum: f32, epsilon: f32) -> Self {
        Self {
            gamma: Param::new("gamma", DMatrix::from_element(1, features, 1.0)),
            beta: Param::new("beta", DMatrix::zeros(1, features)),
            running_mean: vec![0.0; features],
            running_var: vec![1.0; features],
            momentum,
            epsilon,
            normalized: None,
            inv_std: Vec::new(),
        }
    }

    pub fn features(&self) -> usize {
        self.running_mean.len()
    }

    pub fn running_mean(&self) -> &[f32] {
        &self.running_mean
    }

    pub fn running_var(&self) -> &[f32] {
        &self.running_var
    }

    fn scale_shift(&self, xhat: &DMatrix<f32>) -> DMatrix<f32> {
        DMatrix::from_fn(xhat.nrows(), xhat.ncols(), |i, j| {
            xhat[(i, j)] * self.gamma.value[(0, j)] + self.beta.value[(0, j)]
        })
    }

    pub fn infer(&self, x: &DMatrix<f32>) -> DMatrix<f32> {
        let xhat = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| {
            (x[(i, j)] - self.running_mean[j]) / (self.running_var[j] + self.epsilon).sqrt()
        });
        self.scale_shift(&xhat)
    }

    pub fn forward_train(&mut self, x: &DMatrix<f32>) -> DMatrix<f32> {
        let n = x.nrows().max(1) as f32;
        let features = x.ncols();
        let mut xhat = DMatrix::zeros(x.nrows(), features);
        self.inv_std = vec![0.0; features];

        for j in 0..features {
            let col = x.column(j);
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
            let inv_std = 1.0 / (var + self.epsilon).sqrt();
            for i in 0..x.nrows() {
                xhat[(i, j)] = (x[(i, j)] - mean) * inv_std;
            }
            self.inv_std[j] = inv_std;
            self.running_mean[j] = self.momentum * self.running_mean[j] + (1.0 - self.momentum) * mean;
            self.running_var[j] = self.momentum * self.running_var[j] + (1.0 - self.momentum) * var;
        }

        let y = self.scale_shift(&xhat);
        self.normalized = Some(xhat);
        y
    }

    pub fn backward(&mut self, grad_output: &DMatrix<f32>) -> DMatrix<f32> {
        let Some(xhat) = self.normalized.take() else {
            return DMatrix::zeros(grad_output.nrows(), grad_output.ncols());
        };
        let rows = grad_output.nrows();
        let n = rows.max(1) as f32;
        let mut dx = DMatrix::zeros(rows, grad_output.ncols());

        for j in 0..grad_output.ncols() {
            let gamma = self.gamma.value[(0, j)];
            let mut sum_dy = 0.0;
            let mut sum_dy_xhat = 0.0;
            for i in 0..rows {
                sum_dy += grad_output[(i, j)];
                sum_dy_xhat += grad_output[(i, j)] * xhat[(i, j)];
            }
            self.gamma.grad[(0, j)] += sum_dy_xhat;
            self.beta.grad[(0, j)] += sum_dy;

            let scale = gamma * self.inv_std[j] / n;
            for i in 0..rows {
                dx[(i, j)] = scale * (n * grad_output[(i, j)] - sum_dy - xhat[(i, j)] * sum_dy_xhat);
            }
        }
        dx
    }

    pub fn params_mut(&mut self) -> [&mut Param; 2] {
        [&mut self.gamma, &mut self.beta]
    }
}

/// Inverted dropout; identity at inference
#[derive(Debug, Clone)]
pub struct Dropout {
    rate: f32,
    mask: Option<DMatrix<f32>>,
}

impl Dropout {
    pub fn new(rate: f32) -> Self {
        Self { rate, mask: None }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn infer(&self, x: &DMatrix<f32>) -> DMatrix<f32> {
        x.clone()
    }

    pub fn forward_train(&mut self, x: &DMatrix<f32>, rng: &mut ChaCha8Rng) -> DMatrix<f32> {
        if self.rate <= 0.0 {
            self.mask = None;
            return x.clone();
        }
        let keep_scale = 1.0 / (1.0 - self.rate);
        let mask = DMatrix::from_fn(x.nrows(), x.ncols(), |_, _| {
            if rng.gen::<f32>() >= self.rate {
                keep_scale
            } else {
                0.0
            }
        });
        let y = x.component_mul(&mask);
        self.mask = Some(mask);
        y
    }

    pub fn backward(&mut self, grad_output: &DMatrix<f32>) -> DMatrix<f32> {
        match self.mask.take() {
            Some(mask) => grad_output.component_mul(&mask),
            None => grad_output.clone(),
        }
    }
}
