use nalgebra::DMatrix;

/// Trainable tensor with its gradient and Adam moments
#[derive(Debug, Clone)]
pub struct Param {
    pub name: &'static str,
    pub value: DMatrix<f32>,
    pub grad: DMatrix<f32>,
    pub(crate) m: DMatrix<f32>,
    pub(crate) v: DMatrix<f32>,
    /// L2 coefficient; the penalty is `decay * Σ w²`
    pub decay: f32,
}

impl Param {
    pub fn new(name: &'static str, value: DMatrix<f32>) -> Self {
        let (r, c) = value.shape();
        Self {
            name,
            value,
            grad: DMatrix::zeros(r, c),
            m: DMatrix::zeros(r, c),
            v: DMatrix::zeros(r, c),
            decay: 0.0,
        }
    }

    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    pub fn l2_penalty(&self) -> f32 {
        if self.decay == 0.0 {
            0.0
        } else {
            self.decay * self.value.norm_squared()
        }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}
