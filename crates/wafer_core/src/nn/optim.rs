use super::param::Param;

/// Adam with bias correction folded into the step size
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    step: i32,
}

impl Adam {
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self { learning_rate, beta1, beta2, epsilon, step: 0 }
    }

    pub fn steps(&self) -> i32 {
        self.step
    }

    /// Advance the step counter. Call once per batch, before `update`.
    pub fn begin_step(&mut self) {
        self.step += 1;
    }

    /// Apply one update to `param` from its accumulated gradient plus the L2
    /// term, then clear the gradient.
    pub fn update(&self, param: &mut Param) {
        let t = self.step.max(1);
        let lr_t = self.learning_rate * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t));
        let (b1, b2, eps, decay) = (self.beta1, self.beta2, self.epsilon, param.decay);

        for i in 0..param.value.len() {
            let g = param.grad[i] + 2.0 * decay * param.value[i];
            let m = b1 * param.m[i] + (1.0 - b1) * g;
            let v = b2 * param.v[i] + (1.0 - b2) * g * g;
            param.m[i] = m;
            param.v[i] = v;
            param.value[i] -= lr_t * m / (v.sqrt() + eps);
        }
        param.zero_grad();
    }
}
