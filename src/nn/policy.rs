//! [`PolicyPort`] backed by a tch actor-critic.

use tch::{nn, nn::OptimizerConfig, Device, Kind, TchError, Tensor};

use super::network::{ActionHead, ActorCritic};
use crate::config::TrainingConfig;
use crate::error::BoxError;
use crate::policy::{Evaluation, LossTensor, PolicyPort, Prediction};

/// Actor-critic network with its own Adam optimizer.
pub struct TchPolicy {
    vs: nn::VarStore,
    net: ActorCritic,
    opt: nn::Optimizer,
    obs_dim: usize,
    max_grad_norm: f64,
    device: Device,
}

impl TchPolicy {
    /// Builds the network from `config.hidden_layers`/`shared_network` and an
    /// Adam optimizer (ε = 1e-5) at `config.learning_rate`.
    pub fn new(
        obs_dim: usize,
        head: ActionHead,
        config: &TrainingConfig,
        device: Device,
    ) -> Result<Self, TchError> {
        let vs = nn::VarStore::new(device);
        let net = ActorCritic::new(
            &vs.root(),
            obs_dim,
            head,
            &config.hidden_layers,
            config.shared_network,
        );
        let opt = nn::Adam {
            eps: 1e-5,
            ..Default::default()
        }
        .build(&vs, config.learning_rate)?;
        Ok(Self {
            vs,
            net,
            opt,
            obs_dim,
            max_grad_norm: config.max_grad_norm,
            device,
        })
    }

    pub fn network(&self) -> &ActorCritic {
        &self.net
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    fn rows(&self, flat: &[f64], rows: usize, width: usize) -> Tensor {
        Tensor::from_slice(flat)
            .reshape([rows as i64, width as i64])
            .to_kind(Kind::Float)
            .to_device(self.device)
    }
}

impl PolicyPort for TchPolicy {
    type Tensor = Tensor;

    fn predict(&mut self, states: &[f64], num_envs: usize) -> Result<Prediction, BoxError> {
        let obs = self.rows(states, num_envs, self.obs_dim);
        let (actions, log_probs, values) = tch::no_grad(|| {
            let (actions, log_probs) = self.net.sample(&obs);
            (actions, log_probs, self.net.value(&obs))
        });
        Ok(Prediction {
            actions: to_host(&actions)?,
            log_probs: Some(to_host(&log_probs)?),
            values: to_host(&values)?,
        })
    }

    fn critic(&mut self, states: &[f64], num_envs: usize) -> Result<Vec<f64>, BoxError> {
        let obs = self.rows(states, num_envs, self.obs_dim);
        let values = tch::no_grad(|| self.net.value(&obs));
        to_host(&values)
    }

    fn evaluate(
        &mut self,
        states: &[f64],
        actions: &[f64],
        rows: usize,
    ) -> Result<Evaluation<Tensor>, BoxError> {
        let obs = self.rows(states, rows, self.obs_dim);
        let actions = self.rows(actions, rows, self.net.head().action_width());
        let (log_probs, entropy) = self.net.log_prob_and_entropy(&obs, &actions);
        Ok(Evaluation {
            log_probs,
            entropy,
            values: self.net.value(&obs),
        })
    }

    fn update(&mut self, loss: &Tensor) -> Result<(), BoxError> {
        self.opt.zero_grad();
        loss.f_backward()?;
        self.opt.clip_grad_norm(self.max_grad_norm);
        self.opt.step();
        Ok(())
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.opt.set_lr(lr);
    }
}

fn to_host(t: &Tensor) -> Result<Vec<f64>, BoxError> {
    let flat = t.to_device(Device::Cpu).to_kind(Kind::Double).flatten(0, -1);
    Ok(Vec::<f64>::try_from(&flat)?)
}

impl LossTensor for Tensor {
    fn constant(values: &[f64], like: &Self) -> Self {
        Tensor::from_slice(values)
            .to_kind(like.kind())
            .to_device(like.device())
    }

    fn values(&self) -> Vec<f64> {
        to_host(self).unwrap_or_else(|e| {
            log::warn!("could not copy tensor of shape {:?} to host: {e}", self.size());
            Vec::new()
        })
    }

    fn scalar(&self) -> f64 {
        f64::try_from(self).unwrap_or_else(|e| {
            log::warn!("tensor of shape {:?} is not a scalar: {e}", self.size());
            f64::NAN
        })
    }

    fn exp(&self) -> Self {
        Tensor::exp(self)
    }

    fn add(&self, rhs: &Self) -> Self {
        self + rhs
    }

    fn sub(&self, rhs: &Self) -> Self {
        self - rhs
    }

    fn mul(&self, rhs: &Self) -> Self {
        self * rhs
    }

    fn minimum(&self, rhs: &Self) -> Self {
        self.min_other(rhs)
    }

    fn clamp(&self, min: f64, max: f64) -> Self {
        Tensor::clamp(self, min, max)
    }

    fn square(&self) -> Self {
        self * self
    }

    fn mean(&self) -> Self {
        Tensor::mean(self, self.kind())
    }

    fn scale(&self, factor: f64) -> Self {
        self * factor
    }
}

/// Blends `source` into `target`: `target = τ·source + (1−τ)·target`.
///
/// Variables are matched by name; a name missing from `source` is an error.
pub fn soft_update(
    target: &mut nn::VarStore,
    source: &nn::VarStore,
    tau: f64,
) -> Result<(), BoxError> {
    let sources = source.variables();
    tch::no_grad(|| {
        for (name, mut dst) in target.variables() {
            let src = sources
                .get(&name)
                .ok_or_else(|| format!("variable {name} missing from source store"))?;
            let blended = src * tau + &dst * (1.0 - tau);
            dst.copy_(&blended);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::HostTensor;

    fn config() -> TrainingConfig {
        TrainingConfig {
            hidden_layers: vec![16],
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn predict_reports_every_lane() {
        let mut policy =
            TchPolicy::new(2, ActionHead::Categorical { num_actions: 3 }, &config(), Device::Cpu).unwrap();
        let p = policy.predict(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3).unwrap();
        assert_eq!(p.actions.len(), 3);
        assert!(p.actions.iter().all(|a| (0.0..3.0).contains(a) && a.fract() == 0.0));
        assert_eq!(p.log_probs.unwrap().len(), 3);
        assert_eq!(policy.critic(&[0.0; 6], 3).unwrap().len(), 3);
    }

    #[test]
    fn evaluate_matches_sampled_log_probs() {
        let mut policy =
            TchPolicy::new(2, ActionHead::Gaussian { action_dim: 2 }, &config(), Device::Cpu).unwrap();
        let states = [0.5, -0.5, 1.0, 0.0];
        let p = policy.predict(&states, 2).unwrap();
        let eval = policy.evaluate(&states, &p.actions, 2).unwrap();
        for (a, b) in LossTensor::values(&eval.log_probs).iter().zip(p.log_probs.unwrap()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn update_moves_parameters() {
        let mut policy =
            TchPolicy::new(2, ActionHead::Categorical { num_actions: 2 }, &config(), Device::Cpu).unwrap();
        let before = policy.critic(&[1.0, 1.0], 1).unwrap()[0];
        let eval = policy.evaluate(&[1.0, 1.0], &[0.0], 1).unwrap();
        let target = LossTensor::constant(&[before + 10.0], &eval.values);
        let loss = LossTensor::mean(&LossTensor::square(&LossTensor::sub(&target, &eval.values)));
        policy.update(&loss).unwrap();
        let after = policy.critic(&[1.0, 1.0], 1).unwrap()[0];
        assert!(after > before);
    }

    fn chain<T: LossTensor>(a: T, b: T) -> f64 {
        let x = LossTensor::mul(&LossTensor::exp(&a), &b);
        let y = LossTensor::clamp(&LossTensor::minimum(&x, &a), -0.8, 0.8);
        LossTensor::scalar(&LossTensor::mean(&LossTensor::scale(&y, 2.0)))
    }

    #[test]
    fn tensor_ops_agree_with_host() {
        let a = [0.5, -1.0, 2.0];
        let b = [1.0, 0.25, -0.5];
        let like = Tensor::zeros([1], (Kind::Double, Device::Cpu));
        let t = chain(
            <Tensor as LossTensor>::constant(&a, &like),
            <Tensor as LossTensor>::constant(&b, &like),
        );
        let h = chain(HostTensor::new(a.to_vec()), HostTensor::new(b.to_vec()));
        assert!((t - h).abs() < 1e-12);
    }

    #[test]
    fn non_scalar_reads_as_nan() {
        let t = Tensor::from_slice(&[1.0f64, 2.0]);
        assert!(LossTensor::scalar(&t).is_nan());
        assert_eq!(LossTensor::values(&t), vec![1.0, 2.0]);
    }

    #[test]
    fn soft_update_blends_by_tau() {
        let cfg = config();
        let head = ActionHead::Categorical { num_actions: 2 };
        let source = TchPolicy::new(2, head, &cfg, Device::Cpu).unwrap();
        let mut target = TchPolicy::new(2, head, &cfg, Device::Cpu).unwrap();
        let name = "critic_out.weight";
        let s = source.var_store().variables()[name].copy();
        let t = target.var_store().variables()[name].copy();

        soft_update(target.var_store_mut(), source.var_store(), 0.25).unwrap();
        let blended = &target.var_store().variables()[name];
        let expected = s * 0.25 + t * 0.75;
        let diff = f64::try_from((blended - expected).abs().max()).unwrap();
        assert!(diff < 1e-6);
    }
}
