//! Actor-critic MLP using tch-rs (PyTorch bindings).

use tch::{nn, nn::Module, Kind, Tensor};

/// Shape of the policy's action distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionHead {
    /// Discrete actions; one index per lane.
    Categorical { num_actions: usize },
    /// Continuous actions with a state-independent learnable log-std.
    Gaussian { action_dim: usize },
}

impl ActionHead {
    /// Width of one lane's action in the flat action buffers.
    pub fn action_width(&self) -> usize {
        match *self {
            ActionHead::Categorical { .. } => 1,
            ActionHead::Gaussian { action_dim } => action_dim,
        }
    }

    fn output_dim(&self) -> usize {
        match *self {
            ActionHead::Categorical { num_actions } => num_actions,
            ActionHead::Gaussian { action_dim } => action_dim,
        }
    }
}

/// Orthogonally initialized linear layer with zero bias.
fn layer(p: nn::Path<'_>, in_dim: usize, out_dim: usize, gain: f64) -> nn::Linear {
    nn::linear(
        p,
        in_dim as i64,
        out_dim as i64,
        nn::LinearConfig {
            ws_init: nn::Init::Orthogonal { gain },
            bs_init: Some(nn::Init::Const(0.0)),
            bias: true,
        },
    )
}

/// `in → hidden[0] → … → hidden[n-1]` with tanh activations.
fn torso(p: &nn::Path<'_>, obs_dim: usize, hidden: &[usize]) -> nn::Sequential {
    let mut seq = nn::seq();
    let mut width = obs_dim;
    for (i, &h) in hidden.iter().enumerate() {
        seq = seq
            .add(layer(p / format!("l{i}"), width, h, 2f64.sqrt()))
            .add_fn(|x| x.tanh());
        width = h;
    }
    seq
}

/// MLP actor and critic.
///
/// Torso layers use gain √2, the actor output 0.01, and the critic output 1.0.
/// With `shared` the critic reads the actor's torso features.
pub struct ActorCritic {
    actor_torso: nn::Sequential,
    critic_torso: Option<nn::Sequential>,
    actor_out: nn::Linear,
    critic_out: nn::Linear,
    log_std: Option<Tensor>,
    head: ActionHead,
}

impl ActorCritic {
    pub fn new(
        p: &nn::Path<'_>,
        obs_dim: usize,
        head: ActionHead,
        hidden: &[usize],
        shared: bool,
    ) -> Self {
        let width = hidden.last().copied().unwrap_or(obs_dim);
        let actor_torso = torso(&(p / "actor"), obs_dim, hidden);
        let critic_torso = (!shared).then(|| torso(&(p / "critic"), obs_dim, hidden));
        let actor_out = layer(p / "actor_out", width, head.output_dim(), 0.01);
        let critic_out = layer(p / "critic_out", width, 1, 1.0);
        let log_std = match head {
            ActionHead::Gaussian { action_dim } => {
                Some(p.zeros("log_std", &[1, action_dim as i64]))
            }
            ActionHead::Categorical { .. } => None,
        };
        Self {
            actor_torso,
            critic_torso,
            actor_out,
            critic_out,
            log_std,
            head,
        }
    }

    pub fn head(&self) -> ActionHead {
        self.head
    }

    /// State values, `[rows]`.
    pub fn value(&self, obs: &Tensor) -> Tensor {
        let features = match &self.critic_torso {
            Some(critic) => critic.forward(obs),
            None => self.actor_torso.forward(obs),
        };
        self.critic_out.forward(&features).squeeze_dim(-1)
    }

    /// Raw actor output: logits (categorical) or means (gaussian).
    pub fn actor(&self, obs: &Tensor) -> Tensor {
        self.actor_out.forward(&self.actor_torso.forward(obs))
    }

    /// Samples one action per row, returning `(actions, log_probs)`.
    ///
    /// Categorical actions come back as float indices, `[rows, 1]`.
    pub fn sample(&self, obs: &Tensor) -> (Tensor, Tensor) {
        let out = self.actor(obs);
        match &self.log_std {
            None => {
                let log_probs = out.log_softmax(-1, Kind::Float);
                let actions = log_probs.exp().multinomial(1, true);
                let selected = log_probs.gather(-1, &actions, false).squeeze_dim(-1);
                (actions.to_kind(Kind::Float), selected)
            }
            Some(log_std) => {
                let std = log_std.exp().expand_as(&out);
                let actions = &out + &std * out.randn_like();
                let log_probs = gaussian_log_prob(&out, log_std, &actions);
                (actions, log_probs)
            }
        }
    }

    /// Log-probabilities and entropies of `actions` (`[rows, action_width]`).
    pub fn log_prob_and_entropy(&self, obs: &Tensor, actions: &Tensor) -> (Tensor, Tensor) {
        let out = self.actor(obs);
        match &self.log_std {
            None => {
                let log_probs = out.log_softmax(-1, Kind::Float);
                let index = actions.to_kind(Kind::Int64);
                let selected = log_probs.gather(-1, &index, false).squeeze_dim(-1);
                let entropy = -(log_probs.exp() * &log_probs).sum_dim_intlist(
                    [-1].as_slice(),
                    false,
                    Kind::Float,
                );
                (selected, entropy)
            }
            Some(log_std) => {
                let log_probs = gaussian_log_prob(&out, log_std, actions);
                let per_dim = log_std + 0.5 + 0.5 * (2.0 * std::f64::consts::PI).ln();
                let entropy = per_dim
                    .expand_as(&out)
                    .sum_dim_intlist([-1].as_slice(), false, Kind::Float);
                (log_probs, entropy)
            }
        }
    }
}

/// Diagonal normal log-density summed over action dims.
fn gaussian_log_prob(mean: &Tensor, log_std: &Tensor, actions: &Tensor) -> Tensor {
    let var = (log_std * 2.0).exp();
    let log_norm = 0.5 * (2.0 * std::f64::consts::PI).ln();
    let per_dim = -(actions - mean).square() / (var * 2.0) - log_std - log_norm;
    per_dim.sum_dim_intlist([-1].as_slice(), false, Kind::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn net(head: ActionHead, shared: bool) -> (nn::VarStore, ActorCritic) {
        let vs = nn::VarStore::new(Device::Cpu);
        let ac = ActorCritic::new(&vs.root(), 3, head, &[16, 8], shared);
        (vs, ac)
    }

    #[test]
    fn categorical_shapes() {
        let (_vs, ac) = net(ActionHead::Categorical { num_actions: 4 }, false);
        let obs = Tensor::randn([5, 3], (Kind::Float, Device::Cpu));
        assert_eq!(ac.actor(&obs).size(), &[5, 4]);
        assert_eq!(ac.value(&obs).size(), &[5]);
        let (actions, log_probs) = ac.sample(&obs);
        assert_eq!(actions.size(), &[5, 1]);
        assert_eq!(log_probs.size(), &[5]);
    }

    #[test]
    fn gaussian_shapes() {
        let (_vs, ac) = net(ActionHead::Gaussian { action_dim: 2 }, true);
        let obs = Tensor::randn([6, 3], (Kind::Float, Device::Cpu));
        let (actions, log_probs) = ac.sample(&obs);
        assert_eq!(actions.size(), &[6, 2]);
        let (lp, entropy) = ac.log_prob_and_entropy(&obs, &actions);
        assert_eq!(entropy.size(), &[6]);
        let diff = f64::try_from((lp - log_probs).abs().max()).unwrap();
        assert!(diff < 1e-5);
    }

    #[test]
    fn shared_torso_has_no_critic_branch() {
        let (vs, _ac) = net(ActionHead::Categorical { num_actions: 2 }, true);
        let names: Vec<String> = vs.variables().into_keys().collect();
        assert!(names.iter().all(|n| !n.starts_with("critic.")));
        assert!(names.iter().any(|n| n.starts_with("critic_out")));
    }

    #[test]
    fn initial_categorical_policy_is_near_uniform() {
        let (_vs, ac) = net(ActionHead::Categorical { num_actions: 4 }, false);
        let obs = Tensor::randn([8, 3], (Kind::Float, Device::Cpu));
        let actions = Tensor::zeros([8, 1], (Kind::Float, Device::Cpu));
        let (_, entropy) = ac.log_prob_and_entropy(&obs, &actions);
        let mean = f64::try_from(entropy.mean(Kind::Float)).unwrap();
        assert!((mean - 4f64.ln()).abs() < 0.05);
    }
}
