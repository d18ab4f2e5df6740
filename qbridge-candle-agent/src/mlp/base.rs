use super::{mlp_forward, MlpConfig};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut in_out_pairs: Vec<(usize, usize)> = (0..config.units.len() - 1)
        .map(|i| (config.units[i], config.units[i + 1]))
        .collect();
    in_out_pairs.insert(0, (config.in_dim, config.units[0]));
    in_out_pairs.push((*config.units.last().unwrap(), config.out_dim));
    let vs = vs.pp(prefix);

    in_out_pairs
        .iter()
        .enumerate()
        .map(|(i, &(in_dim, out_dim))| Ok(linear(in_dim, out_dim, vs.pp(format!("ln{}", i)))?))
        .collect()
}

/// Multilayer perceptron with ReLU activation functions between layers.
///
/// The forward pass takes a state batch and an action-feature batch and
/// concatenates them on the last dimension before the first layer.
pub struct Mlp {
    device: Device,
    layers: Vec<Linear>,
}

impl Mlp {
    /// Builds the network under the given variable builder.
    pub fn build(vs: VarBuilder, config: &MlpConfig) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs, config)?;

        Ok(Self { device, layers })
    }

    /// Scores each (state, action-feature) row with a single scalar.
    pub fn forward(&self, states: &Tensor, actions: &Tensor) -> Result<Tensor> {
        let states = states.to_device(&self.device)?;
        let actions = actions.to_device(&self.device)?;
        let input = Tensor::cat(&[states, actions], D::Minus1)?;

        Ok(mlp_forward(input, &self.layers)?)
    }
}
