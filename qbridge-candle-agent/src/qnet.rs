//! Action-value model owning its parameters and optimizer.
use crate::{
    mlp::{Mlp, MlpConfig},
    opt::{Optimizer, OptimizerConfig},
    util::clip_grad_norm,
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use std::path::Path;

/// Feed-forward approximator of Q(state, action).
///
/// Owns the parameter [`VarMap`] and the optimizer updating it. The target
/// copy of the learner is a second `QModel` whose optimizer is never
/// stepped.
pub struct QModel {
    device: Device,
    varmap: VarMap,
    q: Mlp,
    opt: Optimizer,
}

impl QModel {
    /// Builds the model and its optimizer on the given device.
    pub fn build(
        config: &MlpConfig,
        opt_config: &OptimizerConfig,
        device: Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Mlp::build(vb, config)?
        };
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            q,
            opt,
        })
    }

    /// Outputs the action values of a batch of (state, action-feature) rows.
    pub fn forward(&self, states: &Tensor, actions: &Tensor) -> Result<Tensor> {
        self.q.forward(states, actions)
    }

    /// Runs one optimizer step from the given loss, with the global
    /// gradient norm clipped to `max_grad_norm`.
    pub fn backward_step(&mut self, loss: &Tensor, max_grad_norm: f64) -> Result<()> {
        let mut grads = loss.backward()?;
        clip_grad_norm(&self.varmap, &mut grads, max_grad_norm)?;
        self.opt.step(&grads)
    }

    /// The parameter store of the model.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Device the parameters live on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Saves the parameters as a safetensors file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Saved model parameters to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads parameters saved with [`save`](Self::save).
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Loaded model parameters from {:?}", path.as_ref());
        Ok(())
    }
}
