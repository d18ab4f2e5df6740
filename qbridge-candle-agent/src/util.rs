//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::backprop::GradStore;
use candle_nn::VarMap;

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    let dest = dest.data().lock().unwrap();
    let src = src.data().lock().unwrap();

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("no source variable named {}", k_dest))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + ((1.0 - tau) * t_dest)?)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Scales the gradients so their global L2 norm does not exceed `max_norm`.
///
/// Returns the norm observed before clipping.
pub fn clip_grad_norm(varmap: &VarMap, grads: &mut GradStore, max_norm: f64) -> Result<f64> {
    let vars = varmap.all_vars();

    let mut sum_sq = 0f64;
    for var in vars.iter() {
        if let Some(grad) = grads.get(var) {
            sum_sq += grad.sqr()?.sum_all()?.to_scalar::<f32>()? as f64;
        }
    }
    let norm = sum_sq.sqrt();

    if norm > max_norm {
        let scale = max_norm / (norm + 1e-6);
        for var in vars.iter() {
            if let Some(grad) = grads.remove(var) {
                grads.insert(var, (grad * scale)?);
            }
        }
    }

    Ok(norm)
}

#[test]
fn test_track() -> Result<()> {
    use candle_core::{DType, Device, Tensor};
    use candle_nn::Init;

    let tau = 0.7;
    let t_src = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3,), &Device::Cpu)?;
    let t_dest = Tensor::from_slice(&[4.0f32, 5.0, 6.0], (3,), &Device::Cpu)?;
    let t = ((tau * &t_src)? + ((1.0 - tau) * &t_dest)?)?;

    let vm_src = {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
        vm.data().lock().unwrap().get("var1").unwrap().set(&t_src)?;
        vm
    };
    let vm_dest = {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
        vm.data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .set(&t_dest)?;
        vm
    };
    track(&vm_dest, &vm_src, tau)?;

    let t_ = vm_dest
        .data()
        .lock()
        .unwrap()
        .get("var1")
        .unwrap()
        .as_tensor()
        .clone();

    assert!((t - t_)?.abs()?.sum(0)?.to_scalar::<f32>()? < 1e-32);

    Ok(())
}

#[test]
fn test_clip_grad_norm() -> Result<()> {
    use candle_core::{DType, Device};
    use candle_nn::Init;

    let device = Device::Cpu;
    let varmap = VarMap::new();
    let w = varmap.get((3,), "w", Init::Const(1.0), DType::F32, &device)?;

    // loss = sum(20 * w) has gradient [20, 20, 20], norm > 5
    let loss = (20.0 * &w)?.sum_all()?;
    let mut grads = loss.backward()?;
    let norm = clip_grad_norm(&varmap, &mut grads, 5.0)?;
    assert!((norm - (3f64 * 400.0).sqrt()).abs() < 1e-3);

    let clipped = grads
        .get(&varmap.all_vars()[0])
        .unwrap()
        .sqr()?
        .sum_all()?
        .to_scalar::<f32>()?
        .sqrt();
    assert!((clipped as f64 - 5.0).abs() < 1e-3);

    Ok(())
}
