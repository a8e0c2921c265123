// Loss functions — per-element training signal seeded at the graph sink
//
// Each loss maps (output, target) to a tensor of the same shape. The result
// is not reduced: it is fed straight into `Graph::set_dif` at the sink, so
// its sign points in the direction the output should move (target - output
// for L1) and `fit` adds `alpha * signal`.
//
// With d = target - output:
//
//   l1                    d
//   l2                    sign(d) * d^2
//   l3                    d^3
//   cross_entropy         -ln(target)        where output == 1
//                         -ln(1 - target)    elsewhere
//   binary_cross_entropy  sign(d) / (1 + e^d)
//   kullback_leibler      sign(d) * target * ln(target / output)
//
// sign(0) is +1. Both tensors must have identical shapes.

use axon_core::{sign, Result, Tensor};

/// Signature shared by every loss so they can be passed to `train`.
pub type LossFn = fn(&Tensor, &Tensor) -> Result<Tensor>;

pub fn l1(output: &Tensor, target: &Tensor) -> Result<Tensor> {
    output.zip_map(target, |o, t| t - o)
}

pub fn l2(output: &Tensor, target: &Tensor) -> Result<Tensor> {
    output.zip_map(target, |o, t| {
        let d = t - o;
        sign(d) * d * d
    })
}

pub fn l3(output: &Tensor, target: &Tensor) -> Result<Tensor> {
    output.zip_map(target, |o, t| (t - o).powi(3))
}

pub fn cross_entropy(output: &Tensor, target: &Tensor) -> Result<Tensor> {
    output.zip_map(target, |o, t| if o == 1.0 { -t.ln() } else { -(1.0 - t).ln() })
}

pub fn binary_cross_entropy(output: &Tensor, target: &Tensor) -> Result<Tensor> {
    output.zip_map(target, |o, t| {
        let d = t - o;
        sign(d) / (1.0 + d.exp())
    })
}

pub fn kullback_leibler(output: &Tensor, target: &Tensor) -> Result<Tensor> {
    output.zip_map(target, |o, t| sign(t - o) * t * (t / o).ln())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use axon_core::Error;

    fn pair(o: &[f64], t: &[f64]) -> Result<(Tensor, Tensor)> {
        Ok((Tensor::from_slice(o, o.len())?, Tensor::from_slice(t, t.len())?))
    }

    #[test]
    fn test_polynomial_losses_keep_sign() -> Result<()> {
        let (o, t) = pair(&[1.0, 0.0, 0.5], &[0.0, 2.0, 0.5])?;
        assert_eq!(l1(&o, &t)?.data(), &[-1.0, 2.0, 0.0]);
        assert_eq!(l2(&o, &t)?.data(), &[-1.0, 4.0, 0.0]);
        assert_eq!(l3(&o, &t)?.data(), &[-1.0, 8.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_cross_entropy_branches_on_output() -> Result<()> {
        let (o, t) = pair(&[1.0, 0.0], &[0.5, 0.25])?;
        let ce = cross_entropy(&o, &t)?;
        assert_abs_diff_eq!(ce.data()[0], -(0.5f64).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(ce.data()[1], -(0.75f64).ln(), epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_binary_cross_entropy_and_kl() -> Result<()> {
        let (o, t) = pair(&[0.5, 0.5], &[0.5, 0.25])?;
        let bce = binary_cross_entropy(&o, &t)?;
        assert_abs_diff_eq!(bce.data()[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(bce.data()[1], -1.0 / (1.0 + (-0.25f64).exp()), epsilon = 1e-12);
        let kl = kullback_leibler(&o, &t)?;
        assert_abs_diff_eq!(kl.data()[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kl.data()[1], -0.25 * (0.5f64).ln(), epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_losses_reject_mismatched_shapes() -> Result<()> {
        let o = Tensor::zeros(2)?;
        let t = Tensor::zeros(3)?;
        let losses: [LossFn; 6] = [
            l1,
            l2,
            l3,
            cross_entropy,
            binary_cross_entropy,
            kullback_leibler,
        ];
        for loss in losses {
            assert!(matches!(loss(&o, &t), Err(Error::ShapeMismatch { .. })));
        }
        Ok(())
    }
}
