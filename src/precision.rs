use burn::{
    module::{Module, ModuleMapper, Param},
    prelude::*,
    tensor::{DType, FloatDType},
};
use serde::{Deserialize, Serialize};

/// Floating point precision used for model parameters.
///
/// Chosen per build from the configured device and passed explicitly to model and
/// encoder construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit floats.
    Full,
    /// Brain floating point (bf16).
    Half,
}

impl Precision {
    /// Full precision on CUDA, half precision everywhere else.
    pub fn for_device(device: &str) -> Self {
        match device {
            "cuda" => Self::Full,
            _ => Self::Half,
        }
    }

    pub fn float_dtype(&self) -> FloatDType {
        match self {
            Self::Full => FloatDType::F32,
            Self::Half => FloatDType::BF16,
        }
    }

    /// This precision if `B` can store it on `device`, full precision otherwise.
    pub fn supported_on<B: Backend>(self, device: &B::Device) -> Self {
        match self {
            Self::Half if !B::supports_dtype(device, DType::BF16) => {
                tracing::warn!("bf16 is not supported on {device:?}, using full precision");
                Self::Full
            }
            precision => precision,
        }
    }

    /// Cast every float parameter of `module` to this precision.
    pub fn cast<B: Backend, M: Module<B>>(&self, module: M) -> M {
        module.map(&mut PrecisionCaster {
            dtype: self.float_dtype(),
        })
    }
}

struct PrecisionCaster {
    dtype: FloatDType,
}

impl<B: Backend> ModuleMapper<B> for PrecisionCaster {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let dtype = self.dtype;
        param.map(|tensor| tensor.cast(dtype))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;
    use burn::nn::LinearConfig;

    #[test]
    fn cuda_runs_full_precision() {
        assert_eq!(Precision::for_device("cuda"), Precision::Full);
        assert_eq!(Precision::for_device("cuda").float_dtype(), FloatDType::F32);
    }

    #[test]
    fn other_devices_run_half_precision() {
        for device in ["cpu", "mps", "cuda:0", ""] {
            assert_eq!(Precision::for_device(device), Precision::Half);
        }
        assert_eq!(Precision::Half.float_dtype(), FloatDType::BF16);
    }

    #[test]
    fn unsupported_half_precision_falls_back_to_full() {
        let device = Default::default();

        assert_eq!(
            Precision::Half.supported_on::<TestBackend>(&device),
            Precision::Full
        );
        assert_eq!(
            Precision::Full.supported_on::<TestBackend>(&device),
            Precision::Full
        );
    }

    #[test]
    fn full_precision_cast_keeps_values() {
        let device = Default::default();
        let linear = LinearConfig::new(3, 2).init::<TestBackend>(&device);
        let before = linear.weight.val().into_data();

        let linear = Precision::Full.cast::<TestBackend, _>(linear);

        assert_eq!(linear.weight.val().dtype(), DType::F32);
        linear.weight.val().into_data().assert_eq(&before, true);
    }
}
