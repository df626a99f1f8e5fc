use std::{fs, path::PathBuf, time::Instant};

use burn::{config::Config, module::Module, prelude::Backend};
use serde_json::{Map, Value};

use crate::{
    checkpoint::{Checkpoint, CheckpointFormat, ROPE_FREQS_KEY},
    error::BuildError,
    precision::Precision,
    tokenizer::Tokenizer,
};

/// Name of the hyper-parameter file expected in every checkpoint directory.
pub const PARAMS_FILE: &str = "params.json";

/// A model (or encoder) architecture that can be constructed from its configuration.
pub trait Architecture<B: Backend>: Sized {
    type Config: Clone;

    /// Initialize a new instance with parameters of the given precision.
    fn init(config: &Self::Config, precision: Precision, device: &B::Device) -> Self;

    /// Checkpoint key renames applied when reading weights, as `(regex, replacement)`.
    fn key_remappings() -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }
}

/// Model configuration fields the builder writes or reads.
pub trait ModelConfig: Config {
    fn set_vocab_size(&mut self, vocab_size: usize);

    /// Device the model runs on, `"cpu"` when unset.
    fn device(&self) -> Option<&str> {
        None
    }
}

/// Placeholder encoder for bundles built without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncoder;

impl<B: Backend> Architecture<B> for NoEncoder {
    type Config = ();

    fn init(_config: &(), _precision: Precision, _device: &B::Device) -> Self {
        NoEncoder
    }
}

/// Everything produced by a build.
#[derive(Debug)]
pub struct ModelBundle<M, C, T, E = NoEncoder, EC = ()> {
    pub model: M,
    pub model_config: C,
    pub tokenizer: T,
    pub encoder: Option<E>,
    pub encoder_config: Option<EC>,
    pub precision: Precision,
}

#[derive(Config, Debug)]
pub struct ModelBuilderConfig {
    /// Directory holding the weight archives and `params.json`.
    pub checkpoint_dir: PathBuf,
    pub tokenizer_path: PathBuf,
    /// Load weights from the checkpoint, otherwise keep the initialized parameters.
    #[config(default = "true")]
    pub pretrained: bool,
    #[config(default = "CheckpointFormat::PyTorch")]
    pub format: CheckpointFormat,
}

impl ModelBuilderConfig {
    /// Build a model and its tokenizer.
    pub fn build<B, M, T>(
        &self,
        model_config: M::Config,
        tokenizer: T,
        device: &B::Device,
    ) -> crate::error::Result<ModelBundle<M, M::Config, T>>
    where
        B: Backend,
        M: Architecture<B> + Module<B>,
        M::Config: ModelConfig,
        T: Tokenizer,
    {
        self.assemble::<B, M, T, NoEncoder>(model_config, tokenizer, None, device)
    }

    /// Build a model, its tokenizer and an encoder sharing the model's precision.
    pub fn build_with_encoder<B, M, T, E>(
        &self,
        model_config: M::Config,
        tokenizer: T,
        encoder_config: E::Config,
        device: &B::Device,
    ) -> crate::error::Result<ModelBundle<M, M::Config, T, E, E::Config>>
    where
        B: Backend,
        M: Architecture<B> + Module<B>,
        M::Config: ModelConfig,
        T: Tokenizer,
        E: Architecture<B>,
    {
        self.assemble::<B, M, T, E>(model_config, tokenizer, Some(encoder_config), device)
    }

    fn assemble<B, M, T, E>(
        &self,
        mut model_config: M::Config,
        mut tokenizer: T,
        encoder_config: Option<E::Config>,
        device: &B::Device,
    ) -> crate::error::Result<ModelBundle<M, M::Config, T, E, E::Config>>
    where
        B: Backend,
        M: Architecture<B> + Module<B>,
        M::Config: ModelConfig,
        T: Tokenizer,
        E: Architecture<B>,
    {
        let checkpoint = if self.pretrained {
            let archives = self.format.archives(&self.checkpoint_dir)?;
            let path = archives
                .first()
                .ok_or_else(|| BuildError::NoCheckpointFound(self.checkpoint_dir.clone()))?;
            Some(Checkpoint::read(path, self.format, &M::key_remappings())?)
        } else {
            None
        };

        let params = self.read_params()?;
        model_config = merge_params(model_config, &params)?;

        tokenizer.load(&self.tokenizer_path)?;
        model_config.set_vocab_size(tokenizer.vocab_size());

        let requested = Precision::for_device(model_config.device().unwrap_or("cpu"));
        let precision = requested.supported_on::<B>(device);
        tracing::info!("Building model with {precision:?} precision");

        let mut model = M::init(&model_config, precision, device);

        if let Some(mut checkpoint) = checkpoint {
            let now = Instant::now();
            if checkpoint.remove(ROPE_FREQS_KEY).is_none() {
                tracing::debug!("Checkpoint has no {ROPE_FREQS_KEY:?} entry");
            }
            checkpoint.apply_to(&mut model)?;
            let elapsed = now.elapsed().as_secs_f32();
            tracing::info!("Loaded state dict in {elapsed:.2}s");
        }
        let model = precision.cast::<B, M>(model);

        let encoder = encoder_config
            .as_ref()
            .map(|config| E::init(config, precision, device));

        Ok(ModelBundle {
            model,
            model_config,
            tokenizer,
            encoder,
            encoder_config,
            precision,
        })
    }

    fn read_params(&self) -> crate::error::Result<Map<String, Value>> {
        let path = self.checkpoint_dir.join(PARAMS_FILE);
        let contents = fs::read_to_string(&path).map_err(|source| BuildError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Override the fields of `config` present in `params`.
///
/// Keys unknown to the configuration are skipped, as is `vocab_size` which always
/// comes from the tokenizer.
fn merge_params<C: Config>(
    config: C,
    params: &Map<String, Value>,
) -> crate::error::Result<C> {
    let mut value = serde_json::to_value(&config)?;

    if let Value::Object(fields) = &mut value {
        for (key, param) in params {
            if key == "vocab_size" {
                continue;
            }
            match fields.get_mut(key) {
                Some(field) => *field = param.clone(),
                None => tracing::debug!("Ignoring unknown parameter {key:?}"),
            }
        }
    }

    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Config, Debug)]
    struct DummyConfig {
        #[config(default = "4")]
        dim: usize,
        #[config(default = "0")]
        vocab_size: usize,
        norm_eps: Option<f64>,
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn params_override_known_fields() {
        let config = merge_params(
            DummyConfig::new(),
            &params(json!({ "dim": 16, "norm_eps": 1e-5 })),
        )
        .unwrap();

        assert_eq!(config.dim, 16);
        assert_eq!(config.norm_eps, Some(1e-5));
    }

    #[test]
    fn params_skip_unknown_fields_and_vocab_size() {
        let config = merge_params(
            DummyConfig::new(),
            &params(json!({ "n_heads": 8, "vocab_size": 32000 })),
        )
        .unwrap();

        assert_eq!(config.dim, 4);
        assert_eq!(config.vocab_size, 0);
    }

    #[test]
    fn params_with_wrong_type_are_rejected() {
        let result = merge_params(DummyConfig::new(), &params(json!({ "dim": "large" })));

        assert!(matches!(result, Err(BuildError::Params(_))));
    }

    #[test]
    fn builder_config_defaults() {
        let config = ModelBuilderConfig::new("ckpt".into(), "tokenizer.json".into());

        assert!(config.pretrained);
        assert_eq!(config.format, CheckpointFormat::PyTorch);
    }
}
