use std::{
    collections::BTreeMap,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use burn::{module::Module, prelude::Backend};
use burn_store::{
    KeyRemapper, ModuleSnapshot, ModuleStore, PyTorchToBurnAdapter, PytorchStore,
    SafetensorsStore, TensorSnapshot,
};
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Key of the precomputed rotary frequencies, never loaded from a checkpoint.
pub const ROPE_FREQS_KEY: &str = "rope.freqs";

/// On-disk format of the weight archives in a checkpoint directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointFormat {
    /// PyTorch `state_dict` pickles (`*.pth`).
    #[default]
    PyTorch,
    /// Safetensors archives with PyTorch parameter layout (`*.safetensors`).
    Safetensors,
}

impl CheckpointFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::PyTorch => "pth",
            Self::Safetensors => "safetensors",
        }
    }

    /// Weight archives of this format in `dir`, sorted by file name.
    ///
    /// A directory that does not exist holds no archives.
    pub fn archives(&self, dir: &Path) -> crate::error::Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(dir).map_err(|source| BuildError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut archives = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| BuildError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == self.extension()) {
                archives.push(path);
            }
        }
        archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(archives)
    }
}

/// Tensors read from a single weight archive, keyed by module path.
pub struct Checkpoint {
    tensors: BTreeMap<String, TensorSnapshot>,
}

impl Checkpoint {
    /// Read every tensor of the archive at `path` into memory.
    ///
    /// Each `(pattern, replacement)` pair of `remappings` renames matching keys
    /// (regex syntax, applied in order).
    pub fn read(
        path: &Path,
        format: CheckpointFormat,
        remappings: &[(&str, &str)],
    ) -> crate::error::Result<Self> {
        tracing::info!("Loading checkpoint {:?}", path);
        let now = Instant::now();

        let remapper = KeyRemapper::from_patterns(remappings.to_vec())
            .map_err(|err| BuildError::Checkpoint(err.to_string()))?;
        let snapshots = match format {
            CheckpointFormat::PyTorch => Self::snapshots(PytorchStore::from_file(path))?,
            CheckpointFormat::Safetensors => Self::snapshots(SafetensorsStore::from_file(path))?,
        };
        let (snapshots, renamed) = remapper.remap(snapshots);
        for (from, to) in renamed {
            tracing::debug!("Remapped {from} -> {to}");
        }
        let tensors = snapshots
            .into_iter()
            .map(|snapshot| (snapshot.full_path(), snapshot))
            .collect();

        let elapsed = now.elapsed().as_secs_f32();
        tracing::info!("Loaded checkpoint in {elapsed:.2}s");

        Ok(Self { tensors })
    }

    fn snapshots<S>(mut store: S) -> crate::error::Result<Vec<TensorSnapshot>>
    where
        S: ModuleStore,
        S::Error: Display,
    {
        store
            .get_all_snapshots()
            .map(|snapshots| snapshots.values().cloned().collect())
            .map_err(|err| BuildError::Checkpoint(err.to_string()))
    }

    pub fn remove(&mut self, key: &str) -> Option<TensorSnapshot> {
        self.tensors.remove(key)
    }

    /// Load the tensors into `module`, consuming the checkpoint.
    ///
    /// The checkpoint keys must match the module parameters exactly: any parameter
    /// without a tensor or any tensor without a parameter fails the load.
    pub fn apply_to<B: Backend, M: Module<B>>(
        self,
        module: &mut M,
    ) -> crate::error::Result<()> {
        let snapshots = self.tensors.into_values().collect();
        let result = module.apply(
            snapshots,
            None,
            Some(Box::new(PyTorchToBurnAdapter)),
            true,
        );

        if !result.missing.is_empty() || !result.unused.is_empty() {
            return Err(BuildError::WeightLoadMismatch {
                missing: result.missing.into_iter().map(|(path, _)| path).collect(),
                unexpected: result.unused,
            });
        }
        if !result.errors.is_empty() {
            let errors: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
            return Err(BuildError::WeightLoad(errors.join("; ")));
        }

        tracing::debug!("Applied {} tensors", result.applied.len());
        Ok(())
    }
}
