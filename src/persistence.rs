use crate::model::StackedLstm;
use crate::scaler::MinMaxScaler;
use crate::utils;

/// Trained model bundled with everything needed to reuse it on new closes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelArtifact {
    pub symbol: String,
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
    pub window_size: usize,
    pub scaler: MinMaxScaler,
    pub model: StackedLstm,
    pub epochs_trained: usize,
    /// Training loss of the epoch whose weights were kept.
    pub best_loss: f64,
}

impl ModelArtifact {
    /// Serializes the artifact with bincode, creating parent directories as needed.
    ///
    /// # Arguments
    /// * `path` - Destination file; an existing file is overwritten.
    ///
    /// # Errors
    /// * If the directory cannot be created, serialization fails or the write fails.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        utils::ensure_parent_dir_exist(path)?;
        let data = bincode::serialize(self)?;
        std::fs::write(path, data)
            .map_err(|e| anyhow::anyhow!("Failed to write model to {}: {}", path.display(), e))?;
        anyhow::Ok(())
    }

    /// Reads an artifact written by [`ModelArtifact::save`].
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read model from {}: {}", path.display(), e))?;
        let artifact = bincode::deserialize(&data)?;
        anyhow::Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use ndarray::Array3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn artifact() -> ModelArtifact {
        let mut rng = StdRng::seed_from_u64(21);
        ModelArtifact {
            symbol: "GOOG".to_string(),
            start: chrono::NaiveDate::from_ymd_opt(2012, 1, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2022, 12, 21).unwrap(),
            window_size: 5,
            scaler: MinMaxScaler::fit(&[10.0, 30.0]).unwrap(),
            model: StackedLstm::new(ModelConfig::with_layers(&[(4, 0.2), (5, 0.3)]), &mut rng),
            epochs_trained: 3,
            best_loss: 0.0125,
        }
    }

    #[test]
    fn reloaded_model_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.bin");
        let saved = artifact();
        saved.save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded, saved);

        let x = Array3::from_shape_fn((4, 5, 1), |(b, t, _)| (b * 5 + t) as f64 / 20.0);
        assert_eq!(loaded.model.predict(&x), saved.model.predict(&x));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(dir.path().join("absent.bin")).unwrap_err();
        assert!(err.to_string().contains("Failed to read model"));
    }
}
