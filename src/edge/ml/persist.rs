//! Versioned binary persistence for the fitted model artifact (scaler +
//! isolation forest), replacing the original's pickled sklearn objects
//! (spec.md §9 redesign note): magic, version, `u32` dim, per-feature
//! mean/std, tree count, trees. Unknown versions refuse to load rather than
//! attempting a best-effort read.

use std::io::{Read, Write};
use std::path::Path;

use crate::error::EdgeError;

use super::isolation_forest::IsolationForest;
use super::scaler::Standardizer;

const MAGIC: &[u8; 4] = b"CSML";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub scaler: Standardizer,
    pub forest: IsolationForest,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<(), EdgeError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());

        let dim = self.scaler.mean.len() as u32;
        buf.extend_from_slice(&dim.to_le_bytes());
        for v in &self.scaler.mean {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.scaler.std {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        let tree_count = self.forest.trees.len() as u32;
        buf.extend_from_slice(&tree_count.to_le_bytes());
        buf.extend_from_slice(&(self.forest.subsample_size as u32).to_le_bytes());
        buf.extend_from_slice(&self.forest.anomaly_threshold.to_le_bytes());

        let trees_encoded =
            bincode::serialize(&self.forest.trees).map_err(|e| EdgeError::ModelFitFailure(e.to_string()))?;
        buf.extend_from_slice(&(trees_encoded.len() as u64).to_le_bytes());
        buf.extend_from_slice(&trees_encoded);

        // exclusive rename-on-write: write to a temp file then atomically
        // rename into place, so a crash mid-write never corrupts the
        // previous artifact (spec.md §5 "Shared resources").
        let tmp_path = path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(&buf)?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, EdgeError> {
        let mut file = std::fs::File::open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        if buf.len() < 12 || &buf[0..4] != MAGIC {
            return Err(EdgeError::ModelLoadFailure("bad magic".to_string()));
        }
        let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(EdgeError::ModelLoadFailure(format!("unsupported version {version}")));
        }
        let dim = u32::from_le_bytes(buf[8..12].try_into().unwrap()) as usize;

        let mut offset = 12;
        let read_f64_vec = |buf: &[u8], offset: &mut usize, count: usize| -> Result<Vec<f64>, EdgeError> {
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                let end = *offset + 8;
                let bytes: [u8; 8] = buf
                    .get(*offset..end)
                    .ok_or_else(|| EdgeError::ModelLoadFailure("truncated file".to_string()))?
                    .try_into()
                    .unwrap();
                out.push(f64::from_le_bytes(bytes));
                *offset = end;
            }
            Ok(out)
        };

        let mean = read_f64_vec(&buf, &mut offset, dim)?;
        let std = read_f64_vec(&buf, &mut offset, dim)?;

        let tree_count = u32::from_le_bytes(
            buf.get(offset..offset + 4).ok_or_else(|| EdgeError::ModelLoadFailure("truncated file".to_string()))?.try_into().unwrap(),
        );
        offset += 4;
        let subsample_size = u32::from_le_bytes(
            buf.get(offset..offset + 4).ok_or_else(|| EdgeError::ModelLoadFailure("truncated file".to_string()))?.try_into().unwrap(),
        ) as usize;
        offset += 4;
        let anomaly_threshold = f64::from_le_bytes(
            buf.get(offset..offset + 8).ok_or_else(|| EdgeError::ModelLoadFailure("truncated file".to_string()))?.try_into().unwrap(),
        );
        offset += 8;

        let trees_len = u64::from_le_bytes(
            buf.get(offset..offset + 8).ok_or_else(|| EdgeError::ModelLoadFailure("truncated file".to_string()))?.try_into().unwrap(),
        ) as usize;
        offset += 8;
        let trees_bytes = buf
            .get(offset..offset + trees_len)
            .ok_or_else(|| EdgeError::ModelLoadFailure("truncated file".to_string()))?;
        let trees: Vec<super::isolation_forest::IsolationTree> =
            bincode::deserialize(trees_bytes).map_err(|e| EdgeError::ModelLoadFailure(e.to_string()))?;
        debug_assert_eq!(tree_count as usize, trees.len());

        Ok(ModelArtifact {
            scaler: Standardizer { mean, std },
            forest: IsolationForest { trees, subsample_size, anomaly_threshold },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::ml::isolation_forest::IsolationForest;

    #[test]
    fn round_trips_through_disk() {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let scaler = Standardizer::fit(&rows, 2);
        let forest = IsolationForest::fit(&rows, 10, 0.1);
        let artifact = ModelArtifact { scaler, forest };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded.scaler.mean, artifact.scaler.mean);
        assert_eq!(loaded.scaler.std, artifact.scaler.std);
        assert_eq!(loaded.forest.trees.len(), artifact.forest.trees.len());
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        std::fs::write(&path, b"not a model file").unwrap();
        assert!(ModelArtifact::load(&path).is_err());
    }
}
