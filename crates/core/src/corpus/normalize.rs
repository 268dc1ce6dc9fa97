//! Second pass: rescale stored pitch/energy with the final corpus statistics.

use anyhow::Result;

use crate::store::{FeatureStore, Quantity};
use crate::types::{QuantityStats, UtteranceId};

/// Rewrite every stored `quantity` array as `(v - mean) / std` and return
/// the global min/max of the rescaled values alongside the applied
/// `mean`/`std`.
///
/// With no stored values at all, min and max are reported as 0.
pub fn normalize(
    store: &FeatureStore,
    quantity: Quantity,
    utterances: &[UtteranceId],
    mean: f64,
    std: f64,
) -> Result<QuantityStats> {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    let mut seen = false;

    for id in utterances {
        let values = store.load_series(&id.speaker, quantity, &id.basename)?;
        let scaled: Vec<f64> = values.iter().map(|v| (v - mean) / std).collect();
        store.save_series(&id.speaker, quantity, &id.basename, &scaled)?;

        for &v in &scaled {
            min = min.min(v);
            max = max.max(v);
            seen = true;
        }
    }

    if !seen {
        log::warn!("No stored {} values to normalize", quantity);
        min = 0.0;
        max = 0.0;
    }

    log::debug!(
        "Normalized {} over {} utterances: range [{:.4}, {:.4}]",
        quantity,
        utterances.len(),
        min,
        max
    );

    Ok(QuantityStats { min, max, mean, std })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(values: &[(&str, &[f64])]) -> (tempfile::TempDir, FeatureStore, Vec<UtteranceId>) {
        let dir = tempfile::tempdir().unwrap();
        let store = FeatureStore::new(dir.path());
        let ids = values
            .iter()
            .map(|(name, v)| {
                store.save_series("spk", Quantity::Pitch, name, v).unwrap();
                UtteranceId::new("spk", name)
            })
            .collect();
        (dir, store, ids)
    }

    #[test]
    fn test_rescales_and_tracks_range() {
        let (_dir, store, ids) = store_with(&[("a", &[100.0, 110.0]), ("b", &[90.0])]);
        let stats = normalize(&store, Quantity::Pitch, &ids, 100.0, 10.0).unwrap();
        assert_eq!(stats.min, -1.0);
        assert_eq!(stats.max, 1.0);
        assert_eq!(stats.mean, 100.0);
        assert_eq!(stats.std, 10.0);
        assert_eq!(store.load_series("spk", Quantity::Pitch, "a").unwrap(), vec![0.0, 1.0]);
        assert_eq!(store.load_series("spk", Quantity::Pitch, "b").unwrap(), vec![-1.0]);
    }

    #[test]
    fn test_identity_leaves_values_unchanged() {
        let (_dir, store, ids) = store_with(&[("a", &[0.3, -2.5, 7.25])]);
        let stats = normalize(&store, Quantity::Pitch, &ids, 0.0, 1.0).unwrap();
        assert_eq!(store.load_series("spk", Quantity::Pitch, "a").unwrap(), vec![0.3, -2.5, 7.25]);
        assert_eq!((stats.min, stats.max), (-2.5, 7.25));
    }

    #[test]
    fn test_empty_input() {
        let (_dir, store, ids) = store_with(&[]);
        let stats = normalize(&store, Quantity::Energy, &ids, 0.0, 1.0).unwrap();
        assert_eq!((stats.min, stats.max), (0.0, 0.0));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let (_dir, store, _) = store_with(&[]);
        let ids = vec![UtteranceId::new("spk", "ghost")];
        assert!(normalize(&store, Quantity::Pitch, &ids, 0.0, 1.0).is_err());
    }
}
