use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use corpusdb_core::error::{Error, Result};
use corpusdb_core::types::SearchHit;

/// How each engine's candidate list is cut down to `n` before fusion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CandidateSelection {
    /// The first `n` hits of each list.
    #[default]
    TopN,
    /// Draw `n` hits without replacement from the first `n * pool_factor`,
    /// weighting rank `r` by `1 / (r + k)`. Drawn hits keep their original
    /// relative order so fusion still sees a ranked list.
    WeightedSample { pool_factor: usize, seed: Option<u64> },
}

impl CandidateSelection {
    pub fn pool_size(&self, n: usize) -> usize {
        match self {
            CandidateSelection::TopN => n,
            CandidateSelection::WeightedSample { pool_factor, .. } => n.saturating_mul((*pool_factor).max(1)),
        }
    }

    pub fn rng(&self) -> StdRng {
        match self {
            CandidateSelection::WeightedSample { seed: Some(seed), .. } => StdRng::seed_from_u64(*seed),
            _ => StdRng::from_entropy(),
        }
    }

    pub fn select(&self, mut hits: Vec<SearchHit>, n: usize, k: usize, rng: &mut StdRng) -> Result<Vec<SearchHit>> {
        match self {
            CandidateSelection::TopN => {
                hits.truncate(n);
                Ok(hits)
            }
            CandidateSelection::WeightedSample { .. } => weighted_sample(hits, n, k, rng),
        }
    }
}

fn weighted_sample(hits: Vec<SearchHit>, n: usize, k: usize, rng: &mut StdRng) -> Result<Vec<SearchHit>> {
    if hits.len() <= n {
        return Ok(hits);
    }
    let ranked: Vec<(usize, SearchHit)> = hits.into_iter().enumerate().collect();
    #[allow(clippy::cast_precision_loss)]
    let mut picked: Vec<(usize, SearchHit)> = ranked
        .choose_multiple_weighted(rng, n, |(pos, _)| 1.0 / (pos + 1 + k) as f64)
        .map_err(|e| Error::Operation(format!("weighted sampling failed: {e}")))?
        .cloned()
        .collect();
    picked.sort_by_key(|(pos, _)| *pos);
    Ok(picked.into_iter().map(|(_, hit)| hit).collect())
}
