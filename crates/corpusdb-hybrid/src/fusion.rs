// Reciprocal Rank Fusion (RRF)

use std::cmp::Ordering;
use std::collections::HashMap;

use corpusdb_core::types::{ChunkId, SearchHit};

/// Standard RRF k parameter (Cormack, Clarke and Buettcher, SIGIR 2009).
/// Larger k flattens the weight difference between top and lower ranks.
pub const RRF_K: usize = 60;

/// One chunk after fusion. Ranks are 1-based positions in the input lists.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub id: ChunkId,
    pub score: f64,
    pub vector_rank: Option<usize>,
    pub keyword_rank: Option<usize>,
    pub ordinal: u64,
}

impl FusedCandidate {
    pub fn in_both(&self) -> bool {
        self.vector_rank.is_some() && self.keyword_rank.is_some()
    }
}

/// Combine two ranked lists:
///
/// `score(d) = Σ 1 / (k + rank(d))` over the lists containing `d`.
///
/// Sorted by score descending; ties go to chunks present in both lists, then
/// to the lower ordinal (insertion order). Input scores are ignored, only
/// positions matter. A repeated id within one list keeps its first position.
pub fn reciprocal_rank_fusion(vector: &[SearchHit], keyword: &[SearchHit], k: usize) -> Vec<FusedCandidate> {
    let mut fused: Vec<FusedCandidate> = Vec::with_capacity(vector.len() + keyword.len());
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for (list, is_vector) in [(vector, true), (keyword, false)] {
        for (pos, hit) in list.iter().enumerate() {
            let rank = pos + 1;
            let slot = *slots.entry(hit.id.as_str()).or_insert_with(|| {
                fused.push(FusedCandidate {
                    id: hit.id.clone(),
                    score: 0.0,
                    vector_rank: None,
                    keyword_rank: None,
                    ordinal: hit.ordinal,
                });
                fused.len() - 1
            });
            let entry = &mut fused[slot];
            let rank_slot = if is_vector { &mut entry.vector_rank } else { &mut entry.keyword_rank };
            if rank_slot.is_some() {
                continue;
            }
            *rank_slot = Some(rank);
            #[allow(clippy::cast_precision_loss)]
            let contribution = 1.0 / (k + rank) as f64;
            entry.score += contribution;
            entry.ordinal = entry.ordinal.min(hit.ordinal);
        }
    }

    fused.sort_by(compare);
    fused
}

fn compare(a: &FusedCandidate, b: &FusedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.in_both().cmp(&a.in_both()))
        .then_with(|| a.ordinal.cmp(&b.ordinal))
        .then_with(|| a.id.cmp(&b.id))
}
