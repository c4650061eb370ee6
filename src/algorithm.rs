//! Song scoring for the bundled recommender.
//!
//! Calculates a base score from listening statistics (touches, listens, skips
//! and the liked flag) and multiplies it by how closely a candidate matches the
//! seed songs of a recommendation request.

use crate::song::Song;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Listening statistics kept per song by the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SongStats {
    /// How often the song has been started.
    pub touches: u32,
    pub listens: u32,
    pub skips: u32,
    pub loved: bool,
}

/// Scoring parameters.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub touch_threshold: u32,
    pub dampening_base: f64,
    pub love_multiplier: f64,
    pub weights: WeightConfig,
    /// Added when a candidate shares an artist with a seed.
    pub artist_affinity: f64,
    /// Added when a candidate shares an album with a seed.
    pub album_affinity: f64,
}

/// Listen/skip weights for songs that are still being learned.
#[derive(Debug, Clone, Copy)]
pub struct WeightConfig {
    pub early_exploration: (u8, u8),    // (listen_weight, skip_weight)
    pub learning_phase: (u8, u8),
    pub stable_preferences: (u8, u8),
    pub small_threshold: u32,
    pub big_threshold: u32,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            touch_threshold: 30,
            dampening_base: 1.2,
            love_multiplier: 2.0,
            weights: WeightConfig {
                early_exploration: (4, 1),
                learning_phase: (2, 2),
                stable_preferences: (1, 4),
                small_threshold: 5,
                big_threshold: 15,
            },
            artist_affinity: 1.5,
            album_affinity: 1.0,
        }
    }
}

/// Base score of a song from its statistics. Never negative.
///
/// ```text
/// score(song) = match song.touches {
///     t if t < THRESHOLD => weighted_score(song),
///     _ => dampened_score(song)
/// } * love_modifier(song.loved)
/// ```
///
/// # Examples
///
/// ```
/// use cadence::algorithm::{calculate_score, ScoringContext, SongStats};
///
/// let stats = SongStats { touches: 5, listens: 4, skips: 1, loved: false };
/// assert!(calculate_score(&stats, &ScoringContext::default()) > 0.0);
/// ```
#[must_use]
pub fn calculate_score(stats: &SongStats, context: &ScoringContext) -> f64 {
    let base = if stats.touches < context.touch_threshold {
        weighted_score(stats, &context.weights)
    } else {
        dampened_score(stats, context.dampening_base)
    };

    let base = base.max(0.0);
    if stats.loved {
        base * context.love_multiplier
    } else {
        base
    }
}

#[inline]
fn weighted_score(stats: &SongStats, weights: &WeightConfig) -> f64 {
    let (listen_weight, skip_weight) = determine_weights(stats.touches, weights);
    f64::from(listen_weight) * f64::from(stats.listens)
        - f64::from(skip_weight) * f64::from(stats.skips)
}

#[inline]
fn dampened_score(stats: &SongStats, dampening_base: f64) -> f64 {
    let dampening_factor = f64::from(stats.touches + 1).log(dampening_base);
    dampening_factor * (f64::from(stats.listens) - f64::from(stats.skips))
}

const fn determine_weights(touches: u32, config: &WeightConfig) -> (u8, u8) {
    match touches {
        t if t < config.small_threshold => config.early_exploration,
        t if t <= config.big_threshold => config.learning_phase,
        _ => config.stable_preferences,
    }
}

/// How strongly `candidate` relates to the seeds. Each seed contributes
/// independently, so multi-seed requests favour songs close to many seeds.
#[must_use]
pub fn seed_affinity(candidate: &Song, seeds: &[Song], context: &ScoringContext) -> f64 {
    seeds
        .iter()
        .map(|seed| {
            let mut affinity = 0.0;
            if !seed.artist.is_empty() && seed.artist == candidate.artist {
                affinity += context.artist_affinity;
            }
            if !seed.album.is_empty() && seed.album == candidate.album {
                affinity += context.album_affinity;
            }
            affinity
        })
        .sum()
}

/// Rank candidates for the given seeds, best first.
///
/// Unheard songs get a base of `1.0` so seed affinity alone can surface them.
#[must_use]
pub fn rank_candidates(
    candidates: Vec<(Song, SongStats)>,
    seeds: &[Song],
    context: &ScoringContext,
) -> Vec<(Song, f64)> {
    let mut ranked: Vec<(Song, f64)> = candidates
        .into_par_iter()
        .map(|(song, stats)| {
            let base = calculate_score(&stats, context) + 1.0;
            let score = base * (1.0 + seed_affinity(&song, seeds, context));
            (song, score)
        })
        .collect();

    // Stable tie-break on id keeps results deterministic.
    ranked.sort_by(|(a_song, a), (b_song, b)| {
        b.partial_cmp(a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a_song.id.cmp(&b_song.id))
    });
    log::trace!("Ranked {} candidates against {} seed(s)", ranked.len(), seeds.len());
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(touches: u32, listens: u32, skips: u32, loved: bool) -> SongStats {
        SongStats { touches, listens, skips, loved }
    }

    #[test]
    fn test_scoring_is_never_negative() {
        let context = ScoringContext::default();
        assert!(calculate_score(&stats(10, 1, 9, false), &context) >= 0.0);
        assert!(calculate_score(&stats(1000, 0, 1000, false), &context) >= 0.0);
        assert_eq!(calculate_score(&SongStats::default(), &context), 0.0);
    }

    #[test]
    fn test_loved_songs_score_at_least_as_high() {
        let context = ScoringContext::default();
        let plain = calculate_score(&stats(10, 8, 2, false), &context);
        let loved = calculate_score(&stats(10, 8, 2, true), &context);
        assert!(plain > 0.0);
        assert!(loved >= plain);
    }

    #[test]
    fn test_weight_phases() {
        let weights = ScoringContext::default().weights;
        assert_eq!(determine_weights(0, &weights), (4, 1));
        assert_eq!(determine_weights(15, &weights), (2, 2));
        assert_eq!(determine_weights(16, &weights), (1, 4));
    }

    #[test]
    fn test_seed_affinity_accumulates_per_seed() {
        let context = ScoringContext::default();
        let candidate = Song::new("c", "C", "Band").with_album("LP");
        let one = vec![Song::new("a", "A", "Band")];
        let two = vec![Song::new("a", "A", "Band"), Song::new("b", "B", "Band").with_album("LP")];

        assert_eq!(seed_affinity(&candidate, &one, &context), 1.5);
        assert_eq!(seed_affinity(&candidate, &two, &context), 4.0);
        assert_eq!(seed_affinity(&candidate, &[Song::new("x", "X", "Other")], &context), 0.0);
    }

    #[test]
    fn test_rank_prefers_seed_artist_then_id() {
        let context = ScoringContext::default();
        let seeds = vec![Song::new("seed", "Seed", "Band")];
        let candidates = vec![
            (Song::new("b", "B", "Other"), SongStats::default()),
            (Song::new("a", "A", "Other"), SongStats::default()),
            (Song::new("z", "Z", "Band"), SongStats::default()),
        ];

        let ranked = rank_candidates(candidates, &seeds, &context);
        let order: Vec<&str> = ranked.iter().map(|(s, _)| s.id.as_str()).collect();
        assert_eq!(order, vec!["z", "a", "b"]);
    }
}
