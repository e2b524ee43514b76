//! Open many independent seasons at once.

use rayon::prelude::*;

use crate::domain::Result;
use crate::metrics::METRICS;
use crate::season::{Season, SeasonInputs};

/// Open every season in parallel, returning results in input order.
///
/// Seasons share nothing, so a failure in one does not affect the others.
pub fn open_seasons(inputs: Vec<SeasonInputs>) -> Vec<Result<Season>> {
    let seasons: Vec<Result<Season>> = inputs.into_par_iter().map(Season::open).collect();
    let failed = seasons.iter().filter(|s| s.is_err()).count();
    tracing::info!(
        event = "batch.opened",
        seasons = seasons.len(),
        failed = failed,
    );
    METRICS.flush();
    seasons
}
