//! Shows homeostatic boosting at work: a Spatial Pooler with far more columns than it needs
//! is fed five patterns. Before the first update round most columns never win; afterwards
//! boosting hands the patterns to the idle columns until every column has been used.

use anyhow::Result;
use htm_core::core::spatial_pooler::{InhibitionDensity, SpatialPooler, SpatialPoolerParams};
use log::info;

const NUM_INPUTS: usize = 90;
const NUM_COLUMNS: usize = 600;

fn main() -> Result<()> {
    env_logger::init();

    let mut sp = SpatialPooler::new(SpatialPoolerParams {
        input_dimensions: vec![NUM_INPUTS],
        column_dimensions: vec![NUM_COLUMNS],
        potential_radius: Some(NUM_INPUTS),
        potential_pct: 0.9,
        density: InhibitionDensity::ColumnsPerArea(60),
        syn_perm_active_inc: 0.0,
        syn_perm_inactive_dec: 0.0,
        min_pct_overlap_duty_cycles: 0.1,
        min_pct_active_duty_cycles: 0.1,
        duty_cycle_period: 10,
        update_period: 50,
        ..Default::default()
    })?;

    let patterns: Vec<Vec<bool>> = [0..20, 10..30, 30..50, 50..70, 70..90]
        .into_iter()
        .map(|bits| (0..NUM_INPUTS).map(|i| bits.contains(&i)).collect())
        .collect();

    let mut won = vec![false; NUM_COLUMNS];
    for batch in 1..=14 {
        let mut sdrs = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            sp.compute(pattern, true)?;
            for &col in sp.active_columns() {
                won[col] = true;
            }
            sdrs.push(sp.active_columns().to_vec());
        }

        let shared = sdrs[0].iter().filter(|col| sdrs[1].contains(col)).count();
        let max_boost = sp.boost_factors().iter().fold(1.0f32, |a, &b| a.max(b));
        info!("batch {batch}: max boost {max_boost:.2}");
        println!(
            "batch {:2} (iteration {:3}): {:3} columns used, patterns 0/1 share {:2} columns",
            batch,
            sp.iteration_num(),
            won.iter().filter(|&&w| w).count(),
            shared
        );
    }

    Ok(())
}
