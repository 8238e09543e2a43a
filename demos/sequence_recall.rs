//! Learns the repeating sequence A B C D through a Spatial Pooler and a Temporal Memory,
//! then replays it without learning and prints what the memory predicts at every step.
//!
//! Run with `RUST_LOG=htm_core=debug cargo run --example sequence_recall` to see the engines'
//! logs.

use anyhow::Result;
use htm_core::core::{
    spatial_pooler::{InhibitionDensity, SpatialPooler, SpatialPoolerParams},
    temporal_memory::{TemporalMemory, TemporalMemoryParams},
};
use log::info;

const INPUT_BITS: usize = 256;
const SYMBOL_BITS: usize = 32;
const SYMBOLS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Each symbol owns a disjoint block of input bits.
fn encode(symbol: usize) -> Vec<bool> {
    let block = symbol * SYMBOL_BITS..(symbol + 1) * SYMBOL_BITS;
    (0..INPUT_BITS).map(|bit| block.contains(&bit)).collect()
}

fn main() -> Result<()> {
    env_logger::init();

    let mut sp = SpatialPooler::new(SpatialPoolerParams {
        input_dimensions: vec![INPUT_BITS],
        column_dimensions: vec![512],
        potential_radius: None,
        potential_pct: 0.8,
        density: InhibitionDensity::ColumnsPerArea(20),
        ..Default::default()
    })?;
    let mut tm = TemporalMemory::new(TemporalMemoryParams {
        column_dimensions: vec![512],
        cells_per_column: 8,
        activation_threshold: 12,
        min_threshold: 8,
        learning_radius: 512,
        max_new_synapse_count: 20,
        ..Default::default()
    })?;

    // Let the pooler settle on stable column sets before the memory starts learning.
    for _ in 0..20 {
        for symbol in 0..SYMBOLS.len() {
            sp.compute(&encode(symbol), true)?;
        }
    }

    for repetition in 0..40 {
        for symbol in 0..SYMBOLS.len() {
            sp.compute(&encode(symbol), false)?;
            tm.compute(sp.active_columns(), true)?;
        }
        tm.reset();
        if repetition % 10 == 9 {
            info!(
                "after {} repetitions: {} segments, {} synapses",
                repetition + 1,
                tm.connections().num_segments(),
                tm.connections().num_synapses()
            );
        }
    }

    let mut columns_of = Vec::new();
    for symbol in 0..SYMBOLS.len() {
        sp.compute(&encode(symbol), false)?;
        columns_of.push(sp.active_columns().to_vec());
    }

    for (symbol, columns) in columns_of.iter().enumerate() {
        tm.compute(columns, false)?;
        let predicted = tm.predicted_columns();
        let guess = columns_of
            .iter()
            .position(|candidate| *candidate == predicted)
            .map_or('?', |index| SYMBOLS[index]);
        println!(
            "{} -> predicts {} ({} predictive cells, {} active cells)",
            SYMBOLS[symbol],
            guess,
            tm.predictive_cells().len(),
            tm.active_cells().len()
        );
    }

    tm.reset();
    tm.compute(&columns_of[0], false)?;
    let ahead: Vec<String> = tm
        .predict_ahead(SYMBOLS.len())?
        .iter()
        .map(|columns| {
            columns_of
                .iter()
                .position(|candidate| candidate == columns)
                .map_or_else(|| "?".to_string(), |index| SYMBOLS[index].to_string())
        })
        .collect();
    println!("lookahead from A: {}", ahead.join(" "));

    Ok(())
}
