use htm_core::core::spatial_pooler::{InhibitionDensity, SpatialPooler, SpatialPoolerParams};

const NUM_INPUTS: usize = 90;
const NUM_COLUMNS: usize = 600;

fn params() -> SpatialPoolerParams {
    SpatialPoolerParams {
        input_dimensions: vec![NUM_INPUTS],
        column_dimensions: vec![NUM_COLUMNS],
        potential_radius: Some(NUM_INPUTS),
        potential_pct: 0.9,
        global_inhibition: true,
        density: InhibitionDensity::ColumnsPerArea(60),
        stimulus_threshold: 0,
        syn_perm_active_inc: 0.0,
        syn_perm_inactive_dec: 0.0,
        syn_perm_connected: 0.10,
        min_pct_overlap_duty_cycles: 0.1,
        min_pct_active_duty_cycles: 0.1,
        duty_cycle_period: 10,
        max_boost: 10.0,
        update_period: 50,
        seed: 1956,
        ..Default::default()
    }
}

/// Five 20-bit patterns: 0 and 1 share ten bits, the others are disjoint from everything.
fn patterns() -> Vec<Vec<bool>> {
    [0..20, 10..30, 30..50, 50..70, 70..90]
        .into_iter()
        .map(|bits| (0..NUM_INPUTS).map(|i| bits.contains(&i)).collect())
        .collect()
}

fn run_batch(sp: &mut SpatialPooler, patterns: &[Vec<bool>], won: &mut [bool]) -> Vec<Vec<usize>> {
    patterns
        .iter()
        .map(|pattern| {
            sp.compute(pattern, true).unwrap();
            for &col in sp.active_columns() {
                won[col] = true;
            }
            sp.active_columns().to_vec()
        })
        .collect()
}

fn overlap(a: &[usize], b: &[usize]) -> usize {
    a.iter().filter(|col| b.binary_search(col).is_ok()).count()
}

#[test]
fn boosting_brings_every_column_into_use() {
    let mut sp = SpatialPooler::new(params()).unwrap();
    let patterns = patterns();
    let mut won = vec![false; NUM_COLUMNS];

    // Boosting is inactive until the first update round.
    let first = run_batch(&mut sp, &patterns, &mut won);
    for sdr in &first {
        assert_eq!(sdr.len(), 60);
    }
    assert!(sp.boost_factors().iter().all(|&boost| boost == 1.0));
    let never_won: Vec<usize> = (0..NUM_COLUMNS).filter(|&col| !won[col]).collect();
    assert!(never_won.len() >= NUM_COLUMNS / 2, "{} never won", never_won.len());
    for &col in &never_won {
        assert_eq!(sp.active_duty_cycles()[col], 0.0);
    }
    let initial_overlap = overlap(&first[0], &first[1]);
    assert!(initial_overlap >= 9, "initial overlap {initial_overlap}");

    // Up to the first update round the same columns keep winning; afterwards the losers
    // are boosted.
    for _ in 0..9 {
        run_batch(&mut sp, &patterns, &mut won);
    }
    assert_eq!(sp.iteration_num(), 50);
    let still_never_won: Vec<usize> = (0..NUM_COLUMNS).filter(|&col| !won[col]).collect();
    assert_eq!(still_never_won, never_won);
    for &col in &still_never_won {
        assert!(sp.boost_factors()[col] > 1.0);
    }
    assert!(sp.min_active_duty_cycles().iter().all(|&min| min > 0.0));

    // Boosted columns take over, so the similar patterns 0 and 1 stop sharing columns.
    let boosted = run_batch(&mut sp, &patterns, &mut won);
    let boosted_overlap = overlap(&boosted[0], &boosted[1]);
    assert!(boosted_overlap < 7, "overlap {boosted_overlap}");
    assert!(boosted_overlap < initial_overlap);

    run_batch(&mut sp, &patterns, &mut won);
    assert!(won.iter().all(|&w| w), "{} columns never won", won.iter().filter(|&&w| !w).count());
}

#[test]
fn inference_only_reports_trained_columns() {
    let mut sp = SpatialPooler::new(params()).unwrap();
    let patterns = patterns();
    let mut won = vec![false; NUM_COLUMNS];
    run_batch(&mut sp, &patterns, &mut won);

    let output = sp.compute(&patterns[2], false).unwrap();
    let active: Vec<usize> = (0..NUM_COLUMNS).filter(|&col| output[col]).collect();
    assert!(!active.is_empty());
    assert!(active.iter().all(|&col| won[col]));
    assert_eq!(sp.iteration_learn_num(), 5);
    assert_eq!(sp.iteration_num(), 6);
}
