use htm_core::core::temporal_memory::{TemporalMemory, TemporalMemoryParams};

fn params() -> TemporalMemoryParams {
    TemporalMemoryParams {
        column_dimensions: vec![64],
        cells_per_column: 4,
        activation_threshold: 6,
        min_threshold: 4,
        learning_radius: 64,
        initial_permanence: 0.21,
        connected_permanence: 0.5,
        max_new_synapse_count: 8,
        permanence_increment: 0.10,
        permanence_decrement: 0.10,
        seed: 7,
        ..Default::default()
    }
}

fn sequence() -> [Vec<usize>; 3] {
    [(0..8).collect(), (20..28).collect(), (40..48).collect()]
}

fn train(tm: &mut TemporalMemory, repetitions: usize) {
    for _ in 0..repetitions {
        for step in sequence() {
            tm.compute(&step, true).unwrap();
        }
        tm.reset();
    }
}

#[test]
fn learned_sequence_predicts_its_last_step() {
    let mut tm = TemporalMemory::new(params()).unwrap();
    train(&mut tm, 30);

    let [a, b, c] = sequence();
    tm.compute(&a, false).unwrap();
    assert_eq!(tm.predicted_columns(), b);
    tm.compute(&b, false).unwrap();

    assert_eq!(tm.predicted_columns(), c);
    assert_eq!(tm.predictive_cells().len(), c.len());
    assert!(tm
        .predictive_cells()
        .iter()
        .all(|&cell| c.contains(&(cell / tm.cells_per_column()))));

    // B was predicted, so only one cell per column fired.
    assert_eq!(tm.active_cells().len(), b.len());
    assert_eq!(tm.active_cells(), tm.winner_cells());
}

#[test]
fn untrained_memory_predicts_nothing() {
    let mut tm = TemporalMemory::new(params()).unwrap();
    let [a, b, _] = sequence();
    tm.compute(&a, false).unwrap();
    tm.compute(&b, false).unwrap();
    assert!(tm.predictive_cells().is_empty());
    assert_eq!(tm.active_cells().len(), b.len() * 4);
}

#[test]
fn reset_clears_cell_state() {
    let mut tm = TemporalMemory::new(params()).unwrap();
    train(&mut tm, 10);
    let [a, _, _] = sequence();
    tm.compute(&a, false).unwrap();
    assert!(!tm.predictive_cells().is_empty());

    tm.reset();
    assert!(tm.active_cells().is_empty());
    assert!(tm.predictive_cells().is_empty());
    assert!(tm.winner_cells().is_empty());
}

#[test]
fn lookahead_follows_the_sequence() {
    let mut tm = TemporalMemory::new(params()).unwrap();
    train(&mut tm, 30);
    let [a, b, c] = sequence();
    tm.compute(&a, false).unwrap();
    assert_eq!(tm.predict_ahead(4).unwrap(), vec![b, c]);
}

#[test]
fn same_seed_learns_the_same_synapses() {
    let mut first = TemporalMemory::new(params()).unwrap();
    let mut second = TemporalMemory::new(params()).unwrap();
    train(&mut first, 5);
    train(&mut second, 5);
    assert_eq!(
        first.connections().num_synapses(),
        second.connections().num_synapses()
    );
    for segment in 0..first.connections().num_segments() {
        assert_eq!(
            first.connections().segment(segment).unwrap(),
            second.connections().segment(segment).unwrap()
        );
    }
}
