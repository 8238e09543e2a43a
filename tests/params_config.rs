use htm_core::{
    core::{
        spatial_pooler::{InhibitionDensity, SpatialPooler, SpatialPoolerParams},
        temporal_memory::{TemporalMemory, TemporalMemoryParams},
    },
    HtmError,
};

#[test]
fn partial_documents_fill_in_defaults() -> anyhow::Result<()> {
    let sp: SpatialPoolerParams = serde_json::from_str(
        r#"{
            "input_dimensions": [16, 16],
            "column_dimensions": [32, 32],
            "global_inhibition": false,
            "density": { "LocalAreaDensity": 0.02 },
            "potential_radius": null
        }"#,
    )?;
    assert_eq!(sp.column_dimensions, vec![32, 32]);
    assert_eq!(sp.density, InhibitionDensity::LocalAreaDensity(0.02));
    assert_eq!(sp.potential_radius, None);
    assert_eq!(sp.duty_cycle_period, SpatialPoolerParams::default().duty_cycle_period);
    sp.validate()?;

    let tm: TemporalMemoryParams =
        serde_json::from_str(r#"{ "cells_per_column": 8, "max_synapses_per_segment": 32 }"#)?;
    assert_eq!(tm.cells_per_column, 8);
    assert_eq!(tm.max_synapses_per_segment, Some(32));
    assert_eq!(tm.activation_threshold, 13);
    tm.validate()?;
    Ok(())
}

#[test]
fn defaults_survive_a_json_round_trip() -> anyhow::Result<()> {
    let sp = SpatialPoolerParams::default();
    let back: SpatialPoolerParams = serde_json::from_str(&serde_json::to_string(&sp)?)?;
    assert_eq!(back, sp);

    let tm = TemporalMemoryParams::default();
    let back: TemporalMemoryParams = serde_json::from_str(&serde_json::to_string(&tm)?)?;
    assert_eq!(back, tm);
    Ok(())
}

#[test]
fn invalid_values_are_rejected_at_construction() {
    let tm = TemporalMemoryParams {
        cells_per_column: 0,
        ..Default::default()
    };
    assert!(matches!(
        TemporalMemory::new(tm),
        Err(HtmError::InvalidParameter { name: "cells_per_column", .. })
    ));

    let sp = SpatialPoolerParams {
        input_dimensions: vec![0],
        ..Default::default()
    };
    assert!(matches!(
        SpatialPooler::new(sp),
        Err(HtmError::InvalidDimensions(_))
    ));

    let sp = SpatialPoolerParams {
        duty_cycle_period: 0,
        ..Default::default()
    };
    let err = SpatialPooler::new(sp).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid parameter `duty_cycle_period`: must be positive"
    );
}
