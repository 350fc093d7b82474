use spatial_coherence::{
    analyze, AnalysisSettings, Experiment, ExperimentConfig, SpatialFilter, SpatialFrequency,
};

fn visibility(width: f64, seed: u64) -> f64 {
    let config = ExperimentConfig {
        filter: Some(SpatialFilter::rectangular(SpatialFrequency::per_cm(width))),
        ..ExperimentConfig::default()
    };
    let experiment = Experiment::from_config(&config).unwrap();
    let average = experiment.run(seed).unwrap();
    assert!(average.is_complete());
    assert!(average.failures.is_empty());

    let result = analyze(
        &average.pattern,
        &experiment.slits,
        average.average_intensity,
        &AnalysisSettings::default(),
    )
    .unwrap();
    assert!(
        (0.0..=1.0).contains(&result.visibility),
        "width {}: visibility {}",
        width,
        result.visibility
    );
    result.raw_visibility
}

#[test]
fn narrow_filter_gives_coherent_fringes() {
    // narrower than the first frequency bin, only the mean of the field survives
    let v = visibility(1.0, 3);
    assert!(v > 0.95, "{}", v);
}

#[test]
fn visibility_falls_as_the_filter_widens() {
    // the same seed gives the same unfiltered fields for every width
    let widths = [4.0, 8.0, 12.0];
    let visibilities: Vec<f64> = widths.iter().map(|&w| visibility(w, 11)).collect();
    for pair in visibilities.windows(2) {
        assert!(pair[0] > pair[1], "{:?} for widths {:?}", visibilities, widths);
    }
}
