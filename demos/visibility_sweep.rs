use std::fs::File;
use std::io::BufWriter;

use spatial_coherence::records::write_pattern;
use spatial_coherence::{
    analyze, Experiment, ExperimentConfig, SpatialFilter, SpatialFrequency,
};

/// Sweeps the width of a rectangular spatial filter and prints the fringe visibility of each averaged pattern.
///
/// An optional JSON configuration file may be given as the first argument, otherwise the reference scenario is used.
/// Each averaged pattern is also written to `pattern_<width>.csv`.
pub fn main() -> Result<(), spatial_coherence::Error> {
    let base = match std::env::args().nth(1) {
        Some(path) => ExperimentConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => ExperimentConfig::default(),
    };

    println!("width (rad/cm)  visibility  realizations");
    for &width in &[1.0, 4.0, 6.0, 8.0, 10.0, 12.0, 16.0] {
        let config = ExperimentConfig {
            filter: Some(SpatialFilter::rectangular(SpatialFrequency::per_cm(width))),
            ..base.clone()
        };
        let experiment = Experiment::from_config(&config)?;
        let average = experiment.run(config.seed)?;

        let file = BufWriter::new(File::create(format!("pattern_{}.csv", width))?);
        write_pattern(file, &average.pattern)?;

        match analyze(
            &average.pattern,
            &experiment.slits,
            average.average_intensity,
            &config.analysis,
        ) {
            Ok(result) => println!(
                "{:>14}  {:>10}  {:>5}/{}",
                width,
                result.visibility,
                average.completed(),
                average.requested
            ),
            Err(err) => println!("{:>14}  {}", width, err),
        }
    }
    Ok(())
}
