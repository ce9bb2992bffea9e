/// Converts a mean headway in minutes into a level-of-service letter.
///
/// | Mean headway   | Grade |
/// |----------------|-------|
/// | < 10 min       | A     |
/// | < 15 min       | B     |
/// | <= 20 min      | C     |
/// | <= 30 min      | D     |
/// | <= 60 min      | E     |
/// | > 60 min       | F     |
pub fn grade(mean_headway_min: f64) -> String {
    match mean_headway_min {
        h if h < 10.0 => "A".into(),
        h if h < 15.0 => "B".into(),
        h if h <= 20.0 => "C".into(),
        h if h <= 30.0 => "D".into(),
        h if h <= 60.0 => "E".into(),
        _ => "F".into(),
    }
}
