/// Accept unless the record carries an age AND a window is set AND the age
/// exceeds it. Missing signals never reject.
pub fn is_fresh(age_days: Option<u32>, window_days: Option<u32>) -> bool {
    match (age_days, window_days) {
        (Some(age), Some(window)) => age <= window,
        _ => true,
    }
}
