//! Crossing detectors and position signals.
//!
//! Detectors return booleans encoded as `1.0` / `0.0`. A comparison involving
//! an undefined value is simply false, so detectors are always defined.

fn crossing(left: &[f64], right: &[f64], fired: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    let diff: Vec<f64> = left.iter().zip(right).map(|(a, b)| a - b).collect();
    let mut out = vec![0.0; left.len()];
    for t in 1..diff.len() {
        if fired(diff[t], diff[t - 1]) {
            out[t] = 1.0;
        }
    }
    out
}

/// True where `left - right` turns positive: `diff(t) > 0` and
/// `diff(t-1) <= 0`. The first row is always false.
pub fn cross_up(left: &[f64], right: &[f64]) -> Vec<f64> {
    crossing(left, right, |now, before| now > 0.0 && before <= 0.0)
}

/// True where `left - right` turns negative: `diff(t) < 0` and
/// `diff(t-1) >= 0`. The first row is always false.
pub fn cross_down(left: &[f64], right: &[f64]) -> Vec<f64> {
    crossing(left, right, |now, before| now < 0.0 && before >= 0.0)
}

/// Position signal: `1` after an entry, `0` after an exit, held in between.
///
/// An exit on the same row as an entry wins. Rows before the first entry are
/// `0`.
pub fn position_signal(entry: &[f64], exit: &[f64]) -> Vec<f64> {
    let truthy = |v: f64| !v.is_nan() && v != 0.0;
    let mut state = 0.0;
    entry
        .iter()
        .zip(exit)
        .map(|(long, flat)| {
            if truthy(*flat) {
                state = 0.0;
            } else if truthy(*long) {
                state = 1.0;
            }
            state
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_cross_up_example() {
        let a = [1.0, 1.8, 2.2, 2.0, 3.0];
        let b = [2.0; 5];
        assert_eq!(cross_up(&a, &b), vec![0.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(cross_down(&a, &b), vec![0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_first_row_is_false() {
        assert_eq!(cross_up(&[5.0], &[0.0]), vec![0.0]);
        assert_eq!(cross_down(&[-5.0], &[0.0]), vec![0.0]);
    }

    #[test]
    fn test_undefined_never_fires() {
        let a = [f64::NAN, 3.0, f64::NAN, 1.0];
        let b = [2.0; 4];
        assert_eq!(cross_up(&a, &b), vec![0.0; 4]);
        assert_eq!(cross_down(&a, &b), vec![0.0; 4]);
    }

    #[test]
    fn test_crossings_are_mutually_exclusive() {
        let mut rng = rand::thread_rng();
        let a: Vec<f64> = (0..500).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let b: Vec<f64> = (0..500).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let up = cross_up(&a, &b);
        let down = cross_down(&a, &b);
        assert!(up.iter().zip(&down).all(|(u, d)| u + d <= 1.0));
    }

    #[test]
    fn test_position_signal() {
        let entry = [0.0, 1.0, 0.0, 0.0, 1.0, 1.0];
        let exit = [0.0, 0.0, 0.0, 1.0, 0.0, 1.0];
        assert_eq!(
            position_signal(&entry, &exit),
            vec![0.0, 1.0, 1.0, 0.0, 1.0, 0.0]
        );
    }
}
