/// Pulsed gradient spin echo (Stejskal-Tanner) gradient sign at time `t`.
///
/// The gradient is on for `t < dt1`, reversed for `dt2 < t < dt1 + dt2`, and
/// off otherwise.
pub fn pgse(t: f64, dt1: f64, dt2: f64) -> f64 {
    if t < dt1 {
        1.0
    } else if t > dt2 && t < dt1 + dt2 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pgse_phases() {
        let (dt1, dt2) = (1.0, 3.0);
        assert_eq!(pgse(0.5, dt1, dt2), 1.0);
        assert_eq!(pgse(2.0, dt1, dt2), 0.0);
        assert_eq!(pgse(3.5, dt1, dt2), -1.0);
        assert_eq!(pgse(4.0, dt1, dt2), 0.0);
    }
}
