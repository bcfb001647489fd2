//! Rectangular complex phasor used by the protection engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// A phasor in rectangular form. Volts or amperes depending on context;
/// the polar view is derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Phasor {
    pub re: f64,
    pub im: f64,
}

impl Phasor {
    pub const fn new(re: f64, im: f64) -> Self {
        Phasor { re, im }
    }

    pub fn from_polar(magnitude: f64, angle_rad: f64) -> Self {
        Phasor {
            re: magnitude * angle_rad.cos(),
            im: magnitude * angle_rad.sin(),
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.re * self.re + self.im * self.im).sqrt()
    }

    pub fn angle(&self) -> f64 {
        self.im.atan2(self.re)
    }
}

impl Add for Phasor {
    type Output = Phasor;

    fn add(self, rhs: Phasor) -> Phasor {
        Phasor::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Phasor {
    type Output = Phasor;

    fn sub(self, rhs: Phasor) -> Phasor {
        Phasor::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul<f64> for Phasor {
    type Output = Phasor;

    fn mul(self, rhs: f64) -> Phasor {
        Phasor::new(self.re * rhs, self.im * rhs)
    }
}

impl Div for Phasor {
    type Output = Phasor;

    fn div(self, rhs: Phasor) -> Phasor {
        let denom = rhs.re * rhs.re + rhs.im * rhs.im;
        Phasor::new(
            (self.re * rhs.re + self.im * rhs.im) / denom,
            (self.im * rhs.re - self.re * rhs.im) / denom,
        )
    }
}

impl fmt::Display for Phasor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}\u{2220}{:.1}\u{00B0}",
            self.magnitude(),
            self.angle().to_degrees()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_polar_conversion() {
        let p = Phasor::from_polar(1.0, PI / 4.0);
        assert!((p.re - 0.7071).abs() < 0.001);
        assert!((p.im - 0.7071).abs() < 0.001);
        assert!((p.magnitude() - 1.0).abs() < 1e-12);
        assert!((p.angle() - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_arithmetic() {
        let a = Phasor::new(3.0, 4.0);
        let b = Phasor::new(1.0, -2.0);

        assert_eq!(a + b, Phasor::new(4.0, 2.0));
        assert_eq!(a - b, Phasor::new(2.0, 6.0));
        assert_eq!(a * 0.5, Phasor::new(1.5, 2.0));
        assert_eq!(a.magnitude(), 5.0);
    }

    #[test]
    fn test_complex_division() {
        // 230 V over 250 A resistive load: 0.92 ohm at zero angle.
        let v = Phasor::new(230.0, 0.0);
        let i = Phasor::new(250.0, 0.0);
        let z = v / i;
        assert!((z.re - 0.92).abs() < 1e-12);
        assert_eq!(z.im, 0.0);

        // Purely inductive: V leads I by 90 degrees.
        let v = Phasor::from_polar(100.0, PI / 2.0);
        let i = Phasor::new(10.0, 0.0);
        let z = v / i;
        assert!((z.magnitude() - 10.0).abs() < 1e-9);
        assert!((z.angle() - PI / 2.0).abs() < 1e-9);
    }
}
