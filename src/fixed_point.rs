//! 17.14 fixed-point arithmetic.
//!
//! The MLFQS statistics are rational numbers, but the timer interrupt may not
//! touch floating-point state. A [`Fixed`] keeps the value scaled by `2^14` in
//! an `i32`: 17 integer bits, 14 fraction bits, one sign bit.
//!
//! Fixed-with-fixed products and quotients widen to `i64` so the intermediate
//! result does not overflow.

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Sub};

/// Number of fraction bits.
pub const Q: u32 = 14;

/// `1.0` in 17.14 representation.
const F: i32 = 1 << Q;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(F);

    /// Converts an integer `n` to fixed point.
    pub const fn from_int(n: i32) -> Self {
        Fixed(n * F)
    }

    /// Reinterprets a raw 17.14 bit pattern.
    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Converts to an integer, rounding toward zero.
    pub const fn trunc(self) -> i32 {
        self.0 / F
    }

    /// Converts to an integer, rounding to nearest. Halves round away from
    /// zero for both signs.
    pub const fn round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F / 2) / F
        } else {
            (self.0 - F / 2) / F
        }
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl Add<i32> for Fixed {
    type Output = Fixed;

    fn add(self, n: i32) -> Fixed {
        Fixed(self.0 + n * F)
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

impl Sub<i32> for Fixed {
    type Output = Fixed;

    fn sub(self, n: i32) -> Fixed {
        Fixed(self.0 - n * F)
    }
}

impl Mul for Fixed {
    type Output = Fixed;

    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed((self.0 as i64 * rhs.0 as i64 / F as i64) as i32)
    }
}

impl Mul<i32> for Fixed {
    type Output = Fixed;

    fn mul(self, n: i32) -> Fixed {
        Fixed(self.0 * n)
    }
}

impl Div for Fixed {
    type Output = Fixed;

    fn div(self, rhs: Fixed) -> Fixed {
        Fixed((self.0 as i64 * F as i64 / rhs.0 as i64) as i32)
    }
}

impl Div<i32> for Fixed {
    type Output = Fixed;

    fn div(self, n: i32) -> Fixed {
        Fixed(self.0 / n)
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Two decimals are plenty for load averages.
        let hundredths = (*self * 100).round();
        let sign = if hundredths < 0 { "-" } else { "" };
        let abs = hundredths.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip() {
        for n in [-131072, -1000, -1, 0, 1, 7, 63, 131071] {
            assert_eq!(Fixed::from_int(n).trunc(), n);
            assert_eq!(Fixed::from_int(n).round(), n);
        }
    }

    #[test]
    fn truncation_goes_toward_zero() {
        let x = Fixed::from_int(7) / 2;
        assert_eq!(x.trunc(), 3);
        assert_eq!((-x).trunc(), -3);
    }

    #[test]
    fn halves_round_away_from_zero() {
        let half = Fixed::from_int(5) / 2;
        assert_eq!(half.round(), 3);
        assert_eq!((-half).round(), -3);

        let below = Fixed::from_raw(Fixed::from_int(2).raw() + F / 2 - 1);
        assert_eq!(below.round(), 2);
        assert_eq!((-below).round(), -2);
    }

    #[test]
    fn mixed_arithmetic() {
        let x = Fixed::from_int(3);
        assert_eq!((x + 2).trunc(), 5);
        assert_eq!((x - 5).trunc(), -2);
        assert_eq!((x * 4).trunc(), 12);
        assert_eq!((x / 2).round(), 2);
        assert_eq!((x + Fixed::ONE - Fixed::from_int(2)).trunc(), 2);
    }

    #[test]
    fn widened_product_and_quotient() {
        // The raw product of two 300s needs more than 32 bits.
        let big = Fixed::from_int(300);
        assert_eq!((big * big).trunc(), 90_000);
        assert_eq!((big / Fixed::from_int(3)).trunc(), 100);

        let big = Fixed::from_int(1000);
        assert_eq!((big / Fixed::from_int(8)).trunc(), 125);

        let third = Fixed::ONE / Fixed::from_int(3);
        assert_eq!((third * 300).round(), 100);
    }

    #[test]
    fn load_average_coefficients() {
        let a = Fixed::from_int(59) / Fixed::from_int(60);
        let b = Fixed::from_int(1) / Fixed::from_int(60);
        assert_eq!((a + b).round(), 1);
        assert_eq!((b * 60).round(), 1);
    }

    #[test]
    fn debug_shows_two_decimals() {
        assert_eq!(alloc::format!("{:?}", Fixed::from_int(3) / 4), "0.75");
        assert_eq!(alloc::format!("{:?}", -(Fixed::from_int(3) / 2)), "-1.50");
    }
}
