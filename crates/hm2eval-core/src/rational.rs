//! Exact rational numbers over `i128`.
//!
//! Used for integer literals, exact parameter values and the coefficients of
//! the symbolic normal form. Every operation is checked: overflow yields
//! `None` and callers fall back to floating-point comparison.

use std::fmt;

/// A reduced fraction with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rational {
    num: i128,
    den: i128,
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    // 2^127 only arises from i128::MIN; treating it as coprime keeps values valid.
    i128::try_from(a).unwrap_or(1)
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Build `num / den`, reducing. Returns `None` for a zero denominator.
    pub fn new(num: i128, den: i128) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let g = gcd(num, den).max(1);
        let (mut num, mut den) = (num / g, den / g);
        if den < 0 {
            num = num.checked_neg()?;
            den = den.checked_neg()?;
        }
        Some(Self { num, den })
    }

    pub fn integer(n: i128) -> Self {
        Self { num: n, den: 1 }
    }

    pub fn numer(&self) -> i128 {
        self.num
    }

    pub fn denom(&self) -> i128 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn checked_neg(&self) -> Option<Self> {
        Some(Self {
            num: self.num.checked_neg()?,
            den: self.den,
        })
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        let num = self
            .num
            .checked_mul(other.den)?
            .checked_add(other.num.checked_mul(self.den)?)?;
        Self::new(num, self.den.checked_mul(other.den)?)
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.checked_add(&other.checked_neg()?)
    }

    pub fn checked_mul(&self, other: &Self) -> Option<Self> {
        // Cross-reduce first to keep intermediates small.
        let g1 = gcd(self.num, other.den).max(1);
        let g2 = gcd(other.num, self.den).max(1);
        let num = (self.num / g1).checked_mul(other.num / g2)?;
        let den = (self.den / g2).checked_mul(other.den / g1)?;
        Self::new(num, den)
    }

    pub fn checked_recip(&self) -> Option<Self> {
        Self::new(self.den, self.num)
    }

    pub fn checked_div(&self, other: &Self) -> Option<Self> {
        self.checked_mul(&other.checked_recip()?)
    }

    /// Integer power; negative exponents invert.
    pub fn checked_pow(&self, exp: i64) -> Option<Self> {
        let mut base = if exp < 0 { self.checked_recip()? } else { *self };
        let mut n = exp.unsigned_abs();
        let mut result = Self::ONE;
        while n > 0 {
            if n & 1 == 1 {
                result = result.checked_mul(&base)?;
            }
            n >>= 1;
            if n > 0 {
                base = base.checked_mul(&base)?;
            }
        }
        Some(result)
    }

    /// Exact `self^(1/n)` when both numerator and denominator are perfect
    /// `n`-th powers. Odd roots of negative values keep their sign.
    pub fn exact_root(&self, n: u32) -> Option<Self> {
        if n == 0 {
            return None;
        }
        if self.num < 0 && n % 2 == 0 {
            return None;
        }
        let num = integer_root(self.num.unsigned_abs(), n)?;
        let den = integer_root(self.den.unsigned_abs(), n)?;
        let num = i128::try_from(num).ok()?;
        let den = i128::try_from(den).ok()?;
        Self::new(if self.num < 0 { -num } else { num }, den)
    }

    /// Parse an unsigned decimal literal such as `9.81`, `.5` or `6.02e23`
    /// exactly. Returns `None` when it does not fit.
    pub fn from_decimal_str(text: &str) -> Option<Self> {
        let (mantissa, exponent) = match text.find(['e', 'E']) {
            Some(i) => (&text[..i], text[i + 1..].parse::<i32>().ok()?),
            None => (text, 0),
        };
        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        let digits = format!("{int_part}{frac_part}");
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let num: i128 = digits.parse().ok()?;
        let scale = exponent.checked_sub(i32::try_from(frac_part.len()).ok()?)?;
        let ten = Self::integer(10);
        Self::integer(num).checked_mul(&ten.checked_pow(scale as i64)?)
    }
}

fn integer_root(value: u128, n: u32) -> Option<u128> {
    if value < 2 {
        return Some(value);
    }
    let guess = (value as f64).powf(1.0 / n as f64).round() as u128;
    for candidate in guess.saturating_sub(1)..=guess.saturating_add(1) {
        if candidate.checked_pow(n) == Some(value) {
            return Some(candidate);
        }
    }
    None
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i128, d: i128) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn reduces_and_normalizes_sign() {
        assert_eq!(r(6, -4), r(-3, 2));
        assert_eq!(r(6, -4).to_string(), "-3/2");
        assert!(Rational::new(1, 0).is_none());
    }

    #[test]
    fn arithmetic() {
        assert_eq!(r(1, 2).checked_add(&r(1, 3)), Some(r(5, 6)));
        assert_eq!(r(1, 2).checked_mul(&r(2, 3)), Some(r(1, 3)));
        assert_eq!(r(1, 2).checked_div(&r(1, 4)), Some(r(2, 1)));
        assert_eq!(r(2, 3).checked_pow(-2), Some(r(9, 4)));
        assert!(Rational::ZERO.checked_recip().is_none());
    }

    #[test]
    fn overflow_is_none() {
        let big = Rational::integer(i128::MAX / 2);
        assert!(big.checked_mul(&Rational::integer(4)).is_none());
    }

    #[test]
    fn decimal_parsing() {
        assert_eq!(Rational::from_decimal_str("9.81"), Some(r(981, 100)));
        assert_eq!(Rational::from_decimal_str(".5"), Some(r(1, 2)));
        assert_eq!(Rational::from_decimal_str("2.5e3"), Some(r(2500, 1)));
        assert_eq!(Rational::from_decimal_str("1E-2"), Some(r(1, 100)));
        assert_eq!(Rational::from_decimal_str("abc"), None);
    }

    #[test]
    fn roots() {
        assert_eq!(r(4, 9).exact_root(2), Some(r(2, 3)));
        assert_eq!(r(-8, 1).exact_root(3), Some(r(-2, 1)));
        assert_eq!(r(2, 1).exact_root(2), None);
        assert_eq!(r(-4, 1).exact_root(2), None);
    }
}
