//! Arbitrary-precision numbers with IEEE-754-style infinities and NaN.
//!
//! Finite values are `bigdecimal::BigDecimal`; the special values live as
//! explicit variants so that `1/0`, `0/0` and friends behave like their
//! floating-point counterparts instead of panicking. Every operation rounds
//! its result to the process-wide significant-digit precision, which is
//! configured once at startup.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};

pub const DEFAULT_PRECISION: usize = 15;

static PRECISION: AtomicUsize = AtomicUsize::new(DEFAULT_PRECISION);

/// Set the process-wide significant-digit precision. Called once at startup.
pub fn set_precision(digits: usize) {
    PRECISION.store(digits.max(1), AtomicOrdering::Relaxed);
}

pub fn precision() -> usize {
    PRECISION.load(AtomicOrdering::Relaxed)
}

/// Internal arithmetic carries guard digits past the display precision so
/// accumulated rounding cannot disturb the last rendered digit.
fn working_precision() -> u64 {
    precision() as u64 + 8
}

#[derive(Debug, Clone)]
pub enum Number {
    Finite(BigDecimal),
    PosInf,
    NegInf,
    NaN,
}

impl Number {
    pub fn zero() -> Self {
        Number::Finite(BigDecimal::zero())
    }

    pub fn from_i64(n: i64) -> Self {
        Number::Finite(BigDecimal::from(n))
    }

    pub fn from_usize(n: usize) -> Self {
        Number::Finite(BigDecimal::from(n as u64))
    }

    /// Parse a numeric literal or conversion input. Accepts the `inf`, `-inf`
    /// and `nan` spellings alongside decimal notation.
    pub fn parse(text: &str) -> Option<Number> {
        let cleaned: String = text.chars().filter(|c| *c != '_').collect();
        match cleaned.trim() {
            "inf" | "+inf" => return Some(Number::PosInf),
            "-inf" => return Some(Number::NegInf),
            "nan" => return Some(Number::NaN),
            _ => {}
        }
        BigDecimal::from_str(cleaned.trim())
            .ok()
            .map(|bd| Number::Finite(rounded(bd)))
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Number::NaN)
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Number::PosInf | Number::NegInf)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Number::Finite(bd) if bd.is_zero())
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Number::Finite(bd) => bd.is_negative(),
            Number::NegInf => true,
            _ => false,
        }
    }

    pub fn is_integer(&self) -> bool {
        match self {
            Number::Finite(bd) => {
                bd.with_scale_round(0, RoundingMode::Down) == *bd
            }
            _ => false,
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Number::Finite(bd) if self.is_integer() => bd.to_i64(),
            _ => None,
        }
    }

    pub fn neg(&self) -> Number {
        match self {
            Number::Finite(bd) => Number::Finite(-bd),
            Number::PosInf => Number::NegInf,
            Number::NegInf => Number::PosInf,
            Number::NaN => Number::NaN,
        }
    }

    pub fn add(&self, other: &Number) -> Number {
        use Number::*;
        match (self, other) {
            (NaN, _) | (_, NaN) => NaN,
            (PosInf, NegInf) | (NegInf, PosInf) => NaN,
            (PosInf, _) | (_, PosInf) => PosInf,
            (NegInf, _) | (_, NegInf) => NegInf,
            (Finite(a), Finite(b)) => Finite(rounded(a + b)),
        }
    }

    pub fn sub(&self, other: &Number) -> Number {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Number) -> Number {
        use Number::*;
        match (self, other) {
            (NaN, _) | (_, NaN) => NaN,
            (Finite(a), Finite(b)) => Finite(rounded(a * b)),
            (inf, fin) | (fin, inf) if inf.is_infinite() => {
                if fin.is_zero() {
                    NaN
                } else if inf.is_negative() != fin.is_negative() {
                    NegInf
                } else {
                    PosInf
                }
            }
            _ => NaN,
        }
    }

    /// Division with IEEE semantics: `x/0` is a signed infinity for nonzero
    /// `x` and `0/0` is NaN.
    pub fn div(&self, other: &Number) -> Number {
        use Number::*;
        match (self, other) {
            (NaN, _) | (_, NaN) => NaN,
            (a, b) if a.is_infinite() && b.is_infinite() => NaN,
            (inf, Finite(b)) if inf.is_infinite() => {
                if inf.is_negative() != b.is_negative() {
                    NegInf
                } else {
                    PosInf
                }
            }
            (Finite(_), inf) if inf.is_infinite() => Number::zero(),
            (Finite(a), Finite(b)) => {
                if b.is_zero() {
                    if a.is_zero() {
                        NaN
                    } else if a.is_negative() {
                        NegInf
                    } else {
                        PosInf
                    }
                } else {
                    Finite(rounded(a / b))
                }
            }
            _ => NaN,
        }
    }

    /// Remainder with the sign of the dividend, like `fmod`.
    pub fn rem(&self, other: &Number) -> Number {
        use Number::*;
        match (self, other) {
            (NaN, _) | (_, NaN) => NaN,
            (a, PosInf) | (a, NegInf) => a.clone(),
            (PosInf, _) | (NegInf, _) => NaN,
            (Finite(a), Finite(b)) => {
                if b.is_zero() {
                    NaN
                } else {
                    Finite(rounded(a % b))
                }
            }
        }
    }

    pub fn pow(&self, other: &Number) -> Number {
        use Number::*;
        match (self, other) {
            (NaN, _) | (_, NaN) => NaN,
            (_, exp) if exp.is_zero() => Number::from_i64(1),
            (base, PosInf) => match base.abs().partial_cmp_number(&Number::from_i64(1)) {
                Some(Ordering::Greater) => PosInf,
                Some(Ordering::Less) => Number::zero(),
                _ => Number::from_i64(1),
            },
            (base, NegInf) => match base.abs().partial_cmp_number(&Number::from_i64(1)) {
                Some(Ordering::Greater) => Number::zero(),
                Some(Ordering::Less) => PosInf,
                _ => Number::from_i64(1),
            },
            (PosInf, exp) => {
                if exp.is_negative() {
                    Number::zero()
                } else {
                    PosInf
                }
            }
            (NegInf, exp) => {
                if exp.is_negative() {
                    Number::zero()
                } else if exp.to_i64().map(|n| n % 2 != 0).unwrap_or(false) {
                    NegInf
                } else {
                    PosInf
                }
            }
            (Finite(base), exp) => {
                if let Some(n) = exp.to_i64() {
                    pow_integer(base, n)
                } else {
                    pow_fractional(base, exp)
                }
            }
        }
    }

    pub fn abs(&self) -> Number {
        match self {
            Number::Finite(bd) => Number::Finite(bd.abs()),
            Number::PosInf | Number::NegInf => Number::PosInf,
            Number::NaN => Number::NaN,
        }
    }

    pub fn floor(&self) -> Number {
        match self {
            Number::Finite(bd) => Number::Finite(bd.with_scale_round(0, RoundingMode::Floor)),
            other => other.clone(),
        }
    }

    pub fn ceil(&self) -> Number {
        match self {
            Number::Finite(bd) => Number::Finite(bd.with_scale_round(0, RoundingMode::Ceiling)),
            other => other.clone(),
        }
    }

    /// Round half-to-even, optionally to `digits` decimal places.
    pub fn round(&self, digits: i64) -> Number {
        match self {
            Number::Finite(bd) => {
                Number::Finite(bd.with_scale_round(digits, RoundingMode::HalfEven).normalized())
            }
            other => other.clone(),
        }
    }

    pub fn sqrt(&self) -> Number {
        match self {
            Number::NaN => Number::NaN,
            Number::PosInf => Number::PosInf,
            Number::NegInf => Number::NaN,
            Number::Finite(bd) => match bd.sqrt() {
                Some(root) => Number::Finite(rounded(root)),
                None => Number::NaN,
            },
        }
    }

    pub fn sign(&self) -> Number {
        match self {
            Number::NaN => Number::NaN,
            Number::PosInf => Number::from_i64(1),
            Number::NegInf => Number::from_i64(-1),
            Number::Finite(bd) => {
                if bd.is_zero() {
                    Number::zero()
                } else if bd.is_negative() {
                    Number::from_i64(-1)
                } else {
                    Number::from_i64(1)
                }
            }
        }
    }

    /// Ordering for `<`, `>`, `<=`, `>=`. `None` whenever NaN is involved, so
    /// every comparison against NaN is false.
    pub fn partial_cmp_number(&self, other: &Number) -> Option<Ordering> {
        use Number::*;
        match (self, other) {
            (NaN, _) | (_, NaN) => None,
            (PosInf, PosInf) | (NegInf, NegInf) => Some(Ordering::Equal),
            (PosInf, _) => Some(Ordering::Greater),
            (_, PosInf) => Some(Ordering::Less),
            (NegInf, _) => Some(Ordering::Less),
            (_, NegInf) => Some(Ordering::Greater),
            (Finite(a), Finite(b)) => a.partial_cmp(b),
        }
    }

    /// Render with at most `digits` significant digits, mpmath-style: plain
    /// decimal notation in the common range, `1.0e+20` notation outside it.
    pub fn to_repr(&self, digits: usize) -> String {
        let bd = match self {
            Number::NaN => return "nan".into(),
            Number::PosInf => return "inf".into(),
            Number::NegInf => return "-inf".into(),
            Number::Finite(bd) => bd,
        };
        if bd.is_zero() {
            return "0".into();
        }
        let reduced = bd.with_prec(digits as u64).normalized();
        let negative = reduced.is_negative();
        let (int, scale) = reduced.abs().as_bigint_and_exponent();
        let digits_str = int.to_string();
        let ndigits = digits_str.len() as i64;
        let adjusted = ndigits - 1 - scale;

        let body = if adjusted >= digits as i64 || adjusted < -6 {
            let mantissa = if digits_str.len() == 1 {
                format!("{digits_str}.0")
            } else {
                format!("{}.{}", &digits_str[..1], &digits_str[1..])
            };
            if adjusted < 0 {
                format!("{mantissa}e{adjusted}")
            } else {
                format!("{mantissa}e+{adjusted}")
            }
        } else if scale <= 0 {
            format!("{}{}", digits_str, "0".repeat((-scale) as usize))
        } else if scale < ndigits {
            let split = (ndigits - scale) as usize;
            format!("{}.{}", &digits_str[..split], &digits_str[split..])
        } else {
            format!("0.{}{}", "0".repeat((scale - ndigits) as usize), digits_str)
        };
        if negative {
            format!("-{body}")
        } else {
            body
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        use Number::*;
        match (self, other) {
            (Finite(a), Finite(b)) => a == b,
            (PosInf, PosInf) | (NegInf, NegInf) => true,
            _ => false,
        }
    }
}

fn rounded(bd: BigDecimal) -> BigDecimal {
    bd.with_prec(working_precision())
}

fn pow_integer(base: &BigDecimal, exp: i64) -> Number {
    if exp == 0 {
        return Number::from_i64(1);
    }
    if base.is_zero() {
        return if exp < 0 {
            Number::PosInf
        } else {
            Number::zero()
        };
    }
    let mut result = BigDecimal::from(1);
    let mut factor = base.clone();
    let mut n = exp.unsigned_abs();
    while n > 0 {
        if n & 1 == 1 {
            result = rounded(&result * &factor);
        }
        factor = rounded(&factor * &factor);
        n >>= 1;
    }
    if exp < 0 {
        Number::from_i64(1).div(&Number::Finite(result))
    } else {
        Number::Finite(result)
    }
}

/// Fractional exponents fall back to the nearest binary double; the result is
/// re-rounded into the configured precision.
fn pow_fractional(base: &BigDecimal, exp: &Number) -> Number {
    let e = match exp {
        Number::Finite(bd) => match bd.to_f64() {
            Some(e) => e,
            None => return Number::NaN,
        },
        _ => return Number::NaN,
    };
    let b = match base.to_f64() {
        Some(b) => b,
        None => return Number::NaN,
    };
    let result = b.powf(e);
    if result.is_nan() {
        Number::NaN
    } else if result.is_infinite() {
        if result > 0.0 {
            Number::PosInf
        } else {
            Number::NegInf
        }
    } else {
        BigDecimal::from_f64(result)
            .map(|bd| Number::Finite(rounded(bd)))
            .unwrap_or(Number::NaN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(text: &str) -> Number {
        Number::parse(text).expect("literal parses")
    }

    #[test]
    fn division_by_zero_follows_ieee() {
        assert_eq!(num("1").div(&num("0")), Number::PosInf);
        assert_eq!(num("-1").div(&num("0")), Number::NegInf);
        assert!(num("0").div(&num("0")).is_nan());
    }

    #[test]
    fn nan_compares_false() {
        assert_eq!(Number::NaN.partial_cmp_number(&num("42")), None);
        assert!(Number::NaN != Number::NaN);
    }

    #[test]
    fn renders_significant_digits() {
        assert_eq!(num("1").div(&num("3")).to_repr(15), "0.333333333333333");
        assert_eq!(num("100000").to_repr(15), "100000");
        assert_eq!(num("10").pow(&num("20")).to_repr(15), "1.0e+20");
        assert_eq!(num("-2.5").to_repr(15), "-2.5");
    }

    #[test]
    fn integer_powers_are_exact() {
        assert_eq!(num("10").pow(&num("6")).to_repr(15), "1000000");
        assert_eq!(num("2").pow(&num("-2")).to_repr(15), "0.25");
        assert_eq!(num("-2").pow(&num("3")).to_repr(15), "-8");
    }

    #[test]
    fn sqrt_of_negative_is_nan() {
        assert!(num("-4").sqrt().is_nan());
        assert_eq!(num("49").sqrt().to_repr(15), "7");
    }
}
