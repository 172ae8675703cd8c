//! Compressed IEEE-754-like floats used by sensor readings and beacons.
//!
//! Readings are packed into the low 12 bits of a `u16` with a format-specific
//! split between sign, exponent and fraction. The sign bit, when present,
//! sits right above the exponent field.

/// Widest packed reading, in bits.
const MAX_WIDTH: u8 = 16;

/// Bit widths of a compressed float.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatFormat {
    /// 0 for unsigned values, 1 for signed.
    sign_bits: u8,
    /// Width of the biased exponent, never zero.
    exponent_bits: u8,
    fraction_bits: u8,
}

impl FloatFormat {
    /// Temperature in °C: signed, 4-bit exponent, 7-bit fraction.
    pub const TEMPERATURE: Self = Self::packed(1, 4, 7);
    /// Relative humidity in %: unsigned, 4-bit exponent, 8-bit fraction.
    pub const HUMIDITY: Self = Self::packed(0, 4, 8);
    /// Atmospheric pressure in hPa: unsigned, 5-bit exponent, 7-bit fraction.
    pub const PRESSURE: Self = Self::packed(0, 5, 7);

    const fn packed(sign_bits: u8, exponent_bits: u8, fraction_bits: u8) -> Self {
        Self {
            sign_bits,
            exponent_bits,
            fraction_bits,
        }
    }

    /// Build a format from explicit bit widths.
    ///
    /// Returns `None` unless the sign is 0 or 1 bit, the exponent is at least
    /// one bit wide and all fields fit in 16 bits.
    #[must_use]
    pub const fn new(sign_bits: u8, exponent_bits: u8, fraction_bits: u8) -> Option<Self> {
        if sign_bits > 1
            || exponent_bits == 0
            || exponent_bits > MAX_WIDTH
            || fraction_bits > MAX_WIDTH
            || sign_bits + exponent_bits + fraction_bits > MAX_WIDTH
        {
            return None;
        }
        Some(Self::packed(sign_bits, exponent_bits, fraction_bits))
    }

    #[must_use]
    pub const fn sign_bits(self) -> u8 {
        self.sign_bits
    }

    #[must_use]
    pub const fn exponent_bits(self) -> u8 {
        self.exponent_bits
    }

    #[must_use]
    pub const fn fraction_bits(self) -> u8 {
        self.fraction_bits
    }

    fn bias(self) -> i32 {
        (1_i32 << (self.exponent_bits - 1)) - 1
    }
}

/// Decode `bits` according to `format`.
///
/// | Exponent | Fraction | Result |
/// |----------|----------|--------|
/// | 0 | 0 | `0.0` |
/// | 0 | ≠ 0 | subnormal `±frac · 2^(1-bias)` |
/// | 1 ..= max-1 | any | normal `±(1+frac) · 2^(exp-bias)` |
/// | max | 0 | `+∞` |
/// | max | ≠ 0 | `NaN` |
#[must_use]
pub fn decode(bits: u16, format: FloatFormat) -> f64 {
    let bits = u32::from(bits);
    let exponent_bits = u32::from(format.exponent_bits);
    let fraction_bits = u32::from(format.fraction_bits);

    let negative = format.sign_bits == 1 && (bits >> (exponent_bits + fraction_bits)) & 1 == 1;
    let sign = if negative { -1.0 } else { 1.0 };

    let max = (1_u32 << exponent_bits) - 1;
    let exponent = (bits >> fraction_bits) & max;
    let raw_fraction = bits & ((1_u32 << fraction_bits) - 1);
    let fraction = f64::from(raw_fraction) / f64::from(1_u32 << fraction_bits);

    let bias = format.bias();
    // `exponent` is at most 16 bits wide, the cast cannot wrap.
    #[allow(clippy::cast_possible_wrap)]
    let exponent_value = exponent as i32;

    if exponent == 0 && raw_fraction == 0 {
        0.0
    } else if exponent == 0 {
        sign * fraction * 2_f64.powi(1 - bias)
    } else if exponent < max {
        sign * (1.0 + fraction) * 2_f64.powi(exponent_value - bias)
    } else if raw_fraction == 0 {
        f64::INFINITY
    } else {
        f64::NAN
    }
}
