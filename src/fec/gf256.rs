//! GF(2^8) arithmetic over the primitive polynomial x^8 + x^4 + x^3 + x^2 + 1.

use once_cell::sync::Lazy;

/// Field polynomial, including the x^8 term.
pub const PRIMITIVE_POLY: u16 = 0x11D;

/// Number of non-zero field elements; also the full codeword length.
pub const FIELD_ORDER: usize = 255;

pub(crate) struct GfTables {
    /// α^i for i in 0..510, doubled so sums of two logs index directly
    exp: [u8; 2 * FIELD_ORDER],
    /// log_α(x) for x in 1..=255; entry 0 is unused
    log: [u8; 256],
}

static TABLES: Lazy<GfTables> = Lazy::new(|| {
    let mut exp = [0u8; 2 * FIELD_ORDER];
    let mut log = [0u8; 256];

    let mut x: u16 = 1;
    for i in 0..FIELD_ORDER {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE_POLY;
        }
    }
    for i in FIELD_ORDER..2 * FIELD_ORDER {
        exp[i] = exp[i - FIELD_ORDER];
    }

    GfTables { exp, log }
});

/// Multiply two field elements.
#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = &*TABLES;
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

/// Divide `a` by the non-zero element `b`.
#[inline]
pub fn div(a: u8, b: u8) -> u8 {
    debug_assert!(b != 0, "division by zero in GF(256)");
    if a == 0 {
        return 0;
    }
    let t = &*TABLES;
    t.exp[t.log[a as usize] as usize + FIELD_ORDER - t.log[b as usize] as usize]
}

/// α^power, for any (possibly negative) exponent.
#[inline]
pub fn alpha_pow(power: i64) -> u8 {
    TABLES.exp[power.rem_euclid(FIELD_ORDER as i64) as usize]
}

/// Evaluate a polynomial stored lowest degree first.
#[inline]
pub fn poly_eval(poly: &[u8], x: u8) -> u8 {
    poly.iter().rev().fold(0, |acc, &c| mul(acc, x) ^ c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_identities() {
        assert_eq!(mul(0, 7), 0);
        assert_eq!(mul(7, 0), 0);
        assert_eq!(mul(1, 0x53), 0x53);
        assert_eq!(mul(7, 13), mul(13, 7));
        // α^8 reduces through the field polynomial
        assert_eq!(mul(0x80, 2), 0x1D);
    }

    #[test]
    fn test_div_inverts_mul() {
        for a in 1..=255u8 {
            for b in [1u8, 2, 3, 0x1D, 0x8E, 0xFF] {
                assert_eq!(div(mul(a, b), b), a);
            }
        }
    }

    #[test]
    fn test_alpha_pow_wraps() {
        assert_eq!(alpha_pow(0), 1);
        assert_eq!(alpha_pow(1), 2);
        assert_eq!(alpha_pow(255), 1);
        assert_eq!(mul(alpha_pow(-1), 2), 1);
    }

    #[test]
    fn test_poly_eval() {
        // 3 + 2x evaluated at 1 is 3 ^ 2
        assert_eq!(poly_eval(&[3, 2], 1), 1);
        assert_eq!(poly_eval(&[5], 0x42), 5);
        assert_eq!(poly_eval(&[], 9), 0);
    }
}
