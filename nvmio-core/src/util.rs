// vim: tw=80
//! Buffer helpers for tests and verification tools

use std::str::FromStr;

const ANUM: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// A data pattern for filling buffers
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Fill {
    /// Repeating alphanumeric characters, starting with '0'
    #[default]
    Anum,
    Zero,
    /// A constant byte
    Byte(u8),
}

impl FromStr for Fill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anum" => Ok(Fill::Anum),
            "zero" => Ok(Fill::Zero),
            _ => {
                let b = if let Some(hex) = s.strip_prefix("0x") {
                    u8::from_str_radix(hex, 16)
                } else {
                    s.parse::<u8>()
                };
                b.map(Fill::Byte)
                    .map_err(|_| format!("Unknown fill pattern {s:?}"))
            }
        }
    }
}

/// Fill `buf` according to `fill`
pub fn buf_fill(buf: &mut [u8], fill: Fill) {
    match fill {
        Fill::Anum => {
            for (b, c) in buf.iter_mut().zip(ANUM.iter().cycle()) {
                *b = *c;
            }
        },
        Fill::Zero => buf.fill(0),
        Fill::Byte(x) => buf.fill(x),
    }
}

/// Count the bytes at which `a` and `b` differ.  Any difference in length
/// counts as that many differing bytes.
pub fn buf_diff(a: &[u8], b: &[u8]) -> usize {
    let common = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count();
    common + a.len().abs_diff(b.len())
}

// LCOV_EXCL_STOP
