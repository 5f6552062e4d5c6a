pub mod chunk;
pub mod curve;
pub mod nut;
pub mod xfbin;

use std::fmt::{Debug, Display, Formatter, Write};

use binrw::binrw;

/// Four-byte signature at the start of a file or sub-record.
#[binrw]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    #[inline]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        data.get(..4).and_then(|b| b.try_into().ok()).map(Self)
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for c in self.0 {
            if c.is_ascii_graphic() || c == b' ' {
                f.write_char(c as char)?;
            } else {
                write!(f, "\\x{c:02x}")?;
            }
        }
        Ok(())
    }
}

impl Debug for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_char('"')?;
        Display::fmt(self, f)?;
        f.write_char('"')
    }
}

impl PartialEq<[u8; 4]> for FourCC {
    fn eq(&self, other: &[u8; 4]) -> bool { &self.0 == other }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_escapes_binary() {
        assert_eq!(FourCC(*b"NUCC").to_string(), "NUCC");
        assert_eq!(format!("{:?}", FourCC(*b"eXt\0")), "\"eXt\\x00\"");
        assert_eq!(FourCC::from_bytes(b"NTP3rest"), Some(FourCC(*b"NTP3")));
        assert_eq!(FourCC::from_bytes(b"NT"), None);
    }
}
