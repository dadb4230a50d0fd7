//! Type-safe pool addressing.
//!
//! A [`PoolCode`] is the 5-digit wire identifier of a pool: a 2-digit
//! [`CityCode`] (vehicle plate code of the city) followed by a 3-digit
//! [`SectorCode`] slot. The textual form is stable: `^[0-9]{2}[0-9]{3}$`,
//! no separators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Highest sector slot a city can hold.
pub const MAX_SECTOR_SLOT: u16 = 999;

/// Two-digit city plate code (`"01"`..`"99"`, `"00"` is format-valid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CityCode(u8);

impl CityCode {
    /// Parses a city code from exactly two ASCII digits.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidCityCode`] for any other input.
    pub fn parse(s: &str) -> Result<Self, GatewayError> {
        parse_digits(s, 2)
            .and_then(|v| u8::try_from(v).ok())
            .map(Self)
            .ok_or_else(|| GatewayError::InvalidCityCode(s.to_string()))
    }

    /// Returns the numeric value of the code.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for CityCode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CityCode {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CityCode> for String {
    fn from(code: CityCode) -> Self {
        code.to_string()
    }
}

/// Lowest sector slot; `000` is never assigned.
pub const MIN_SECTOR_SLOT: u16 = 1;

/// Three-digit sector slot within a city (`001`..=`999`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectorCode(u16);

impl SectorCode {
    /// Creates a sector code from a slot number in
    /// `MIN_SECTOR_SLOT..=MAX_SECTOR_SLOT`.
    #[must_use]
    pub const fn from_slot(slot: u16) -> Option<Self> {
        if slot < MIN_SECTOR_SLOT || slot > MAX_SECTOR_SLOT {
            None
        } else {
            Some(Self(slot))
        }
    }

    /// Parses a sector code from exactly three ASCII digits, `001`..=`999`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPoolCodeFormat`] for any other input,
    /// including `000`.
    pub fn parse(s: &str) -> Result<Self, GatewayError> {
        parse_digits(s, 3)
            .and_then(|v| u16::try_from(v).ok())
            .and_then(Self::from_slot)
            .ok_or_else(|| GatewayError::InvalidPoolCodeFormat(s.to_string()))
    }

    /// Returns the slot number.
    #[must_use]
    pub const fn slot(self) -> u16 {
        self.0
    }
}

impl fmt::Display for SectorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl TryFrom<String> for SectorCode {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SectorCode> for String {
    fn from(code: SectorCode) -> Self {
        code.to_string()
    }
}

/// Unique identifier of a protection pool: city code + sector slot.
///
/// Immutable after creation. Used as the key in
/// [`super::PoolRegistry`], as the event discriminator, and as the
/// WebSocket subscription target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PoolCode {
    city: CityCode,
    sector: SectorCode,
}

impl PoolCode {
    /// Composes a pool code from its parts.
    #[must_use]
    pub const fn new(city: CityCode, sector: SectorCode) -> Self {
        Self { city, sector }
    }

    /// Parses the 5-digit textual form.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPoolCodeFormat`] unless the input is
    /// exactly five ASCII digits.
    pub fn parse(s: &str) -> Result<Self, GatewayError> {
        let invalid = || GatewayError::InvalidPoolCodeFormat(s.to_string());
        if s.len() != 5 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let city = s
            .get(..2)
            .and_then(|c| CityCode::parse(c).ok())
            .ok_or_else(invalid)?;
        let sector = s
            .get(2..)
            .and_then(|c| SectorCode::parse(c).ok())
            .ok_or_else(invalid)?;
        Ok(Self { city, sector })
    }

    /// Returns the city part.
    #[must_use]
    pub const fn city(&self) -> CityCode {
        self.city
    }

    /// Returns the sector part.
    #[must_use]
    pub const fn sector(&self) -> SectorCode {
        self.sector
    }
}

impl fmt::Display for PoolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.city, self.sector)
    }
}

impl FromStr for PoolCode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PoolCode {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PoolCode> for String {
    fn from(code: PoolCode) -> Self {
        code.to_string()
    }
}

/// Parses exactly `width` ASCII digits.
fn parse_digits(s: &str, width: usize) -> Option<u32> {
    if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_city_and_sector() {
        let Ok(code) = PoolCode::parse("34001") else {
            panic!("valid code rejected");
        };
        assert_eq!(code.city().value(), 34);
        assert_eq!(code.sector().slot(), 1);
        assert_eq!(code.to_string(), "34001");
    }

    #[test]
    fn keeps_leading_zeros() {
        let Ok(code) = PoolCode::parse("06042") else {
            panic!("valid code rejected");
        };
        assert_eq!(code.city().to_string(), "06");
        assert_eq!(code.sector().to_string(), "042");
        assert_eq!(code.to_string(), "06042");
    }

    #[test]
    fn rejects_malformed_codes() {
        for bad in ["", "3400", "340011", "34a01", " 3401", "34-01", "٣٤٠٠١", "+3401"] {
            let result = PoolCode::parse(bad);
            assert!(
                matches!(result, Err(GatewayError::InvalidPoolCodeFormat(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn city_code_requires_two_digits() {
        assert!(CityCode::parse("34").is_ok());
        assert!(matches!(
            CityCode::parse("4"),
            Err(GatewayError::InvalidCityCode(_))
        ));
        assert!(matches!(
            CityCode::parse("340"),
            Err(GatewayError::InvalidCityCode(_))
        ));
    }

    #[test]
    fn sector_slot_bounds() {
        assert!(SectorCode::from_slot(1).is_some());
        assert!(SectorCode::from_slot(999).is_some());
        assert!(SectorCode::from_slot(0).is_none());
        assert!(SectorCode::from_slot(1000).is_none());
    }

    #[test]
    fn slot_zero_is_not_a_pool_code() {
        assert!(matches!(
            SectorCode::parse("000"),
            Err(GatewayError::InvalidPoolCodeFormat(_))
        ));
        assert!(matches!(
            PoolCode::parse("34000"),
            Err(GatewayError::InvalidPoolCodeFormat(_))
        ));
        assert!(PoolCode::parse("34001").is_ok());
    }

    #[test]
    fn orders_by_city_then_sector() {
        let (Ok(a), Ok(b), Ok(c)) = (
            PoolCode::parse("01999"),
            PoolCode::parse("06001"),
            PoolCode::parse("06002"),
        ) else {
            panic!("valid codes rejected");
        };
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn serde_uses_textual_form() {
        let Ok(code) = PoolCode::parse("35007") else {
            panic!("valid code rejected");
        };
        let json = serde_json::to_string(&code).unwrap_or_default();
        assert_eq!(json, "\"35007\"");

        let back: Result<PoolCode, _> = serde_json::from_str("\"35007\"");
        assert!(matches!(back, Ok(c) if c == code));

        let bad: Result<PoolCode, _> = serde_json::from_str("\"35x07\"");
        assert!(bad.is_err());
    }
}
