use core::fmt;
use std::fmt::{Debug, Display};
use std::str::FromStr;

use diesel::backend::Backend;
use diesel::deserialize::{FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::Pg;
use diesel::serialize::ToSql;
use diesel::sql_types;
use quickcheck::Arbitrary;
use serde::{Deserialize, Serialize};

/// A [`serde`] and [`diesel`]-compatible wrapper around a hex-encoded byte
/// sequence (of arbitrary length) with `0x` prefix. Parsing and deserializing
/// from hex strings without the `0x` prefix is also allowed.
///
/// The [`Display`] implementation is the canonical text form used everywhere
/// receipts are persisted: lowercase, always prefixed.
///
/// You should generally try to avoid using this type directly, and instead
/// alias it to something more descriptive for its intended use case, possibly
/// by enforcing a specific length.
#[derive(
    Copy,
    Clone,
    Default,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsExpression,
    FromSqlRow,
    derive_more::From,
)]
#[diesel(sql_type = sql_types::Binary)]
pub struct HexString<T>(pub T);

impl<const N: usize> HexString<[u8; N]> {
    /// Parses a fixed-width hex string. Unlike [`FromStr`], this doesn't
    /// depend on [`hex::FromHex`] being implemented for `[u8; N]`, which the
    /// `hex` crate only does for a handful of widths.
    pub fn parse_fixed(s: &str) -> Result<Self, &'static str> {
        let HexString(bytes) = s.parse::<HexString<Vec<u8>>>()?;
        <[u8; N]>::try_from(bytes)
            .map(Self)
            .map_err(|_| "hex string has the wrong length")
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl<T: AsRef<[u8]>> Display for HexString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_ref()))
    }
}

impl<T: AsRef<[u8]>> Serialize for HexString<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self)
    }
}

impl<T: hex::FromHex> FromStr for HexString<T> {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The `0x` prefix is optional.
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        hex::FromHex::from_hex(stripped)
            .map(Self)
            .map_err(|_| "invalid hex string")
    }
}

impl<'a, T: hex::FromHex> Deserialize<'a> for HexString<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<T> ToSql<sql_types::Binary, Pg> for HexString<T>
where
    T: AsRef<[u8]> + Debug,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Pg>,
    ) -> diesel::serialize::Result {
        ToSql::<sql_types::Binary, Pg>::to_sql(self.0.as_ref(), out)
    }
}

impl<T> FromSql<sql_types::Binary, Pg> for HexString<T>
where
    T: TryFrom<Vec<u8>>,
    T::Error: Debug,
{
    fn from_sql(bytes: <Pg as Backend>::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        T::try_from(FromSql::<sql_types::Binary, Pg>::from_sql(bytes)?)
            .map(HexString)
            .map_err(|e| anyhow::anyhow!("{:?}", e).into())
    }
}

impl<T: Arbitrary> Arbitrary for HexString<T> {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self(T::arbitrary(g))
    }
}
