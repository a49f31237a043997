//! Commodity deal details and the draft builder
use super::error::DealError;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

// Also used for constructing drafts
// Key is the hash of this struct encoded into CBOR
#[derive(minicbor::Encode, minicbor::Decode, Debug, Default, Clone, Eq, PartialEq)]
pub struct Deal {
    // No ID field, the deal id lives on the context and the details are keyed by hash
    #[n(0)]
    commodity: Option<String>,
    #[n(1)]
    volume: Option<Amount>,
    #[n(2)]
    price_per_unit: Option<Amount>,
    #[n(3)]
    total_value: Option<Amount>, // authoritative once finalised
    #[n(4)]
    buyer: Option<String>,
    #[n(5)]
    seller: Option<String>,
    #[n(6)]
    contract_date: Option<TimeStamp<Utc>>,
    #[n(7)]
    injection_date: Option<TimeStamp<Utc>>,
    #[n(8)]
    delivery_date: Option<TimeStamp<Utc>>,
    #[n(9)]
    notes: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// newtype wrapper over Decimal because it doesn't implement minicbor traits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub Decimal);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        // out of range components collapse to the epoch
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .unwrap_or_default()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl Deal {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_commodity(mut self, commodity: &str) -> Self {
        self.commodity = Some(commodity.trim().to_string());
        self
    }
    pub fn set_volume(mut self, volume: Decimal) -> Self {
        self.volume = Some(Amount(volume));
        self
    }
    pub fn set_price_per_unit(mut self, price: Decimal) -> Self {
        self.price_per_unit = Some(Amount(price));
        self
    }
    pub fn set_total_value(mut self, total: Decimal) -> Self {
        self.total_value = Some(Amount(total));
        self
    }
    pub fn set_buyer(mut self, buyer: &str) -> Self {
        self.buyer = Some(buyer.to_string());
        self
    }
    pub fn set_seller(mut self, seller: &str) -> Self {
        self.seller = Some(seller.to_string());
        self
    }
    pub fn set_contract_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.contract_date = Some(date);
        self
    }
    pub fn set_injection_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.injection_date = Some(date);
        self
    }
    pub fn set_delivery_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.delivery_date = Some(date);
        self
    }
    pub fn set_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn commodity(&self) -> Option<&str> {
        self.commodity.as_deref()
    }
    pub fn volume(&self) -> Option<Decimal> {
        self.volume.map(|a| a.0)
    }
    pub fn price_per_unit(&self) -> Option<Decimal> {
        self.price_per_unit.map(|a| a.0)
    }
    /// The stored total, falling back to volume x price for unfinalised drafts.
    pub fn total_value(&self) -> Option<Decimal> {
        self.total_value
            .map(|a| a.0)
            .or_else(|| self.computed_total())
    }
    pub fn buyer(&self) -> Option<&str> {
        self.buyer.as_deref()
    }
    pub fn seller(&self) -> Option<&str> {
        self.seller.as_deref()
    }
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    fn computed_total(&self) -> Option<Decimal> {
        match (self.volume, self.price_per_unit) {
            (Some(volume), Some(price)) => volume.0.checked_mul(price.0),
            _ => None,
        }
    }

    /// Checks `contract <= injection <= delivery` over whichever dates are set
    pub fn validate_dates(&self) -> bool {
        let dates: Vec<&TimeStamp<Utc>> = [
            self.contract_date.as_ref(),
            self.injection_date.as_ref(),
            self.delivery_date.as_ref(),
        ]
        .into_iter()
        .flatten()
        .collect();

        dates.windows(2).all(|pair| pair[0].0 <= pair[1].0)
    }

    // Checks fields, fixes the total value, and returns a hash of the deal with its contents serialised into cbor
    pub fn validate_and_finalise(&mut self) -> anyhow::Result<(String, Vec<u8>)> {
        if self.commodity.as_deref().is_none_or(str::is_empty) {
            return Err(DealError::MissingField("commodity").into());
        }
        if self.buyer.is_none() {
            return Err(DealError::MissingField("buyer").into());
        }
        if self.seller.is_none() {
            return Err(DealError::MissingField("seller").into());
        }

        let volume = self.volume.ok_or(DealError::MissingField("volume"))?;
        if volume.0 <= Decimal::ZERO {
            return Err(DealError::NonPositive("volume").into());
        }
        let price = self
            .price_per_unit
            .ok_or(DealError::MissingField("price_per_unit"))?;
        if price.0 <= Decimal::ZERO {
            return Err(DealError::NonPositive("price_per_unit").into());
        }

        let expected = self
            .computed_total()
            .ok_or_else(|| anyhow::Error::msg("total value overflowed"))?;
        match self.total_value {
            Some(given) if given.0 != expected => {
                return Err(DealError::TotalValueMismatch {
                    given: given.0,
                    expected,
                }
                .into());
            }
            Some(_) => {}
            None => self.total_value = Some(Amount(expected)),
        }

        if !self.validate_dates() {
            return Err(DealError::InvalidDates.into());
        }

        let contents = minicbor::to_vec(&*self)?;
        let hash = sha256::digest(&contents);

        Ok((hash, contents))
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl<C> minicbor::Encode<C> for Amount {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0.serialize())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Amount {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let bytes: [u8; 16] = d
            .bytes()?
            .try_into()
            .map_err(|_| minicbor::decode::Error::message("decimal must be 16 bytes"))?;

        Ok(Amount(Decimal::deserialize(bytes)))
    }
}
