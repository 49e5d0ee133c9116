//! # Delivery Options
//!
//! The few headers that change how a message is stored, parsed once at send
//! time into a typed struct.

use super::message::Headers;
use super::queue_name::validate_queue_name;
use crate::constants::headers as header_names;
use crate::error::{Result, TransportError};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Storage-affecting options carried by a message's headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Row becomes visible at this instant instead of at insert time
    pub deferred_until: Option<DateTime<Utc>>,
    /// Stored under this queue instead of the send destination
    pub deferred_recipient: Option<String>,
    /// Row expires this long after insert
    pub time_to_be_received: Option<Duration>,
}

impl DeliveryOptions {
    pub fn from_headers(headers: &Headers) -> Result<Self> {
        let deferred_until = headers
            .get(header_names::DEFERRED_UNTIL)
            .map(parse_timestamp)
            .transpose()?;

        let deferred_recipient = headers
            .get(header_names::DEFERRED_RECIPIENT)
            .map(|recipient| validate_queue_name(recipient).map(|_| recipient.to_string()))
            .transpose()?;

        let time_to_be_received = headers
            .get(header_names::TIME_TO_BE_RECEIVED)
            .map(parse_time_to_be_received)
            .transpose()?;

        Ok(Self {
            deferred_until,
            deferred_recipient,
            time_to_be_received,
        })
    }

    /// Queue the row is stored under
    pub fn recipient<'a>(&'a self, destination: &'a str) -> &'a str {
        self.deferred_recipient.as_deref().unwrap_or(destination)
    }

    pub fn visible_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.deferred_until.unwrap_or(now)
    }

    /// Expiry of a row stored at `now`; a time to be received past the
    /// representable range is a serialization error
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        self.time_to_be_received
            .map(|ttl| {
                now.checked_add_signed(ttl).ok_or_else(|| {
                    TransportError::serialization(format!(
                        "header {}: {}s is past the latest representable expiry",
                        header_names::TIME_TO_BE_RECEIVED,
                        ttl.num_seconds()
                    ))
                })
            })
            .transpose()
    }
}

/// RFC 3339, or ISO-8601 without an offset (read as UTC)
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(TransportError::serialization(format!(
        "header {}: '{value}' is not an ISO-8601 timestamp",
        header_names::DEFERRED_UNTIL
    )))
}

/// Whole seconds (`90`) or `HH:MM:SS`
pub fn parse_time_to_be_received(value: &str) -> Result<Duration> {
    let value = value.trim();
    let invalid = || {
        TransportError::serialization(format!(
            "header {}: '{value}' is neither whole seconds nor HH:MM:SS",
            header_names::TIME_TO_BE_RECEIVED
        ))
    };

    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        let seconds: i64 = value.parse().map_err(|_| invalid())?;
        return Duration::try_seconds(seconds).ok_or_else(invalid);
    }

    let parts: Vec<&str> = value.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(invalid());
    };
    let parse = |part: &str| -> Result<i64> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        part.parse().map_err(|_| invalid())
    };
    let (hours, minutes, seconds) = (parse(*hours)?, parse(*minutes)?, parse(*seconds)?);
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .and_then(Duration::try_seconds)
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_no_headers_means_immediate_delivery() {
        let options = DeliveryOptions::from_headers(&Headers::new()).unwrap();
        let now = Utc::now();

        assert_eq!(options, DeliveryOptions::default());
        assert_eq!(options.visible_at(now), now);
        assert_eq!(options.recipient("orders"), "orders");
        assert_eq!(options.expires_at(now).unwrap(), None);
    }

    #[test]
    fn test_deferred_headers_parsed() {
        let mut headers = Headers::new();
        headers.insert("Deferred-Until", "2030-01-02T03:04:05.250+02:00");
        headers.insert("deferred-recipient", "invoices");
        headers.insert("time-to-be-received", "00:01:30");

        let options = DeliveryOptions::from_headers(&headers).unwrap();
        let expected = Utc
            .with_ymd_and_hms(2030, 1, 2, 1, 4, 5)
            .unwrap()
            + Duration::milliseconds(250);

        assert_eq!(options.deferred_until, Some(expected));
        assert_eq!(options.recipient("timeouts"), "invoices");
        assert_eq!(options.time_to_be_received, Some(Duration::seconds(90)));

        let now = Utc::now();
        assert_eq!(options.visible_at(now), expected);
        assert_eq!(
            options.expires_at(now).unwrap(),
            Some(now + Duration::seconds(90))
        );
    }

    #[test]
    fn test_timestamp_without_offset_is_utc() {
        let parsed = parse_timestamp("2030-06-01T12:00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap());

        let parsed = parse_timestamp("2030-06-01 12:00:00.5").unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap() + Duration::milliseconds(500)
        );
    }

    #[test]
    fn test_malformed_deferred_until_is_serialization_error() {
        let mut headers = Headers::new();
        headers.insert("deferred-until", "next tuesday");
        let err = DeliveryOptions::from_headers(&headers).unwrap_err();
        assert!(matches!(err, TransportError::Serialization { .. }));
    }

    #[test]
    fn test_empty_deferred_recipient_rejected() {
        let mut headers = Headers::new();
        headers.insert("deferred-recipient", "");
        let err = DeliveryOptions::from_headers(&headers).unwrap_err();
        assert!(matches!(err, TransportError::InvalidName { .. }));
    }

    #[test]
    fn test_time_to_be_received_formats() {
        assert_eq!(parse_time_to_be_received("45").unwrap(), Duration::seconds(45));
        assert_eq!(
            parse_time_to_be_received("2:00:05").unwrap(),
            Duration::seconds(7205)
        );
        assert!(parse_time_to_be_received("").is_err());
        assert!(parse_time_to_be_received("-5").is_err());
        assert!(parse_time_to_be_received("1:75:00").is_err());
        assert!(parse_time_to_be_received("1:2").is_err());
        assert!(parse_time_to_be_received("soon").is_err());
    }

    #[test]
    fn test_time_to_be_received_past_max_datetime_is_serialization_error() {
        let mut headers = Headers::new();
        headers.insert("time-to-be-received", "9223372036854775");

        let options = DeliveryOptions::from_headers(&headers).unwrap();
        let err = options.expires_at(Utc::now()).unwrap_err();
        assert!(matches!(err, TransportError::Serialization { .. }));
    }
}
