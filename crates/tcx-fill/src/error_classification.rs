//! §4.3.4 error classification: every broker error encountered while
//! polling an order is sorted into one of three buckets that decide
//! whether the monitor loop retries, terminates, or simply keeps going.

use tcx_core::BrokerError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fail fast — the order can never be resolved by retrying.
    Permanent,
    /// Retry with exponential backoff + jitter (capped at 30s); rate-limit
    /// signals get an extra delay.
    Transient,
    /// Keep monitoring; does not count as a terminal failure.
    Ambiguous,
}

const PERMANENT_INDICATORS: &[&str] = &[
    "invalid order id",
    "order not found",
    "already canceled",
    "already cancelled",
    "unauthorized",
    "forbidden",
    "invalid parameter",
];

const TRANSIENT_INDICATORS: &[&str] = &[
    "timeout",
    "connection",
    "network",
    "rate limit",
    "429",
    "503",
    "504",
    "temporary",
    "unavailable",
];

pub fn classify_error(err: &BrokerError) -> ErrorClass {
    match err {
        BrokerError::NotFound(_) | BrokerError::AlreadyTerminal | BrokerError::Unauthorized => {
            ErrorClass::Permanent
        }
        BrokerError::Timeout(_) | BrokerError::RateLimited { .. } | BrokerError::Connection(_) => {
            ErrorClass::Transient
        }
        BrokerError::Rejected(msg) | BrokerError::Protocol(msg) => classify_message(msg),
    }
}

fn classify_message(msg: &str) -> ErrorClass {
    let lower = msg.to_lowercase();
    if PERMANENT_INDICATORS.iter().any(|i| lower.contains(i)) {
        return ErrorClass::Permanent;
    }
    if TRANSIENT_INDICATORS.iter().any(|i| lower.contains(i)) {
        return ErrorClass::Transient;
    }
    ErrorClass::Ambiguous
}

/// Extra delay (ms) a rate-limit signal should add to the caller's backoff,
/// beyond the base exponential schedule.
pub fn rate_limit_extra_delay_ms(err: &BrokerError) -> u64 {
    match err {
        BrokerError::RateLimited { retry_after_ms: Some(ms) } => *ms,
        BrokerError::RateLimited { retry_after_ms: None } => 1_000,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_permanent() {
        assert_eq!(
            classify_error(&BrokerError::NotFound("x".into())),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn timeout_is_transient() {
        assert_eq!(classify_error(&BrokerError::Timeout(2_000)), ErrorClass::Transient);
    }

    #[test]
    fn rejected_with_invalid_parameter_text_is_permanent() {
        let err = BrokerError::Rejected("Invalid parameter: qty".into());
        assert_eq!(classify_error(&err), ErrorClass::Permanent);
    }

    #[test]
    fn rejected_with_network_text_is_transient() {
        let err = BrokerError::Rejected("network error talking to upstream".into());
        assert_eq!(classify_error(&err), ErrorClass::Transient);
    }

    #[test]
    fn unrecognized_message_is_ambiguous() {
        let err = BrokerError::Protocol("unexpected shape: {}".into());
        assert_eq!(classify_error(&err), ErrorClass::Ambiguous);
    }

    #[test]
    fn rate_limited_extra_delay_uses_retry_after() {
        let err = BrokerError::RateLimited { retry_after_ms: Some(5_000) };
        assert_eq!(rate_limit_extra_delay_ms(&err), 5_000);
    }
}
