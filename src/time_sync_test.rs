use super::*;
use time::macros::datetime;

const LOCAL_MS: i64 = 1_714_566_896_000; // 2024-05-01T12:34:56Z

#[test]
fn django_isoformat_with_microseconds_parses() {
    let sync = TimeSync::from_rfc3339("2024-05-01T12:34:56.123456+00:00", LOCAL_MS).expect("valid instant");
    assert_eq!(sync.offset_ms(), 123);
}

#[test]
fn offset_is_server_minus_client() {
    // Local clock runs one hour behind the server.
    let local = LOCAL_MS - 3_600_000;
    let sync = TimeSync::from_rfc3339("2024-05-01T12:34:56Z", local).expect("valid instant");
    assert_eq!(sync.offset_ms(), 3_600_000);
    assert_eq!(sync.server_ms(local), LOCAL_MS);
    assert_eq!(sync.server_ms(local + 1500), LOCAL_MS + 1500);
}

#[test]
fn non_utc_offsets_are_normalized() {
    let sync = TimeSync::from_rfc3339("2024-05-01T09:34:56-03:00", LOCAL_MS).expect("valid instant");
    assert_eq!(sync.offset_ms(), 0);
}

#[test]
fn server_time_immediately_after_construction_matches_input() {
    let sync = TimeSync::from_rfc3339("2030-01-02T03:04:05Z", LOCAL_MS).expect("valid instant");
    assert_eq!(sync.server_time(LOCAL_MS).expect("in range"), datetime!(2030-01-02 03:04:05 UTC));
}

#[test]
fn malformed_timestamps_fail_fast() {
    for input in ["", "not a time", "2024-05-01T12:34:56", "2024-13-01T00:00:00Z"] {
        let err = TimeSync::from_rfc3339(input, LOCAL_MS).expect_err("should reject");
        assert!(matches!(err, EngineError::InvalidTimestamp { .. }), "{input:?} gave {err:?}");
    }
}

#[test]
fn unix_ms_round_trips_through_datetime() {
    let instant = datetime!(2024-05-01 12:34:56.789 UTC);
    let ms = unix_ms(instant);
    assert_eq!(ms, LOCAL_MS + 789);
    assert_eq!(datetime_from_unix_ms(ms).expect("in range"), instant);
}

#[test]
fn unix_ms_handles_pre_epoch_fractions() {
    let instant = datetime!(1969-12-31 23:59:59.5 UTC);
    assert_eq!(unix_ms(instant), -500);
}
