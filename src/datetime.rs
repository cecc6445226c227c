use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveTime};

/// Kimaiに送る時刻の書式。
const TIME_FORMAT: &str = "%H:%M:%S";

/// 時刻文字列を`HH:MM:SS`に揃える。
///
/// `HH:MM`は`:00`を付与し、`H:MM`は時を0埋めしたうえで`:00`を付与する。
/// 区切り文字`:`を含まない文字列や、それ以外の長さの文字列はそのまま返す。
/// 数値の範囲は検証しない。
pub fn normalize_time(raw: &str) -> String {
    if !raw.contains(':') {
        return raw.to_string();
    }

    match raw.len() {
        5 => format!("{}:00", raw),
        4 if raw.find(':') == Some(1) => format!("0{}:00", raw),
        _ => raw.to_string(),
    }
}

/// 日付と時刻からタイムゾーンなしのローカル日時文字列を作る。
pub fn local_timestamp(date: &str, time: &str) -> String {
    format!("{}T{}", date, time)
}

/// 開始時刻から`duration`経過後の時刻を返す。
///
/// 終了時刻が翌日にまたがる場合はエラーとする。
pub fn end_time_after(begin: &str, duration: Duration) -> Result<String> {
    let begin_time = NaiveTime::parse_from_str(begin, TIME_FORMAT)
        .with_context(|| format!("Failed to parse time: {}", begin))?;
    if duration <= Duration::zero() {
        bail!("Duration must be positive: {}", duration);
    }

    let (end_time, overflow_seconds) = begin_time.overflowing_add_signed(duration);
    if overflow_seconds != 0 {
        bail!("End time crosses midnight: {} + {}", begin, duration);
    }

    Ok(end_time.format(TIME_FORMAT).to_string())
}

/// 開始時刻が終了時刻より前かどうかを判定する。
///
/// どちらかが`HH:MM:SS`として解釈できない場合は`None`を返す。
pub fn is_ordered(begin: &str, end: &str) -> Option<bool> {
    let begin = NaiveTime::parse_from_str(begin, TIME_FORMAT).ok()?;
    let end = NaiveTime::parse_from_str(end, TIME_FORMAT).ok()?;

    Some(begin < end)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rstest::rstest;

    use super::{end_time_after, is_ordered, local_timestamp, normalize_time};

    #[rstest]
    #[case::minute_precision("09:30", "09:30:00")]
    #[case::single_digit_hour("9:30", "09:30:00")]
    #[case::second_precision("09:30:15", "09:30:15")]
    #[case::no_separator("0930", "0930")]
    #[case::empty("", "")]
    #[case::out_of_range("99:99", "99:99:00")]
    #[case::unexpected_length("9:3", "9:3")]
    fn test_normalize_time(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_time(raw), expected);
    }

    /// 全ての`HH:MM`が`HH:MM:00`になることを確認する。
    #[test]
    fn test_normalize_time_all_minutes() {
        for hour in 0..24 {
            for minute in 0..60 {
                let raw = format!("{:02}:{:02}", hour, minute);
                assert_eq!(normalize_time(&raw), format!("{}:00", raw));
                assert_eq!(normalize_time(&format!("{}:00", raw)), format!("{}:00", raw));
            }
        }
    }

    #[test]
    fn test_local_timestamp() {
        assert_eq!(
            local_timestamp("2025-07-15", "09:00:00"),
            "2025-07-15T09:00:00"
        );
    }

    #[rstest]
    #[case::one_hour("09:00:00", Duration::seconds(3600), "10:00:00")]
    #[case::until_last_second("23:00:00", Duration::seconds(3599), "23:59:59")]
    fn test_end_time_after(#[case] begin: &str, #[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(end_time_after(begin, duration).unwrap(), expected);
    }

    #[rstest]
    #[case::crosses_midnight("23:30:00", Duration::seconds(3600))]
    #[case::invalid_time("09:00", Duration::seconds(3600))]
    #[case::zero_duration("09:00:00", Duration::zero())]
    fn test_end_time_after_error(#[case] begin: &str, #[case] duration: Duration) {
        assert!(end_time_after(begin, duration).is_err());
    }

    #[rstest]
    #[case::ordered("09:00:00", "09:30:00", Some(true))]
    #[case::same("09:00:00", "09:00:00", Some(false))]
    #[case::reversed("10:00:00", "09:00:00", Some(false))]
    #[case::unparsable("9am", "09:30:00", None)]
    fn test_is_ordered(#[case] begin: &str, #[case] end: &str, #[case] expected: Option<bool>) {
        assert_eq!(is_ordered(begin, end), expected);
    }
}
