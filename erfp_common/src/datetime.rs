/*
 * Copyright © 2026, the erfp contributors.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

#[inline]
pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
#[inline]
pub fn hours(n: u64) -> Duration {
    Duration::from_secs(n * 3600)
}
#[inline]
pub fn days(n: u64) -> Duration {
    Duration::from_secs(n * 86400)
}

/// parse a RAPID/ECMWF issue timestamp of the form `YYYYMMDD.HH` into (date,hour)
pub fn parse_issue_timestamp(s: &str) -> Option<(NaiveDate, u32)> {
    let (date_part, hour_part) = s.split_once('.')?;
    if date_part.len() != 8 {
        return None;
    }
    let year: i32 = date_part[0..4].parse().ok()?;
    let month: u32 = date_part[4..6].parse().ok()?;
    let day: u32 = date_part[6..8].parse().ok()?;
    let hour: u32 = hour_part.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some((date, hour))
}

pub fn issue_instant(date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    let time = date.and_hms_opt(hour, 0, 0)?;
    Some(Utc.from_utc_datetime(&time))
}

/// format a `YYYYMMDDtHH` stamp, as used by warm-start filenames (spec.md §4.7)
pub fn warmstart_stamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dt%H").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_issue_timestamp() {
        let (date, hour) = parse_issue_timestamp("20260115.12").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert_eq!(hour, 12);
    }

    #[test]
    fn formats_warmstart_stamp_12h_prior() {
        let dt = issue_instant(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(), 12).unwrap();
        let prior = dt - chrono::Duration::hours(12);
        assert_eq!(warmstart_stamp(&prior), "20260115t00");
    }
}
