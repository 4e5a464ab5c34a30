//! Transport-neutral cell values for query results.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tiberius::numeric::Numeric;
use tiberius::time::{
    Date, DateTime as TdsDateTime, DateTime2, DateTimeOffset as TdsDateTimeOffset, SmallDateTime,
    Time,
};
use tiberius::ColumnData;

/// A single column value, detached from the driver's buffers so payloads
/// can outlive the query stream.
///
/// Driver integers of any width map to `Int`, floats and decimals to
/// `Float`, GUIDs and XML fragments to `String`. Temporal values become
/// calendar types. Nothing else is interpreted or reformatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Maps one driver cell. A SQL `NULL` of any type maps to `Null`, as
    /// does a temporal value outside the supported calendar range.
    pub fn from_column_data(data: ColumnData<'_>) -> CellValue {
        let value = match data {
            ColumnData::Bit(v) => v.map(CellValue::Bool),
            ColumnData::U8(v) => v.map(|n| CellValue::Int(i64::from(n))),
            ColumnData::I16(v) => v.map(|n| CellValue::Int(i64::from(n))),
            ColumnData::I32(v) => v.map(|n| CellValue::Int(i64::from(n))),
            ColumnData::I64(v) => v.map(CellValue::Int),
            ColumnData::F32(v) => v.map(|n| CellValue::Float(f64::from(n))),
            ColumnData::F64(v) => v.map(CellValue::Float),
            ColumnData::String(v) => v.map(|s| CellValue::String(s.into_owned())),
            ColumnData::Guid(v) => v.map(|g| CellValue::String(g.to_string())),
            ColumnData::Binary(v) => v.map(|b| CellValue::Binary(b.into_owned())),
            ColumnData::Numeric(v) => v.map(|n| CellValue::Float(numeric_to_f64(n))),
            ColumnData::Xml(v) => v.map(|x| CellValue::String(x.to_string())),
            ColumnData::Date(v) => v.and_then(date_to_naive).map(CellValue::Date),
            ColumnData::Time(v) => v.and_then(time_to_naive).map(CellValue::Time),
            ColumnData::DateTime(v) => v.and_then(datetime_to_naive).map(CellValue::DateTime),
            ColumnData::SmallDateTime(v) => {
                v.and_then(smalldatetime_to_naive).map(CellValue::DateTime)
            }
            ColumnData::DateTime2(v) => v.and_then(datetime2_to_naive).map(CellValue::DateTime),
            ColumnData::DateTimeOffset(v) => {
                v.and_then(datetime_offset_to_fixed).map(CellValue::DateTimeOffset)
            }
        };
        value.unwrap_or(CellValue::Null)
    }
}

fn numeric_to_f64(numeric: Numeric) -> f64 {
    numeric.value() as f64 / 10f64.powi(i32::from(numeric.scale()))
}

// The wire counts days from 0001-01-01; chrono's day 1 of the common era
// is the same date.
fn date_to_naive(date: Date) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(i32::try_from(date.days()).ok()?.checked_add(1)?)
}

fn time_to_naive(time: Time) -> Option<NaiveTime> {
    let scale = u32::from(time.scale());
    if scale > 9 {
        return None;
    }
    let divisor = 10u64.pow(scale);
    let seconds = time.increments() / divisor;
    let nanos = (time.increments() % divisor).checked_mul(10u64.pow(9 - scale))?;
    NaiveTime::from_num_seconds_from_midnight_opt(
        u32::try_from(seconds).ok()?,
        u32::try_from(nanos).ok()?,
    )
}

fn tds_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)
}

// `datetime`: days plus 1/300-second fragments since 1900-01-01.
fn datetime_to_naive(datetime: TdsDateTime) -> Option<NaiveDateTime> {
    let fragments = i64::from(datetime.seconds_fragments());
    tds_epoch()?
        .checked_add_signed(Duration::days(i64::from(datetime.days())))?
        .checked_add_signed(Duration::seconds(fragments / 300))?
        .checked_add_signed(Duration::nanoseconds(fragments % 300 * 1_000_000_000 / 300))
}

// `smalldatetime`: days since 1900-01-01 plus minutes from midnight.
fn smalldatetime_to_naive(datetime: SmallDateTime) -> Option<NaiveDateTime> {
    tds_epoch()?
        .checked_add_signed(Duration::days(i64::from(datetime.days())))?
        .checked_add_signed(Duration::minutes(i64::from(datetime.seconds_fragments())))
}

fn datetime2_to_naive(datetime: DateTime2) -> Option<NaiveDateTime> {
    Some(NaiveDateTime::new(
        date_to_naive(datetime.date())?,
        time_to_naive(datetime.time())?,
    ))
}

// The stored instant is UTC; the offset only shifts presentation.
fn datetime_offset_to_fixed(dto: TdsDateTimeOffset) -> Option<DateTime<FixedOffset>> {
    let utc = datetime2_to_naive(dto.datetime2())?;
    let offset = FixedOffset::east_opt(i32::from(dto.offset()).checked_mul(60)?)?;
    Some(DateTime::from_naive_utc_and_offset(utc, offset))
}
