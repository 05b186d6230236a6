use serde::Serialize;

use crate::decode::RawRow;
use crate::value::Scalar;

/// Y-axis value for one candle, in source column order: open, close, high, low.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct OhlcTuple(pub [Scalar; 4]);

impl OhlcTuple {
    pub fn open(&self) -> &Scalar {
        &self.0[0]
    }

    pub fn close(&self) -> &Scalar {
        &self.0[1]
    }

    pub fn high(&self) -> &Scalar {
        &self.0[2]
    }

    pub fn low(&self) -> &Scalar {
        &self.0[3]
    }

    pub fn values(&self) -> &[Scalar; 4] {
        &self.0
    }
}

/// Parallel X/Y sequences; index `i` of both comes from the same source row.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AxisValues {
    pub x_axis: Vec<String>,
    pub y_axis: Vec<OhlcTuple>,
}

impl AxisValues {
    pub fn len(&self) -> usize {
        self.x_axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_axis.is_empty()
    }

    /// Iterate `(label, ohlc)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (&str, &OhlcTuple)> {
        self.x_axis.iter().map(String::as_str).zip(self.y_axis.iter())
    }
}

/// Fold decoded rows into axis data.
///
/// Column 0 becomes the X label, columns 1–4 the OHLC tuple; anything past
/// column 4 is ignored. No sorting, filtering or deduplication happens here.
pub fn build(rows: Vec<RawRow>) -> AxisValues {
    let mut x_axis = Vec::with_capacity(rows.len());
    let mut y_axis = Vec::with_capacity(rows.len());

    for row in rows {
        let mut values = row.into_values().into_iter();
        let label = values.next().unwrap_or_default();
        let mut next = || values.next().unwrap_or_default();
        let ohlc = OhlcTuple([next(), next(), next(), next()]);

        x_axis.push(label.to_string());
        y_axis.push(ohlc);
    }

    AxisValues { x_axis, y_axis }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Scalar {
        Scalar::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn row(values: Vec<Scalar>) -> RawRow {
        RawRow::new(values)
    }

    #[test]
    fn test_build_candle_scenario() {
        let rows = vec![
            row(vec![
                date(2022, 5, 18),
                Scalar::Float(156.35),
                Scalar::Float(158.45),
                Scalar::Float(156.75),
                Scalar::Float(157.25),
            ]),
            row(vec![
                date(2022, 5, 19),
                Scalar::Float(159.15),
                Scalar::Float(158.10),
                Scalar::Float(157.20),
                Scalar::Float(156.40),
            ]),
        ];

        let axis = build(rows);
        assert_eq!(axis.x_axis, vec!["2022-05-18", "2022-05-19"]);
        assert_eq!(
            axis.y_axis,
            vec![
                OhlcTuple([
                    Scalar::Float(156.35),
                    Scalar::Float(158.45),
                    Scalar::Float(156.75),
                    Scalar::Float(157.25),
                ]),
                OhlcTuple([
                    Scalar::Float(159.15),
                    Scalar::Float(158.10),
                    Scalar::Float(157.20),
                    Scalar::Float(156.40),
                ]),
            ]
        );
    }

    #[test]
    fn test_tuple_is_positional_and_keeps_types() {
        let axis = build(vec![row(vec![
            Scalar::Text("Q1".into()),
            Scalar::Int(10),
            Scalar::Float(11.5),
            Scalar::Text("12".into()),
            Scalar::Null,
            Scalar::Int(999),
        ])]);
        let ohlc = &axis.y_axis[0];
        assert_eq!(ohlc.open(), &Scalar::Int(10));
        assert_eq!(ohlc.close(), &Scalar::Float(11.5));
        assert_eq!(ohlc.high(), &Scalar::Text("12".into()));
        assert_eq!(ohlc.low(), &Scalar::Null);
    }

    #[test]
    fn test_lengths_match_input() {
        let rows: Vec<RawRow> = (0..25)
            .map(|i| row(vec![Scalar::Int(i), Scalar::Int(i), Scalar::Int(i), Scalar::Int(i), Scalar::Int(i)]))
            .collect();
        let axis = build(rows);
        assert_eq!(axis.x_axis.len(), 25);
        assert_eq!(axis.y_axis.len(), 25);
        for (i, (label, ohlc)) in axis.points().enumerate() {
            assert_eq!(label, i.to_string());
            assert_eq!(ohlc.open(), &Scalar::Int(i as i64));
        }
    }

    #[test]
    fn test_empty_rows_give_empty_axes() {
        let axis = build(Vec::new());
        assert!(axis.is_empty());
        assert!(axis.y_axis.is_empty());
    }

    #[test]
    fn test_serializes_as_kline_arrays() {
        let axis = build(vec![row(vec![
            date(2022, 5, 18),
            Scalar::Float(1.5),
            Scalar::Float(2.5),
            Scalar::Float(3.0),
            Scalar::Float(1.0),
        ])]);
        let json = serde_json::to_value(&axis).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "x_axis": ["2022-05-18"],
                "y_axis": [[1.5, 2.5, 3.0, 1.0]],
            })
        );
    }
}
