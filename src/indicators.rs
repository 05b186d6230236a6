//! Moving averages over the close value of an [`AxisValues`] series, for
//! overlaying on the candlestick chart.
//!
//! Both series have one entry per candle. Entries are `None` while the
//! average is still warming up, and for candles whose close is not numeric.
//! A non-numeric close does not update the average.

use std::collections::VecDeque;

use crate::axis::AxisValues;

/// Simple moving average over the last `window` observations.
#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
    buf: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            buf: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    /// Feed one price, return the current average.
    pub fn update(&mut self, price: f64) -> f64 {
        if self.buf.len() == self.window {
            if let Some(old) = self.buf.pop_front() {
                self.sum -= old;
            }
        }
        self.buf.push_back(price);
        self.sum += price;
        self.sum / self.buf.len() as f64
    }

    pub fn is_warm(&self) -> bool {
        self.buf.len() >= self.window
    }
}

/// Exponential moving average, α = 2/(window+1), seeded by the first price.
///
/// Warm once `window` prices have been seen.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    pub value: f64,
    window: usize,
    count: usize,
}

impl Ema {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            alpha: 2.0 / (window as f64 + 1.0),
            value: 0.0,
            window,
            count: 0,
        }
    }

    pub fn update(&mut self, price: f64) -> f64 {
        if self.count == 0 {
            self.value = price;
        } else {
            self.value = self.alpha * price + (1.0 - self.alpha) * self.value;
        }
        self.count += 1;
        self.value
    }

    pub fn is_warm(&self) -> bool {
        self.count >= self.window
    }
}

fn closes(axis: &AxisValues) -> impl Iterator<Item = Option<f64>> + '_ {
    axis.y_axis.iter().map(|ohlc| ohlc.close().as_f64())
}

pub fn sma_series(axis: &AxisValues, window: usize) -> Vec<Option<f64>> {
    let mut sma = Sma::new(window);
    closes(axis)
        .map(|close| {
            let close = close?;
            let v = sma.update(close);
            sma.is_warm().then_some(v)
        })
        .collect()
}

pub fn ema_series(axis: &AxisValues, window: usize) -> Vec<Option<f64>> {
    let mut ema = Ema::new(window);
    closes(axis)
        .map(|close| {
            let close = close?;
            let v = ema.update(close);
            ema.is_warm().then_some(v)
        })
        .collect()
}
