//! Technical indicators computed locally over fetched daily bars.
//!
//! Both use Wilder smoothing: seed with the simple mean of the first `period`
//! inputs, then `avg = (avg * (period - 1) + x) / period`.

use crate::history::Bar;

pub const DEFAULT_PERIOD: usize = 14;

#[derive(Debug, Clone)]
struct WilderAverage {
    period: usize,
    value: f64,
    count: usize,
}

impl WilderAverage {
    fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            value: 0.0,
            count: 0,
        }
    }

    fn update(&mut self, x: f64) -> f64 {
        self.count += 1;
        let n = self.period as f64;
        if self.count <= self.period {
            self.value += (x - self.value) / self.count as f64;
        } else {
            self.value = (self.value * (n - 1.0) + x) / n;
        }
        self.value
    }

    fn is_ready(&self) -> bool {
        self.count >= self.period
    }
}

/// Relative Strength Index over closing prices.
#[derive(Debug, Clone)]
pub struct Rsi {
    gain: WilderAverage,
    loss: WilderAverage,
    prev_close: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            gain: WilderAverage::new(period),
            loss: WilderAverage::new(period),
            prev_close: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if let Some(prev) = self.prev_close {
            let change = close - prev;
            self.gain.update(change.max(0.0));
            self.loss.update((-change).max(0.0));
        }
        self.prev_close = Some(close);
        self.get()
    }

    pub fn get(&self) -> Option<f64> {
        if !self.gain.is_ready() {
            return None;
        }
        let (g, l) = (self.gain.value, self.loss.value);
        Some(if l == 0.0 {
            if g == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + g / l)
        })
    }
}

/// Average True Range over OHLC bars.
#[derive(Debug, Clone)]
pub struct Atr {
    tr: WilderAverage,
    prev_close: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            tr: WilderAverage::new(period),
            prev_close: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let range = bar.high - bar.low;
        let tr = match self.prev_close {
            Some(pc) => range.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
            None => range,
        };
        self.tr.update(tr);
        self.prev_close = Some(bar.close);
        self.get()
    }

    pub fn get(&self) -> Option<f64> {
        self.tr.is_ready().then_some(self.tr.value)
    }
}

/// Latest RSI of the series, or `None` with fewer than `period + 1` bars.
pub fn latest_rsi(bars: &[Bar], period: usize) -> Option<f64> {
    let mut rsi = Rsi::new(period);
    bars.iter().fold(None, |_, b| rsi.update(b.close))
}

/// Latest ATR of the series, or `None` with fewer than `period` bars.
pub fn latest_atr(bars: &[Bar], period: usize) -> Option<f64> {
    let mut atr = Atr::new(period);
    bars.iter().fold(None, |_, b| atr.update(b))
}
