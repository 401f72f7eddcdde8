//! Colour scales used by the chart and map feeds

use serde::Serialize;

/// An RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(0xff, 0x00, 0x00);
    pub const YELLOW: Rgb = Rgb(0xff, 0xff, 0x00);
    pub const GREEN: Rgb = Rgb(0x00, 0x80, 0x00);

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn lerp(a: Rgb, b: Rgb, t: f64) -> Rgb {
        let channel = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
        Rgb(channel(a.0, b.0), channel(a.1, b.1), channel(a.2, b.2))
    }
}

/// Red-yellow-blue diverging palette, 11 steps, low to high
pub const RD_YL_BU_11: [&str; 11] = [
    "#a50026", "#d73027", "#f46d43", "#fdae61", "#fee090", "#ffffbf", "#e0f3f8", "#abd9e9",
    "#74add1", "#4575b4", "#313695",
];

/// Continuous colour scale interpolating evenly spaced stops over [vmin, vmax].
/// Values outside the range are clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearColormap {
    stops: Vec<Rgb>,
    vmin: f64,
    vmax: f64,
}

impl LinearColormap {
    pub fn new(stops: Vec<Rgb>, vmin: f64, vmax: f64) -> Self {
        Self { stops, vmin, vmax }
    }

    /// Red to yellow to green, the scale used for yields and NDVI
    pub fn red_yellow_green(vmin: f64, vmax: f64) -> Self {
        Self::new(vec![Rgb::RED, Rgb::YELLOW, Rgb::GREEN], vmin, vmax)
    }

    pub fn rgb(&self, value: f64) -> Rgb {
        match self.stops.len() {
            0 => return Rgb(0, 0, 0),
            1 => return self.stops[0],
            _ => {}
        }
        let span = self.vmax - self.vmin;
        let t = if span > 0.0 && value.is_finite() {
            ((value - self.vmin) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let segments = (self.stops.len() - 1) as f64;
        let position = t * segments;
        let index = (position.floor() as usize).min(self.stops.len() - 2);
        Rgb::lerp(self.stops[index], self.stops[index + 1], position - index as f64)
    }

    pub fn color(&self, value: f64) -> String {
        self.rgb(value).hex()
    }
}

/// Discrete mapper picking a palette entry for a value in [low, high]
#[derive(Debug, Clone, PartialEq)]
pub struct LinearColorMapper {
    palette: &'static [&'static str],
    low: f64,
    high: f64,
}

impl LinearColorMapper {
    pub fn new(palette: &'static [&'static str], low: f64, high: f64) -> Self {
        Self { palette, low, high }
    }

    pub fn color(&self, value: f64) -> &'static str {
        let n = self.palette.len();
        if n == 0 {
            return "#000000";
        }
        let span = self.high - self.low;
        if span <= 0.0 || !value.is_finite() || value <= self.low {
            return self.palette[0];
        }
        if value >= self.high {
            return self.palette[n - 1];
        }
        let index = ((value - self.low) / span * n as f64).floor() as usize;
        self.palette[index.min(n - 1)]
    }
}
