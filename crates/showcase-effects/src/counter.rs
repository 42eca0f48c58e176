use std::time::{Duration, Instant};

use serde::Deserialize;

/// Counter settings as stored in a config section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub target: f64,
    pub duration_ms: u64,
    pub decimals: usize,
    /// Visible fraction of the element (0..=1) that starts the count.
    pub threshold: f64,
    pub prefix: String,
    pub suffix: String,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            target: 0.0,
            duration_ms: 2000,
            decimals: 0,
            threshold: 0.5,
            prefix: String::new(),
            suffix: String::new(),
        }
    }
}

/// Counts from zero to the target once the element scrolls into view.
#[derive(Debug, Clone)]
pub struct Counter {
    config: CounterConfig,
    started_at: Option<Instant>,
}

impl Counter {
    pub fn new(config: CounterConfig) -> Self {
        Self {
            config,
            started_at: None,
        }
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// Feed an intersection measurement. The first one at or above the
    /// threshold starts the animation; it never restarts. Returns true when
    /// this call started it.
    pub fn observe(&mut self, visible_ratio: f64, now: Instant) -> bool {
        if self.started_at.is_some() || !(visible_ratio >= self.config.threshold) {
            return false;
        }
        self.started_at = Some(now);
        true
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    /// Linear progress through the duration, 0..=1.
    fn progress(&self, now: Instant) -> f64 {
        let Some(started) = self.started_at else {
            return 0.0;
        };
        let duration = Duration::from_millis(self.config.duration_ms);
        if duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(started);
        (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
    }

    pub fn value(&self, now: Instant) -> f64 {
        let progress = self.progress(now);
        if progress >= 1.0 {
            return self.config.target;
        }
        self.config.target * ease_out_cubic(progress)
    }

    /// Text to render at `now`, prefix and suffix included.
    pub fn display(&self, now: Instant) -> String {
        format!(
            "{}{}{}",
            self.config.prefix,
            format_number(self.value(now), self.config.decimals),
            self.config.suffix
        )
    }
}

pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Most fraction digits `format_number` will render.
pub const MAX_DECIMALS: usize = 10;

/// Fixed decimals with comma thousands separators: `1234567.8` with two
/// decimals gives `"1,234,567.80"`. `decimals` is capped at [`MAX_DECIMALS`].
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let decimals = decimals.min(MAX_DECIMALS);
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac_part) = frac_part {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(target: f64) -> Counter {
        Counter::new(CounterConfig {
            target,
            duration_ms: 1000,
            ..Default::default()
        })
    }

    #[test]
    fn waits_for_threshold() {
        let mut c = counter(500.0);
        let t0 = Instant::now();
        assert!(!c.observe(0.2, t0));
        assert!(!c.is_started());
        assert_eq!(c.value(t0 + Duration::from_secs(5)), 0.0);

        assert!(c.observe(0.5, t0));
        assert!(c.is_started());
        // Already running: later observations are ignored.
        assert!(!c.observe(1.0, t0 + Duration::from_millis(100)));
    }

    #[test]
    fn reaches_exact_target_at_duration() {
        let mut c = counter(1234.0);
        let t0 = Instant::now();
        c.observe(1.0, t0);

        let halfway = c.value(t0 + Duration::from_millis(500));
        assert!(halfway > 1234.0 / 2.0, "ease-out runs ahead of linear");
        assert!(halfway < 1234.0);

        assert_eq!(c.value(t0 + Duration::from_millis(1000)), 1234.0);
        assert_eq!(c.value(t0 + Duration::from_secs(10)), 1234.0);
        assert!(c.is_finished(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn zero_duration_jumps_to_target() {
        let mut c = Counter::new(CounterConfig {
            target: 42.0,
            duration_ms: 0,
            ..Default::default()
        });
        let t0 = Instant::now();
        c.observe(1.0, t0);
        assert_eq!(c.value(t0), 42.0);
    }

    #[test]
    fn display_uses_prefix_suffix_and_decimals() {
        let mut c = Counter::new(CounterConfig {
            target: 9876.5,
            duration_ms: 10,
            decimals: 1,
            prefix: "$".into(),
            suffix: "+".into(),
            ..Default::default()
        });
        let t0 = Instant::now();
        c.observe(0.9, t0);
        assert_eq!(c.display(t0 + Duration::from_millis(10)), "$9,876.5+");
    }

    #[test]
    fn easing_curve_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert_eq!(ease_out_cubic(2.0), 1.0);
        assert!((ease_out_cubic(0.5) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(1000.0, 0), "1,000");
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-2500.0, 0), "-2,500");
        assert_eq!(format_number(-0.001, 1), "0.0");
        assert_eq!(format_number(f64::NAN, 2), "0");
    }

    #[test]
    fn huge_decimals_are_capped() {
        let config: CounterConfig =
            serde_json::from_str(r#"{ "target": 1.5, "duration_ms": 0, "decimals": 1000000000 }"#).unwrap();
        let mut c = Counter::new(config);
        let t0 = Instant::now();
        c.observe(1.0, t0);
        assert_eq!(c.display(t0), "1.5000000000");
        assert_eq!(format_number(2.0, usize::MAX), "2.0000000000");
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let config: CounterConfig =
            serde_json::from_str(r#"{ "target": 250, "suffix": "%" }"#).unwrap();
        assert_eq!(config.target, 250.0);
        assert_eq!(config.suffix, "%");
        assert_eq!(config.duration_ms, 2000);
        assert_eq!(config.threshold, 0.5);
    }
}
