use serde::Deserialize;
use serde_json::Value;

// ------------------------------------------------------------
// Presets
// ------------------------------------------------------------
//
// Two independently valid parameter profiles. Neither one is
// "the" default for every deployment; callers pick the preset
// and then override individual keys.
//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// 3600s / 40 items / 5 chars / no skipping
    #[default]
    Standard,

    /// 60s / 1000 items / 5 chars / no skipping
    HighVolume,
}

impl Preset {
    pub fn parameters(self) -> RunParameters {
        match self {
            Preset::Standard => RunParameters {
                max_oldness_seconds: 3600,
                max_items_to_collect: 40,
                min_post_length: 5,
                skip_probability: 0.0,
            },
            Preset::HighVolume => RunParameters {
                max_oldness_seconds: 60,
                max_items_to_collect: 1000,
                min_post_length: 5,
                skip_probability: 0.0,
            },
        }
    }
}

// ------------------------------------------------------------
// Run parameters
// ------------------------------------------------------------
//
// Immutable parameters of one collection session.
//
// Notes:
// - `max_oldness_seconds` is carried and logged but not
//   enforced on emission.
// - `min_post_length` is an inclusive threshold measured in
//   characters.
// - `skip_probability` is only honoured by the sequential policy.
//
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunParameters {
    pub max_oldness_seconds: u64,
    pub max_items_to_collect: usize,
    pub min_post_length: usize,
    pub skip_probability: f64,
}

impl Default for RunParameters {
    fn default() -> Self {
        Preset::default().parameters()
    }
}

impl RunParameters {
    /// Merges a caller-supplied option mapping over a preset.
    ///
    /// LENIENT CONTRACT:
    /// - `None` or a non-object value resolves to the preset as-is
    /// - Every recognised key is resolved independently
    /// - A key with a wrong type or out-of-range value keeps the
    ///   preset value for that key
    /// - Unknown keys are ignored
    ///
    /// This function never fails.
    pub fn resolve(options: Option<&Value>, preset: Preset) -> Self {
        let mut params = preset.parameters();

        let Some(map) = options.and_then(Value::as_object) else {
            return params;
        };

        if let Some(v) = map.get("max_oldness_seconds").and_then(non_negative_int) {
            params.max_oldness_seconds = v;
        }
        if let Some(v) = map.get("maximum_items_to_collect").and_then(non_negative_int) {
            params.max_items_to_collect = v as usize;
        }
        if let Some(v) = map.get("min_post_length").and_then(non_negative_int) {
            params.min_post_length = v as usize;
        }
        if let Some(v) = map.get("skip_probability").and_then(probability) {
            params.skip_probability = v;
        }

        params
    }
}

/// Accepts unsigned integers and integral, non-negative floats.
fn non_negative_int(value: &Value) -> Option<u64> {
    if let Some(v) = value.as_u64() {
        return Some(v);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

fn probability(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .filter(|p| p.is_finite() && (0.0..=1.0).contains(p))
}

// ------------------------------------------------------------
// Binary configuration
// ------------------------------------------------------------
//
// Loaded from `config.json` by the binary. Every field is
// optional; a missing file means an all-default configuration.
//
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CollectorConfig {
    /// Parameter profile the overrides are applied to
    #[serde(default)]
    pub preset: Preset,

    /// Orchestration policy
    #[serde(default)]
    pub policy: PolicyKind,

    /// Lenient per-key overrides (see `RunParameters::resolve`)
    #[serde(default)]
    pub parameters: Option<Value>,

    /// Optional Jetstream host override
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Replay recorded NDJSON frames instead of connecting
    #[serde(default)]
    pub replay_file: Option<String>,

    /// Optional debug configuration
    #[serde(default)]
    pub debug: Option<DebugConfig>,
}

impl CollectorConfig {
    pub fn run_parameters(&self) -> RunParameters {
        RunParameters::resolve(self.parameters.as_ref(), self.preset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// One endpoint at a time, up to three attempts
    #[default]
    Sequential,

    /// One connector per endpoint, merged in completion order
    FanOut,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// Enables debug-level logging when RUST_LOG is unset
    pub log: Option<bool>,
}
