//! Virtual Instrument Simulator
//!
//! A stateful temperature controller that answers a fixed textual command set.
//! The simulator does no I/O of its own; the simulated channel feeds it one
//! command at a time and hands the response back to the session.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Query the current reading
pub const CMD_TEMP_QUERY: &str = "TEMP?";
/// Query the instrument identity
pub const CMD_ID_QUERY: &str = "ID?";
/// Prefix of the set-reading command
pub const CMD_TEMP_SET: &str = "TEMP";
/// Acknowledgement sent for an accepted set command
pub const RESPONSE_OK: &str = "OK";
/// Tag that starts every error payload
pub const ERROR_TAG: &str = "ERROR";

/// Default identity string reported by `ID?`
pub const DEFAULT_IDENTITY: &str = "Simulated Temperature Controller v1.0";

/// A command token with an optional argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command token (`TEMP?`, `ID?`, `TEMP`, ...)
    pub token: String,
    /// Argument following the `:` separator
    pub argument: Option<String>,
}

impl Command {
    /// Create a command without argument
    pub fn query(token: &str) -> Self {
        Self {
            token: token.to_string(),
            argument: None,
        }
    }

    /// Create a command carrying an argument
    pub fn with_argument(token: &str, argument: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            argument: Some(argument.into()),
        }
    }

    /// Split raw wire text into token and argument.
    ///
    /// Only the first `:` separates the argument, so `TEMP:1:2` yields the
    /// argument `1:2` (which then fails to parse as a number).
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((token, argument)) => Self::with_argument(token, argument),
            None => Self::query(text),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(arg) => write!(f, "{}:{}", self.token, arg),
            None => write!(f, "{}", self.token),
        }
    }
}

/// Instrument response: a value payload or a tagged error, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Well-formed value payload
    Value(String),
    /// Error payload with reason
    Error(String),
}

impl Response {
    /// Build an error response
    pub fn error(reason: &str) -> Self {
        Self::Error(reason.to_string())
    }

    /// Classify raw response text
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.strip_prefix(ERROR_TAG) {
            Some(rest) => Self::Error(rest.trim_start_matches(':').trim().to_string()),
            None => Self::Value(text.to_string()),
        }
    }

}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::Error(reason) => write!(f, "{}: {}", ERROR_TAG, reason),
        }
    }
}

/// Latency simulation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LatencyConfig {
    /// Enable latency simulation
    pub enabled: bool,
    /// Base latency in ms
    pub base_ms: u64,
    /// Random jitter range in ms
    pub jitter_ms: u64,
}

impl LatencyConfig {
    /// Calculate latency for one response
    pub fn sample(&self) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.base_ms.saturating_add(jitter))
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Reading at construction time
    pub initial_reading: f64,
    /// Maximum absolute perturbation applied per `TEMP?`
    pub drift: f64,
    /// Identity string answered to `ID?`
    pub identity: String,
    /// Response latency
    pub latency: LatencyConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_reading: 20.0,
            drift: 0.5,
            identity: DEFAULT_IDENTITY.to_string(),
            latency: LatencyConfig::default(),
        }
    }
}

/// Internal instrument state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentState {
    /// Current reading
    pub reading: f64,
}

/// Simulated temperature controller
pub struct InstrumentSimulator {
    state: InstrumentState,
    drift: f64,
    identity: String,
    rng: Box<dyn RngCore + Send>,
}

impl fmt::Debug for InstrumentSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentSimulator")
            .field("state", &self.state)
            .field("drift", &self.drift)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Default for InstrumentSimulator {
    fn default() -> Self {
        Self::new(&SimulatorConfig::default())
    }
}

impl InstrumentSimulator {
    /// Create a simulator seeded from entropy
    pub fn new(config: &SimulatorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a simulator driven by the given RNG
    pub fn with_rng(config: &SimulatorConfig, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            state: InstrumentState {
                reading: config.initial_reading,
            },
            drift: config.drift.abs(),
            identity: config.identity.clone(),
            rng: Box::new(rng),
        }
    }

    /// Current state
    pub fn state(&self) -> InstrumentState {
        self.state
    }

    /// Identity string
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Handle one command and produce the response
    pub fn handle(&mut self, command: &Command) -> Response {
        let delta = if self.drift > 0.0 {
            self.rng.gen_range(-self.drift..=self.drift)
        } else {
            0.0
        };
        let (state, response) = respond(self.state, command, &self.identity, delta);
        self.state = state;
        response
    }

    /// Handle raw command text
    pub fn handle_text(&mut self, text: &str) -> String {
        self.handle(&Command::parse(text)).to_string()
    }
}

/// Transition function of the instrument.
///
/// `delta` is the perturbation applied if the command is a reading query.
pub fn respond(
    state: InstrumentState,
    command: &Command,
    identity: &str,
    delta: f64,
) -> (InstrumentState, Response) {
    match (command.token.as_str(), command.argument.as_deref()) {
        (CMD_TEMP_QUERY, None) => {
            let reading = state.reading + delta;
            (
                InstrumentState { reading },
                Response::Value(format!("{:.1}", reading)),
            )
        }
        (CMD_ID_QUERY, None) => (state, Response::Value(identity.to_string())),
        (CMD_TEMP_SET, Some(arg)) => match arg.parse::<f64>() {
            Ok(reading) if reading.is_finite() => (
                InstrumentState { reading },
                Response::Value(RESPONSE_OK.to_string()),
            ),
            _ => (state, Response::error("Invalid temperature value")),
        },
        _ => (state, Response::error("Unknown command")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> InstrumentSimulator {
        let config = SimulatorConfig {
            drift: 0.0,
            ..Default::default()
        };
        InstrumentSimulator::with_rng(&config, StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_set_then_query() {
        let mut sim = InstrumentSimulator::with_rng(&SimulatorConfig::default(), StdRng::seed_from_u64(1));
        assert_eq!(sim.handle_text("TEMP:22.0"), "OK");
        let value: f64 = sim.handle_text("TEMP?").parse().unwrap();
        assert!((21.0..=23.0).contains(&value), "value {value}");
    }

    #[test]
    fn test_query_formats_one_decimal() {
        let mut sim = quiet();
        sim.handle_text("TEMP:21.26");
        assert_eq!(sim.handle_text("TEMP?"), "21.3");
    }

    #[test]
    fn test_invalid_value_keeps_reading() {
        let mut sim = quiet();
        let before = sim.state();
        assert_eq!(sim.handle_text("TEMP:notanumber"), "ERROR: Invalid temperature value");
        assert_eq!(sim.state(), before);
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let mut sim = quiet();
        for cmd in ["TEMP:NaN", "TEMP:inf", "TEMP:-infinity"] {
            assert_eq!(sim.handle_text(cmd), "ERROR: Invalid temperature value", "command {cmd:?}");
        }
        assert_eq!(sim.state().reading, 20.0);
    }

    #[test]
    fn test_unknown_commands() {
        let mut sim = quiet();
        for cmd in ["temp?", "TEMP", "ID", "ID?:x", "TEMP?:1", "", "RESET"] {
            assert_eq!(sim.handle_text(cmd), "ERROR: Unknown command", "command {cmd:?}");
        }
    }

    #[test]
    fn test_identity() {
        let mut sim = quiet();
        assert_eq!(sim.handle_text("ID?"), DEFAULT_IDENTITY);
    }

    #[test]
    fn test_drift_bounded() {
        let mut sim = InstrumentSimulator::with_rng(&SimulatorConfig::default(), StdRng::seed_from_u64(42));
        let mut last = sim.state().reading;
        for _ in 0..100 {
            sim.handle_text("TEMP?");
            let now = sim.state().reading;
            assert!((now - last).abs() <= 0.5 + f64::EPSILON);
            last = now;
        }
    }

    #[test]
    fn test_command_parse_and_display() {
        let cmd = Command::parse("TEMP:22.5");
        assert_eq!(cmd.token, "TEMP");
        assert_eq!(cmd.argument.as_deref(), Some("22.5"));
        assert_eq!(cmd.to_string(), "TEMP:22.5");
        assert_eq!(Command::parse("ID?"), Command::query("ID?"));
    }

    #[test]
    fn test_response_parse() {
        assert_eq!(Response::parse("OK\r\n"), Response::Value("OK".into()));
        assert_eq!(
            Response::parse("ERROR: Unknown command"),
            Response::error("Unknown command")
        );
        assert_eq!(Response::parse("ERROR"), Response::error(""));
    }

    #[test]
    fn test_latency_disabled_is_zero() {
        assert_eq!(LatencyConfig::default().sample(), Duration::ZERO);
        let fixed = LatencyConfig { enabled: true, base_ms: 5, jitter_ms: 0 };
        assert_eq!(fixed.sample(), Duration::from_millis(5));
    }
}
