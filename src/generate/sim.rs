//! `SimGenerator` - Deterministic Simulation Backend
//!
//! `TigerStyle`: Primary implementation. Every test runs against this; the
//! production backend is secondary.
//!
//! Output derives from a seeded SplitMix64 over a hash of the prompt, so
//! the same seed and prompt always produce the same fragment. Faults are
//! injected explicitly rather than probabilistically: a generator can be
//! made to fail always, or only for prompts containing a marker, which
//! lets a test fail one section of a cycle deterministically.

use async_trait::async_trait;

use super::{GenerationError, GenerationRequest, Generator};

/// When the simulated backend fails.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FailureMode {
    /// Never fail.
    None,
    /// Fail every call.
    Always,
    /// Fail calls whose prompt contains this marker.
    WhenPromptContains(String),
}

/// Deterministic, dependency-free generation backend.
#[derive(Debug, Clone)]
pub struct SimGenerator {
    seed: u64,
    failure: FailureMode,
}

impl SimGenerator {
    /// Create a generator with the given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            failure: FailureMode::None,
        }
    }

    /// A generator that fails every call with `ServiceUnavailable`.
    #[must_use]
    pub fn failing(seed: u64) -> Self {
        Self {
            seed,
            failure: FailureMode::Always,
        }
    }

    /// Fail only calls whose prompt contains `marker`.
    #[must_use]
    pub fn fail_when_prompt_contains(mut self, marker: impl Into<String>) -> Self {
        self.failure = FailureMode::WhenPromptContains(marker.into());
        self
    }

    /// The seed in use (for logging).
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[async_trait]
impl Generator for SimGenerator {
    #[tracing::instrument(skip(self, request), fields(prompt_len = request.prompt.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        match &self.failure {
            FailureMode::Always => {
                return Err(GenerationError::service_unavailable("simulated outage"));
            }
            FailureMode::WhenPromptContains(marker) if request.prompt.contains(marker) => {
                return Err(GenerationError::service_unavailable(format!(
                    "simulated outage for prompts containing {marker:?}"
                )));
            }
            _ => {}
        }

        let mut state = self.seed ^ fnv1a(&request.prompt);
        let theme = THEMES[(splitmix64(&mut state) as usize) % THEMES.len()];
        let angle = ANGLES[(splitmix64(&mut state) as usize) % ANGLES.len()];
        let close = CLOSERS[(splitmix64(&mut state) as usize) % CLOSERS.len()];

        Ok(format!(
            "<p>{theme} {angle}</p>\n<p>{close}</p>"
        ))
    }

    fn name(&self) -> &'static str {
        "sim"
    }

    fn is_simulation(&self) -> bool {
        true
    }
}

const THEMES: &[&str] = &[
    "The elegance of a single equation can carry an entire worldview.",
    "Technology compounds quietly until one morning it is the landscape.",
    "A business is a hypothesis about the future, tested in public.",
    "Mathematics is the patient art of saying exactly what you mean.",
];

const ANGLES: &[&str] = &[
    "This season we are turning that idea toward our own work.",
    "It shapes how we choose what to build next.",
    "We keep returning to it when the roadmap gets noisy.",
    "It is the lens for everything on this page.",
];

const CLOSERS: &[&str] = &[
    "More soon; the thinking continues between these updates.",
    "As always, write to us if a thread here is worth pulling.",
    "The next revision of this page will carry the idea further.",
    "Consider this a waypoint, not a conclusion.",
];

/// FNV-1a 64-bit over the prompt text.
fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// SplitMix64 step.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_seed_same_prompt_same_output() {
        let a = SimGenerator::with_seed(42);
        let b = SimGenerator::with_seed(42);
        let request = GenerationRequest::new("Refresh the hero section.");

        assert_eq!(
            a.generate(&request).await.unwrap(),
            b.generate(&request).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_output_varies_with_prompt() {
        let generator = SimGenerator::with_seed(42);
        let one = generator
            .generate(&GenerationRequest::new("prompt one"))
            .await
            .unwrap();
        let two = generator
            .generate(&GenerationRequest::new("prompt two"))
            .await
            .unwrap();
        assert_ne!(one, two);
    }

    #[tokio::test]
    async fn test_output_is_markup_fragment() {
        let generator = SimGenerator::with_seed(7);
        let out = generator
            .generate(&GenerationRequest::new("anything"))
            .await
            .unwrap();
        assert!(out.starts_with("<p>"));
        assert!(out.ends_with("</p>"));
    }

    #[tokio::test]
    async fn test_failing_generator_always_fails() {
        let generator = SimGenerator::failing(42);
        let result = generator.generate(&GenerationRequest::new("x")).await;
        assert!(matches!(
            result,
            Err(GenerationError::ServiceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_marker_failure_is_selective() {
        let generator =
            SimGenerator::with_seed(42).fail_when_prompt_contains("section 'doomed'");

        let ok = generator
            .generate(&GenerationRequest::new("section 'fine' please"))
            .await;
        assert!(ok.is_ok());

        let err = generator
            .generate(&GenerationRequest::new("section 'doomed' please"))
            .await;
        assert!(matches!(
            err,
            Err(GenerationError::ServiceUnavailable { .. })
        ));
    }

    #[test]
    fn test_name_and_simulation_flag() {
        let generator = SimGenerator::with_seed(1);
        assert_eq!(generator.name(), "sim");
        assert!(generator.is_simulation());
        assert_eq!(generator.seed(), 1);
    }
}
