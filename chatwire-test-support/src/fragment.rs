//! Random envelope fragmentation.
//!
//! Splits payloads the way a server with an unknown frame budget would, and
//! optionally injects the noise a real stream carries: empty frames and a
//! stale, never-finished fragment in front of a message.

use rand::Rng;

/// Splits payloads into enveloped frames at random cut points.
///
/// # Example
///
/// ```
/// use chatwire::EnvelopeFramer;
/// use chatwire_test_support::Fragmenter;
///
/// let mut fragmenter = Fragmenter::new().with_max_fragments(5);
/// let frames = fragmenter.fragment("{\"hello\":\"world\"}");
///
/// let mut framer = EnvelopeFramer::default();
/// let out: Vec<String> = frames.iter().filter_map(|f| framer.process(f)).collect();
/// assert_eq!(out, vec!["{\"hello\":\"world\"}".to_string()]);
/// ```
pub struct Fragmenter {
    start: String,
    end: String,
    max_fragments: usize,
    empty_frame_probability: f64,
    stale_prefix_probability: f64,
    rng: rand::rngs::ThreadRng,
    noise_injected: usize,
}

impl Default for Fragmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Fragmenter {
    pub fn new() -> Self {
        Self {
            start: "CaSr".to_string(),
            end: "CaEd".to_string(),
            max_fragments: 4,
            empty_frame_probability: 0.0,
            stale_prefix_probability: 0.0,
            rng: rand::thread_rng(),
            noise_injected: 0,
        }
    }

    /// Fragmenter that also injects empty frames and stale partials
    pub fn noisy() -> Self {
        Self::new()
            .with_max_fragments(8)
            .with_empty_frame_probability(0.1)
            .with_stale_prefix_probability(0.2)
    }

    pub fn with_markers(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start = start.into();
        self.end = end.into();
        self
    }

    pub fn with_max_fragments(mut self, max: usize) -> Self {
        self.max_fragments = max.max(1);
        self
    }

    pub fn with_empty_frame_probability(mut self, prob: f64) -> Self {
        self.empty_frame_probability = prob.clamp(0.0, 1.0);
        self
    }

    pub fn with_stale_prefix_probability(mut self, prob: f64) -> Self {
        self.stale_prefix_probability = prob.clamp(0.0, 1.0);
        self
    }

    /// Frames for one payload. Reassembling them yields exactly `payload`.
    ///
    /// Injected empty frames are part of the stream and must be skipped by
    /// the receiver before framing, as the chat client does.
    pub fn fragment(&mut self, payload: &str) -> Vec<String> {
        let mut frames = Vec::new();

        if self.rng.gen::<f64>() < self.stale_prefix_probability {
            frames.push(format!("{}{{\"abandoned\":", self.start));
            self.noise_injected += 1;
        }

        let pieces = self.random_pieces(payload);
        let last = pieces.len() - 1;
        for (i, piece) in pieces.into_iter().enumerate() {
            let mut frame = String::new();
            if i == 0 {
                frame.push_str(&self.start);
            }
            frame.push_str(piece);
            if i == last {
                frame.push_str(&self.end);
            }
            frames.push(frame);

            if i != last && self.rng.gen::<f64>() < self.empty_frame_probability {
                frames.push(String::new());
                self.noise_injected += 1;
            }
        }
        frames
    }

    /// Number of noise frames injected so far
    pub fn noise_injected(&self) -> usize {
        self.noise_injected
    }

    fn random_pieces<'a>(&mut self, payload: &'a str) -> Vec<&'a str> {
        let boundaries: Vec<usize> = payload
            .char_indices()
            .map(|(i, _)| i)
            .filter(|&i| i > 0)
            .collect();

        let wanted = self.rng.gen_range(1..=self.max_fragments);
        let cut_count = (wanted - 1).min(boundaries.len());

        let mut cuts: Vec<usize> = rand::seq::index::sample(&mut self.rng, boundaries.len(), cut_count)
            .into_iter()
            .map(|i| boundaries[i])
            .collect();
        cuts.sort_unstable();

        let mut pieces = Vec::with_capacity(cuts.len() + 1);
        let mut from = 0;
        for cut in cuts {
            pieces.push(&payload[from..cut]);
            from = cut;
        }
        pieces.push(&payload[from..]);
        pieces
    }
}
