//! ffmpeg `-filter_complex` graph construction
//!
//! A graph is a list of chains. Each chain reads labelled pads, applies a
//! comma-separated filter sequence and writes labelled pads:
//!
//! ```text
//! [0:v][1:v]concat=n=2:v=1:a=0,trim=duration=7.5[bg]
//! ```

use std::fmt;

/// One `[in]f1,f2[out]` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    inputs: Vec<String>,
    filters: Vec<String>,
    outputs: Vec<String>,
}

impl FilterChain {
    /// Start a chain reading the given pads (`"0:v"`, `"bg"`, ...).
    #[must_use]
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            filters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// Write the chain's result to `label`. Call more than once for filters
    /// with several outputs (`asplit`).
    #[must_use]
    pub fn to(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }

    #[must_use]
    pub fn filters(&self) -> &[String] {
        &self.filters
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{input}]")?;
        }
        f.write_str(&self.filters.join(","))?;
        for output in &self.outputs {
            write!(f, "[{output}]")?;
        }
        Ok(())
    }
}

/// A full `-filter_complex` description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chain(mut self, chain: FilterChain) -> Self {
        self.chains.push(chain);
        self
    }

    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Every filter in the graph, in order
    pub fn filters(&self) -> impl Iterator<Item = &str> {
        self.chains
            .iter()
            .flat_map(|c| c.filters().iter().map(String::as_str))
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{chain}")?;
        }
        Ok(())
    }
}

/// Escape a path for use as an unquoted filter option value (`ass=<path>`).
///
/// Two levels: first for the filter's own option parser, then for the
/// filtergraph parser that splits chains and pads.
#[must_use]
pub fn escape_filter_path(path: &std::path::Path) -> String {
    let mut option = String::new();
    for c in path.to_string_lossy().chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option.push('\\');
        }
        option.push(c);
    }

    let mut graph = String::with_capacity(option.len());
    for c in option.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph.push('\\');
        }
        graph.push(c);
    }
    graph
}

/// `atempo` stages whose product is `speed`.
///
/// A single `atempo` accepts 0.5..=2.0, so larger changes are chained.
#[must_use]
pub fn atempo_chain(speed: f64) -> Vec<String> {
    let mut remaining = speed;
    let mut stages = Vec::new();

    while remaining > 2.0 {
        stages.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        stages.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    if (remaining - 1.0).abs() > f64::EPSILON || stages.is_empty() {
        stages.push(format!("atempo={remaining}"));
    }

    stages
}
