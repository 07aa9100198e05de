//! Observation classifier: maps raw tool activity to a type tag and an
//! importance score.
//!
//! Classification is an ordered rule table: the first rule whose
//! condition matches decides the type and base importance. Output
//! signals then nudge the importance up, clamped once at the end.
//! Every match is a case-insensitive substring test.

use serde::Serialize;

use crate::observation::{Importance, ObservationType};

/// Lowercased view of one tool invocation.
#[derive(Debug, Clone)]
pub struct Signals {
    tool: String,
    input: String,
    output: String,
}

impl Signals {
    pub fn new(tool_name: &str, input: &str, output: &str) -> Self {
        Self {
            tool: tool_name.to_lowercase(),
            input: input.to_lowercase(),
            output: output.to_lowercase(),
        }
    }

    fn tool_has(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.tool.contains(n))
    }

    fn input_has(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.input.contains(n))
    }

    fn output_has(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.output.contains(n))
    }

    fn is_shell(&self) -> bool {
        self.tool_has(&["exec", "bash"])
    }

    fn mentions_package_manager(&self) -> bool {
        self.input_has(PACKAGE_MANAGER_KEYWORDS)
            || self
                .input
                .split_whitespace()
                .collect::<Vec<_>>()
                .windows(2)
                .any(|pair| pair == ["npm", "i"])
    }
}

/// Dependency-changing invocations of common package managers.
///
/// Test and build subcommands (`cargo test`, `npm test`) are left out so
/// they reach the testing rule. `npm i` is matched by word instead.
pub const PACKAGE_MANAGER_KEYWORDS: &[&str] = &[
    "npm install",
    "npm ci",
    "npm uninstall",
    "npm update",
    "yarn add",
    "yarn install",
    "yarn remove",
    "pnpm add",
    "pnpm install",
    "bun add",
    "bun install",
    "pip install",
    "pip3 install",
    "pip uninstall",
    "poetry add",
    "uv add",
    "cargo add",
    "cargo install",
    "cargo update",
    "cargo remove",
    "bundle install",
    "gem install",
    "go get",
    "composer require",
    "brew install",
    "apt install",
    "apt-get install",
];

/// One entry of the rule table.
pub struct Rule {
    pub name: &'static str,
    pub obs_type: ObservationType,
    pub importance: f64,
    pub matches: fn(&Signals) -> bool,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("obs_type", &self.obs_type)
            .field("importance", &self.importance)
            .finish()
    }
}

/// The canonical rule table, in precedence order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "fix",
        obs_type: ObservationType::Bugfix,
        importance: 0.9,
        matches: |s| s.input_has(&["fix"]) || s.output_has(&["fixed", "resolved", "error"]),
    },
    Rule {
        name: "write",
        obs_type: ObservationType::CodeChange,
        importance: 0.7,
        matches: |s| s.tool_has(&["write", "edit"]),
    },
    Rule {
        name: "git",
        obs_type: ObservationType::GitOperation,
        importance: 0.6,
        matches: |s| s.is_shell() && s.input_has(&["git"]),
    },
    Rule {
        name: "dependency",
        obs_type: ObservationType::Dependency,
        importance: 0.5,
        matches: |s| s.is_shell() && s.mentions_package_manager(),
    },
    Rule {
        name: "test",
        obs_type: ObservationType::Testing,
        importance: 0.6,
        matches: |s| s.input_has(&["test"]) || s.output_has(&["passed", "failed"]),
    },
    Rule {
        name: "research",
        obs_type: ObservationType::Research,
        importance: 0.4,
        matches: |s| s.tool_has(&["search"]) || s.tool.starts_with("web"),
    },
    Rule {
        name: "read",
        obs_type: ObservationType::Exploration,
        importance: 0.3,
        matches: |s| s.tool_has(&["read"]),
    },
];

/// Fallback when no rule matches.
pub const DEFAULT_TYPE: ObservationType = ObservationType::ToolUse;
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

const FAILURE_SIGNALS: &[&str] = &["error", "failed"];
const FAILURE_BOOST: f64 = 0.1;
const SUCCESS_SIGNALS: &[&str] = &["success", "completed"];
const SUCCESS_BOOST: f64 = 0.05;

/// Result of classifying one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub obs_type: ObservationType,
    pub importance: Importance,
    /// Name of the rule that fired, `"default"` when none did.
    pub rule: &'static str,
}

/// Classify a tool invocation. Total and deterministic.
pub fn classify(tool_name: &str, input: &str, output: &str) -> Classification {
    let signals = Signals::new(tool_name, input, output);
    let (obs_type, base, rule) = RULES
        .iter()
        .find(|rule| (rule.matches)(&signals))
        .map(|rule| (rule.obs_type, rule.importance, rule.name))
        .unwrap_or((DEFAULT_TYPE, DEFAULT_IMPORTANCE, "default"));

    Classification {
        obs_type,
        importance: adjust_importance(base, &signals.output),
        rule,
    }
}

/// Apply output-driven boosts to a base importance.
///
/// Both boosts are summed before a single clamp into `[0, 1]`.
pub fn adjust_importance(base: f64, output: &str) -> Importance {
    let output = output.to_lowercase();
    let mut boost = 0.0;
    if FAILURE_SIGNALS.iter().any(|s| output.contains(s)) {
        boost += FAILURE_BOOST;
    }
    if SUCCESS_SIGNALS.iter().any(|s| output.contains(s)) {
        boost += SUCCESS_BOOST;
    }
    Importance::new(base + boost)
}
