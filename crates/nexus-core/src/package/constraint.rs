//! Version constraints for platform dependencies.
//!
//! A constraint is a tree of single comparators combined with AND/OR.
//! Versions are parsed leniently (`v7.4` is read as `7.4.0`) and compared
//! with `semver` ordering.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{NexusError, Result};

static OPERATOR_SPACING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(>=|<=|!=|==|=|<|>|~|\^)\s+").expect("Invalid operator spacing regex")
});

/// Comparison operator of a single constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `~1.2` allows `>=1.2.0 <1.3.0`, `~1` allows `>=1.0.0 <2.0.0`
    Tilde,
    /// `^1.2` allows `>=1.2.0 <2.0.0`, `^0.3` allows `>=0.3.0 <0.4.0`
    Caret,
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Tilde => "~",
            Operator::Caret => "^",
        }
    }
}

/// A version parsed leniently, remembering how many numeric parts were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LenientVersion {
    pub version: semver::Version,
    pub parts: usize,
}

impl LenientVersion {
    /// Parse `1`, `1.2`, `v1.2.3`, `1.2.3-beta+7` and similar.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let input = input
            .strip_prefix('v')
            .or_else(|| input.strip_prefix('V'))
            .unwrap_or(input);

        let (core, rest) = match input.find(['-', '+']) {
            Some(pos) => input.split_at(pos),
            None => (input, ""),
        };

        let numbers: Vec<&str> = core.split('.').collect();
        if numbers.is_empty()
            || numbers.len() > 3
            || numbers
                .iter()
                .any(|n| n.is_empty() || !n.chars().all(|c| c.is_ascii_digit()))
        {
            return None;
        }

        let parts = numbers.len();
        let mut padded = numbers.clone();
        padded.resize(3, "0");

        let normalized = format!("{}{}", padded.join("."), rest);
        semver::Version::parse(&normalized)
            .ok()
            .map(|version| Self { version, parts })
    }
}

/// A single `<operator><version>` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleConstraint {
    operator: Operator,
    version: LenientVersion,
}

impl SingleConstraint {
    pub fn new(operator: Operator, version: LenientVersion) -> Self {
        Self { operator, version }
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn matches(&self, candidate: &semver::Version) -> bool {
        let bound = &self.version.version;
        let ord = cmp_precedence(candidate, bound);

        match self.operator {
            Operator::Eq => ord == Ordering::Equal,
            Operator::Ne => ord != Ordering::Equal,
            Operator::Lt => ord == Ordering::Less,
            Operator::Le => ord != Ordering::Greater,
            Operator::Gt => ord == Ordering::Greater,
            Operator::Ge => ord != Ordering::Less,
            Operator::Tilde | Operator::Caret => {
                ord != Ordering::Less
                    && self
                        .upper_bound()
                        .is_none_or(|bound| cmp_precedence(candidate, &bound) == Ordering::Less)
            }
        }
    }

    /// Exclusive upper bound of a tilde or caret range. `None` when the
    /// bumped component would overflow, leaving the range open-ended.
    fn upper_bound(&self) -> Option<semver::Version> {
        let v = &self.version.version;
        match self.operator {
            Operator::Tilde if self.version.parts >= 2 => v
                .minor
                .checked_add(1)
                .map(|minor| semver::Version::new(v.major, minor, 0)),
            Operator::Caret if v.major == 0 && self.version.parts >= 2 => v
                .minor
                .checked_add(1)
                .map(|minor| semver::Version::new(0, minor, 0)),
            _ => v
                .major
                .checked_add(1)
                .map(|major| semver::Version::new(major, 0, 0)),
        }
    }
}

/// Compare ignoring build metadata, which carries no precedence.
fn cmp_precedence(a: &semver::Version, b: &semver::Version) -> Ordering {
    a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

impl fmt::Display for SingleConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.as_str(), self.version.version)
    }
}

/// How the children of a [`ConstraintCombination`] are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationType {
    And,
    Or,
}

/// AND/OR combination of constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintCombination {
    combination_type: CombinationType,
    constraints: Vec<Constraint>,
}

impl ConstraintCombination {
    pub fn new(combination_type: CombinationType) -> Self {
        Self {
            combination_type,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraints(
        combination_type: CombinationType,
        constraints: impl IntoIterator<Item = Constraint>,
    ) -> Self {
        Self {
            combination_type,
            constraints: constraints.into_iter().collect(),
        }
    }

    pub fn add(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn combination_type(&self) -> CombinationType {
        self.combination_type
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// An empty combination never matches, for either combination type.
    pub fn matches(&self, version: &str) -> bool {
        match self.combination_type {
            CombinationType::And => {
                !self.constraints.is_empty() && self.constraints.iter().all(|c| c.matches(version))
            }
            CombinationType::Or => self.constraints.iter().any(|c| c.matches(version)),
        }
    }
}

/// A version constraint tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Matches every parseable version.
    Any,
    Single(SingleConstraint),
    Combination(ConstraintCombination),
}

impl Constraint {
    /// Match a version string. Unparseable versions never match.
    pub fn matches(&self, version: &str) -> bool {
        match self {
            Constraint::Any => LenientVersion::parse(version).is_some(),
            Constraint::Single(single) => LenientVersion::parse(version)
                .is_some_and(|candidate| single.matches(&candidate.version)),
            Constraint::Combination(combination) => combination.matches(version),
        }
    }
}

/// Builds constraint trees from composer style constraint strings.
///
/// `||` separates alternatives, whitespace or `,` separates terms that must
/// all hold, and `*` or an empty string matches anything.
#[derive(Debug, Default)]
pub struct ConstraintBuilder;

impl ConstraintBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn create_constraint(&self, input: &str) -> Result<Constraint> {
        let normalized = OPERATOR_SPACING_REGEX.replace_all(input.trim(), "$1");

        let alternatives: Vec<&str> = normalized.split("||").map(str::trim).collect();
        if alternatives.len() > 1 {
            let children = alternatives
                .into_iter()
                .map(|alt| self.create_conjunction(alt, input))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Constraint::Combination(ConstraintCombination::with_constraints(
                CombinationType::Or,
                children,
            )));
        }

        self.create_conjunction(&normalized, input)
    }

    fn create_conjunction(&self, input: &str, original: &str) -> Result<Constraint> {
        let terms: Vec<&str> = input
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();

        match terms.as_slice() {
            [] if !original.contains("||") => Ok(Constraint::Any),
            [] => Err(NexusError::unexpected_value(format!(
                "Empty alternative in version constraint: \"{}\"",
                original
            ))),
            [single] => self.create_term(single, original),
            many => {
                let children = many
                    .iter()
                    .map(|term| self.create_term(term, original))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Constraint::Combination(ConstraintCombination::with_constraints(
                    CombinationType::And,
                    children,
                )))
            }
        }
    }

    fn create_term(&self, term: &str, original: &str) -> Result<Constraint> {
        if term == "*" {
            return Ok(Constraint::Any);
        }

        let invalid = || {
            NexusError::unexpected_value(format!(
                "Invalid version constraint \"{}\" in \"{}\"",
                term, original
            ))
        };

        // `1.2.*` is equivalent to `~1.2`
        if let Some(prefix) = term.strip_suffix(".*") {
            let version = LenientVersion::parse(prefix).ok_or_else(invalid)?;
            return Ok(Constraint::Single(SingleConstraint::new(
                Operator::Tilde,
                version,
            )));
        }

        let (operator, rest) = split_operator(term);
        let version = LenientVersion::parse(rest).ok_or_else(invalid)?;
        Ok(Constraint::Single(SingleConstraint::new(operator, version)))
    }
}

fn split_operator(term: &str) -> (Operator, &str) {
    const OPERATORS: &[(&str, Operator)] = &[
        (">=", Operator::Ge),
        ("<=", Operator::Le),
        ("!=", Operator::Ne),
        ("==", Operator::Eq),
        ("=", Operator::Eq),
        (">", Operator::Gt),
        ("<", Operator::Lt),
        ("~", Operator::Tilde),
        ("^", Operator::Caret),
    ];

    OPERATORS
        .iter()
        .find_map(|(prefix, op)| term.strip_prefix(prefix).map(|rest| (*op, rest)))
        .unwrap_or((Operator::Eq, term))
}
