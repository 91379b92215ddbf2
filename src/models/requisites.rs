use std::sync::OnceLock;

use regex::Regex;

/// One named condition with a satisfied flag. The minute offset is only
/// present in timed sets; it records the expected elapsed time from task
/// start and never affects satisfaction logic.
#[derive(Debug, Clone)]
struct Requisite {
    text: String,
    minutes: Option<f64>,
    satisfied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetKind {
    Exact,
    Timed,
    Fuzzy,
}

/// A prerequisite or postrequisite container. Three matching behaviours
/// share this interface:
///
/// - exact: token-for-token match;
/// - timed: exact matching plus an informational minute offset per token;
/// - fuzzy: tokens are `file <glob> ready` patterns whose glob may embed a
///   `<lo..hi>` stamp range, sharpened to the concrete matched token on
///   first match.
///
/// Tokens are unique within one set. Sizes are small (≤ 20), so all
/// operations are linear scans.
#[derive(Debug, Clone)]
pub struct RequisiteSet {
    owner: String,
    kind: SetKind,
    items: Vec<Requisite>,
}

impl RequisiteSet {
    pub fn exact<I, S>(owner: &str, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: owner.to_string(),
            kind: SetKind::Exact,
            items: tokens
                .into_iter()
                .map(|t| Requisite {
                    text: t.into(),
                    minutes: None,
                    satisfied: false,
                })
                .collect(),
        }
    }

    pub fn timed<I, S>(owner: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (f64, S)>,
        S: Into<String>,
    {
        Self {
            owner: owner.to_string(),
            kind: SetKind::Timed,
            items: entries
                .into_iter()
                .map(|(minutes, t)| Requisite {
                    text: t.into(),
                    minutes: Some(minutes),
                    satisfied: false,
                })
                .collect(),
        }
    }

    pub fn fuzzy<I, S>(owner: &str, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: owner.to_string(),
            kind: SetKind::Fuzzy,
            items: patterns
                .into_iter()
                .map(|t| Requisite {
                    text: t.into(),
                    minutes: None,
                    satisfied: false,
                })
                .collect(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether `token` names a requisite in this set (stored form; for a
    /// fuzzy set this is the sharpened form once sharpening has happened).
    pub fn exists(&self, token: &str) -> bool {
        self.items.iter().any(|r| r.text == token)
    }

    /// Whether the named requisite is satisfied. Unknown tokens are not.
    pub fn satisfied(&self, token: &str) -> bool {
        self.items.iter().any(|r| r.text == token && r.satisfied)
    }

    /// Mark the named requisite satisfied. Idempotent; unknown tokens are
    /// ignored (callers check `exists` first and warn as appropriate).
    pub fn set_satisfied(&mut self, token: &str) {
        if let Some(req) = self.items.iter_mut().find(|r| r.text == token) {
            req.satisfied = true;
        }
    }

    /// Bulk transition used when seeding an instance in a finished state.
    pub fn set_all_satisfied(&mut self) {
        for req in &mut self.items {
            req.satisfied = true;
        }
    }

    pub fn all_satisfied(&self) -> bool {
        self.items.iter().all(|r| r.satisfied)
    }

    /// Snapshot of the stored tokens (sharpened forms for fuzzy sets).
    pub fn list(&self) -> Vec<String> {
        self.items.iter().map(|r| r.text.clone()).collect()
    }

    /// Minute offsets for a timed set, zero for anything else.
    pub fn get_times(&self) -> Vec<(f64, String)> {
        self.items
            .iter()
            .map(|r| (r.minutes.unwrap_or(0.0), r.text.clone()))
            .collect()
    }

    /// Satisfy my unsatisfied requisites from the satisfied postrequisites
    /// of `other`. Exact and timed sets need a token-for-token match. A
    /// fuzzy requisite matches any satisfied token fitting its pattern and
    /// is sharpened to the lexicographically greatest match, so the
    /// most-recent time-stamped artifact wins; thereafter it behaves as an
    /// exact requisite.
    pub fn satisfy_me(&mut self, other: &RequisiteSet) {
        let fuzzy = self.kind == SetKind::Fuzzy;
        for req in &mut self.items {
            if req.satisfied {
                continue;
            }
            if fuzzy {
                if let Some(pattern) = FuzzyPattern::parse(&req.text) {
                    let best = other
                        .items
                        .iter()
                        .filter(|o| o.satisfied && pattern.matches(&o.text))
                        .map(|o| o.text.as_str())
                        .max();
                    if let Some(token) = best {
                        tracing::debug!(
                            owner = %self.owner,
                            "sharpened '{}' to '{}'",
                            req.text,
                            token
                        );
                        req.text = token.to_string();
                        req.satisfied = true;
                    }
                    continue;
                }
                // no range expression left: sharpened, fall through to exact
            }
            if other.satisfied(&req.text) {
                req.satisfied = true;
            }
        }
    }

    /// Hypothetical form of `satisfy_me`: reports whether this set would be
    /// fully satisfied by `other`, without mutating anything.
    pub fn will_satisfy_me(&self, other: &RequisiteSet) -> bool {
        let mut probe = self.clone();
        probe.satisfy_me(other);
        probe.all_satisfied()
    }
}

/// A fuzzy requisite pattern, split around its `<lo..hi>` range expression.
/// Both bounds are 10-digit cycle stamps; candidate tokens substitute a
/// stamp within the closed range. Stamps are fixed width, so textual
/// comparison is numeric comparison.
struct FuzzyPattern<'a> {
    prefix: &'a str,
    lo: &'a str,
    hi: &'a str,
    suffix: &'a str,
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*)<(\d{10})\.\.(\d{10})>(.*)$").expect("valid regex"))
}

impl<'a> FuzzyPattern<'a> {
    fn parse(text: &'a str) -> Option<Self> {
        let caps = range_re().captures(text)?;
        Some(Self {
            prefix: caps.get(1).map(|m| m.as_str())?,
            lo: caps.get(2).map(|m| m.as_str())?,
            hi: caps.get(3).map(|m| m.as_str())?,
            suffix: caps.get(4).map(|m| m.as_str())?,
        })
    }

    fn matches(&self, candidate: &str) -> bool {
        let expected_len = self.prefix.len() + 10 + self.suffix.len();
        if candidate.len() != expected_len
            || !candidate.starts_with(self.prefix)
            || !candidate.ends_with(self.suffix)
        {
            return false;
        }
        let stamp = &candidate[self.prefix.len()..self.prefix.len() + 10];
        stamp.bytes().all(|b| b.is_ascii_digit()) && self.lo <= stamp && stamp <= self.hi
    }
}
