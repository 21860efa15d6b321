//! Group validator
//!
//! Checks a configuration's `proxies`, `proxy-groups` and `rules` for referential
//! integrity and group cycles. Repairs that need no guessing (dropping duplicates,
//! correcting sentinel typos, removing dangling members) are applied to a copy
//! that is returned as `fixedConfig`.

mod cycles;

pub use cycles::{GroupGraph, find_cycles};

use std::collections::HashSet;
use std::fmt;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, trace};

use crate::emit::reorder_fields;
use crate::model::{GroupType, ProxyType, Rule, is_sentinel};

/// Sentinel misspellings that are corrected automatically
const SENTINEL_TYPOS: [(&str, &str); 3] = [
    ("DIRCT", "DIRECT"),
    ("REJET", "REJECT"),
    ("REJCT", "REJECT"),
];

/// Switches that pull members in without an explicit list
const INCLUDE_SWITCHES: [&str; 3] = ["include-all", "include-all-proxies", "include-all-providers"];

/// Policies only valid as a rule target
const RULE_ONLY_TARGETS: [&str; 2] = ["REJECT-DROP", "COMPATIBLE"];

// ============================================================================
// Issues and Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    /// The configuration is unusable as-is
    Error,
    Warning,
    Info,
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            IssueLevel::Error => "error",
            IssueLevel::Warning => "warning",
            IssueLevel::Info => "info",
        };
        f.write_str(level)
    }
}

/// One finding, located by a structural path such as `proxy-groups[2].proxies[0]`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub message: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The fixed configuration no longer has this problem
    pub auto_fixed: bool,
    /// Closed group path for cycle errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
}

impl ValidationIssue {
    fn new(level: IssueLevel, message: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            location: location.into(),
            field: None,
            auto_fixed: false,
            path: None,
        }
    }

    pub fn error(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(IssueLevel::Error, message, location)
    }

    pub fn warning(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(IssueLevel::Warning, message, location)
    }

    pub fn info(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(IssueLevel::Info, message, location)
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn fixed(mut self) -> Self {
        self.auto_fixed = true;
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.location, self.message)?;
        if self.auto_fixed {
            f.write_str(" (fixed)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// No error-level issue was found
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    /// Present only when at least one issue was fixed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_config: Option<Value>,
}

impl ValidationResult {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.level == IssueLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.level == IssueLevel::Warning)
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parses a YAML document and validates it
pub fn validate_yaml(content: &str) -> Result<ValidationResult> {
    let config: Value = serde_yaml::from_str(content).context("Failed to parse configuration YAML")?;
    Ok(validate(&config))
}

/// Validates a configuration with `proxies`, `proxy-groups` and optional `rules`
pub fn validate(config: &Value) -> ValidationResult {
    let Value::Mapping(root) = config else {
        return ValidationResult {
            valid: false,
            issues: vec![ValidationIssue::error("configuration must be a mapping", "$")],
            fixed_config: None,
        };
    };

    let mut validator = Validator::default();
    let mut fixed = root.clone();

    let proxy_names = match validator.check_proxies(root.get("proxies")) {
        Some((proxies, names)) => {
            fixed.insert("proxies".into(), Value::Sequence(proxies));
            names
        }
        None => Vec::new(),
    };

    let group_names = declared_group_names(root.get("proxy-groups"));
    let scope = NameScope {
        proxies: proxy_names.iter().map(String::as_str).collect(),
        groups: group_names.iter().map(String::as_str).collect(),
    };

    if let Some((groups, graph)) = validator.check_groups(root.get("proxy-groups"), &scope) {
        validator.check_cycles(&graph);
        fixed.insert("proxy-groups".into(), Value::Sequence(groups));
    }

    if let Some(rules) = validator.check_rules(root.get("rules"), &scope) {
        fixed.insert("rules".into(), Value::Sequence(rules));
    }

    let issues = validator.issues;
    let valid = !issues.iter().any(|i| i.level == IssueLevel::Error);
    let fixed_config = issues
        .iter()
        .any(|i| i.auto_fixed)
        .then_some(Value::Mapping(fixed));

    debug!(
        "Validation finished: {} issues ({} errors), valid={}, fixed={}",
        issues.len(),
        issues.iter().filter(|i| i.level == IssueLevel::Error).count(),
        valid,
        fixed_config.is_some()
    );
    ValidationResult {
        valid,
        issues,
        fixed_config,
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Names a member or rule target may resolve to
struct NameScope<'a> {
    proxies: HashSet<&'a str>,
    /// Built from the group list as written, before any fix
    groups: HashSet<&'a str>,
}

impl NameScope<'_> {
    fn resolves(&self, name: &str) -> bool {
        is_sentinel(name) || self.proxies.contains(name) || self.groups.contains(name)
    }
}

#[derive(Default)]
struct Validator {
    issues: Vec<ValidationIssue>,
}

impl Validator {
    fn report(&mut self, issue: ValidationIssue) {
        trace!("{}", issue);
        self.issues.push(issue);
    }

    /// Returns the fixed proxy list and the names it keeps
    fn check_proxies(&mut self, section: Option<&Value>) -> Option<(Vec<Value>, Vec<String>)> {
        let items = match section {
            None | Some(Value::Null) => return None,
            Some(Value::Sequence(items)) => items,
            Some(_) => {
                self.report(ValidationIssue::error("proxies must be a list", "proxies"));
                return None;
            }
        };

        let mut kept = Vec::with_capacity(items.len());
        let mut names: Vec<String> = Vec::with_capacity(items.len());
        let mut seen = HashSet::new();
        for (idx, item) in items.iter().enumerate() {
            let location = format!("proxies[{}]", idx);
            let Value::Mapping(mapping) = item else {
                self.report(ValidationIssue::error("proxy entry must be a mapping", location).fixed());
                continue;
            };
            let Some(name) = non_empty_str(mapping, "name") else {
                self.report(
                    ValidationIssue::error("proxy is missing a name", location)
                        .with_field("name")
                        .fixed(),
                );
                continue;
            };
            if !seen.insert(name) {
                self.report(
                    ValidationIssue::error(format!("duplicate proxy name '{}'", name), location)
                        .with_field("name")
                        .fixed(),
                );
                continue;
            }

            self.check_proxy_fields(mapping, name, &location);

            let name_first = mapping.iter().next().and_then(|(k, _)| k.as_str()) == Some("name");
            if name_first {
                kept.push(item.clone());
            } else {
                self.report(
                    ValidationIssue::warning(
                        format!("proxy '{}': name should be the first field", name),
                        location,
                    )
                    .with_field("name")
                    .fixed(),
                );
                kept.push(Value::Mapping(reorder_fields(mapping, &["name"])));
            }
            names.push(name.to_string());
        }
        Some((kept, names))
    }

    fn check_proxy_fields(&mut self, mapping: &Mapping, name: &str, location: &str) {
        match mapping.get("type").and_then(Value::as_str) {
            Some(raw) if raw.parse::<ProxyType>().is_ok() => {}
            Some(raw) => self.report(
                ValidationIssue::error(format!("proxy '{}': unknown type '{}'", name, raw), location)
                    .with_field("type"),
            ),
            None => self.report(
                ValidationIssue::error(format!("proxy '{}' is missing a type", name), location)
                    .with_field("type"),
            ),
        }
        if non_empty_str(mapping, "server").is_none() {
            self.report(
                ValidationIssue::error(format!("proxy '{}' is missing a server", name), location)
                    .with_field("server"),
            );
        }
        let port = match mapping.get("port") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        if !port.is_some_and(|p| (1..=65535).contains(&p)) {
            self.report(
                ValidationIssue::error(format!("proxy '{}' has no valid port", name), location)
                    .with_field("port"),
            );
        }
    }

    /// Returns the fixed group list and the group → group graph built from it
    fn check_groups(&mut self, section: Option<&Value>, scope: &NameScope) -> Option<(Vec<Value>, GroupGraph)> {
        let items = match section {
            None | Some(Value::Null) => return None,
            Some(Value::Sequence(items)) => items,
            Some(_) => {
                self.report(ValidationIssue::error("proxy-groups must be a list", "proxy-groups"));
                return None;
            }
        };

        let mut kept = Vec::with_capacity(items.len());
        let mut graph = GroupGraph::new();
        let mut seen = HashSet::new();
        for (idx, item) in items.iter().enumerate() {
            let location = format!("proxy-groups[{}]", idx);
            let Value::Mapping(mapping) = item else {
                self.report(ValidationIssue::error("group entry must be a mapping", location).fixed());
                continue;
            };
            let Some(name) = non_empty_str(mapping, "name") else {
                self.report(
                    ValidationIssue::error("group is missing a name", location)
                        .with_field("name")
                        .fixed(),
                );
                continue;
            };
            if !seen.insert(name) {
                self.report(
                    ValidationIssue::error(format!("duplicate group name '{}'", name), location)
                        .with_field("name")
                        .fixed(),
                );
                continue;
            }

            self.check_group_header(mapping, name, &location, scope);
            let (members, changed) = self.check_members(mapping, name, &location, scope);
            self.check_selection(mapping, name, &location, &members);

            graph.add_group(
                name,
                members
                    .iter()
                    .filter(|m| scope.groups.contains(m.as_str()))
                    .cloned(),
            );

            if changed {
                let mut mapping = mapping.clone();
                let members = members.into_iter().map(Value::from).collect();
                mapping.insert("proxies".into(), Value::Sequence(members));
                kept.push(Value::Mapping(mapping));
            } else {
                kept.push(item.clone());
            }
        }
        Some((kept, graph))
    }

    fn check_group_header(&mut self, mapping: &Mapping, name: &str, location: &str, scope: &NameScope) {
        if is_sentinel(name) {
            self.report(
                ValidationIssue::error(format!("group name '{}' is reserved", name), location)
                    .with_field("name"),
            );
        } else if scope.proxies.contains(name) {
            self.report(
                ValidationIssue::warning(
                    format!("group '{}' shadows a proxy of the same name", name),
                    location,
                )
                .with_field("name"),
            );
        }

        match mapping.get("type").and_then(Value::as_str) {
            Some(raw) if raw.parse::<GroupType>().is_ok() => {}
            Some(raw) => self.report(
                ValidationIssue::error(format!("group '{}': unknown type '{}'", name, raw), location)
                    .with_field("type"),
            ),
            None => self.report(
                ValidationIssue::error(format!("group '{}' is missing a type", name), location)
                    .with_field("type"),
            ),
        }

        for field in ["filter", "exclude-filter"] {
            if let Some(pattern) = non_empty_str(mapping, field)
                && let Err(e) = Regex::new(pattern)
            {
                self.report(
                    ValidationIssue::error(
                        format!("group '{}': invalid {} '{}': {}", name, field, pattern, e),
                        location,
                    )
                    .with_field(field),
                );
            }
        }
    }

    /// Resolves every static member, returning the repaired list and whether it changed
    fn check_members(
        &mut self,
        mapping: &Mapping,
        name: &str,
        location: &str,
        scope: &NameScope,
    ) -> (Vec<String>, bool) {
        let items = match mapping.get("proxies") {
            None | Some(Value::Null) => return (Vec::new(), false),
            Some(Value::Sequence(items)) => items,
            Some(_) => {
                self.report(
                    ValidationIssue::error(format!("group '{}': proxies must be a list", name), location)
                        .with_field("proxies"),
                );
                return (Vec::new(), false);
            }
        };

        let mut members: Vec<String> = Vec::with_capacity(items.len());
        let mut changed = false;
        for (idx, item) in items.iter().enumerate() {
            let member_location = format!("{}.proxies[{}]", location, idx);
            let Some(member) = item.as_str() else {
                self.report(
                    ValidationIssue::error(
                        format!("group '{}': member must be a string", name),
                        member_location,
                    )
                    .with_field("proxies")
                    .fixed(),
                );
                changed = true;
                continue;
            };

            if member == name {
                self.report(
                    ValidationIssue::error(
                        format!("group '{}' references itself", name),
                        member_location,
                    )
                    .with_field("proxies")
                    .fixed(),
                );
                changed = true;
                continue;
            }

            let mut member = member.to_string();
            if !scope.resolves(&member) {
                match SENTINEL_TYPOS.iter().find(|(typo, _)| *typo == member) {
                    Some((typo, correct)) => {
                        self.report(
                            ValidationIssue::warning(
                                format!("group '{}': corrected '{}' to '{}'", name, typo, correct),
                                member_location.clone(),
                            )
                            .with_field("proxies")
                            .fixed(),
                        );
                        member = correct.to_string();
                        changed = true;
                    }
                    None => {
                        self.report(
                            ValidationIssue::error(
                                format!("group '{}' references unknown member '{}'", name, member),
                                member_location,
                            )
                            .with_field("proxies")
                            .fixed(),
                        );
                        changed = true;
                        continue;
                    }
                }
            }

            if members.contains(&member) {
                self.report(
                    ValidationIssue::warning(
                        format!("group '{}': removed duplicate member '{}'", name, member),
                        member_location,
                    )
                    .with_field("proxies")
                    .fixed(),
                );
                changed = true;
                continue;
            }
            members.push(member);
        }
        (members, changed)
    }

    /// A group needs static members, providers, a filter or an include switch
    fn check_selection(&mut self, mapping: &Mapping, name: &str, location: &str, members: &[String]) {
        let listed = mapping
            .get("proxies")
            .and_then(Value::as_sequence)
            .is_some_and(|items| !items.is_empty());
        let has_providers = mapping
            .get("use")
            .and_then(Value::as_sequence)
            .is_some_and(|items| !items.is_empty());
        let has_filter = non_empty_str(mapping, "filter").is_some();
        let includes = INCLUDE_SWITCHES
            .iter()
            .any(|key| mapping.get(*key).and_then(Value::as_bool) == Some(true));
        let dynamic = has_providers || has_filter || includes;

        if !listed && !dynamic {
            self.report(
                ValidationIssue::error(
                    format!("group '{}' has no members and no way to select proxies", name),
                    location,
                )
                .with_field("proxies"),
            );
        } else if listed && members.is_empty() && !dynamic {
            self.report(
                ValidationIssue::error(
                    format!("group '{}' has no members left after removing unresolved ones", name),
                    location,
                )
                .with_field("proxies"),
            );
        }
    }

    fn check_cycles(&mut self, graph: &GroupGraph) {
        for path in find_cycles(graph) {
            let mut issue = ValidationIssue::error(
                format!("circular group reference detected: {}", path.join(" → ")),
                "proxy-groups",
            )
            .with_field("proxies");
            issue.path = Some(path);
            self.report(issue);
        }
    }

    /// Returns the fixed rule list; an absent or empty rule list is not checked
    fn check_rules(&mut self, section: Option<&Value>, scope: &NameScope) -> Option<Vec<Value>> {
        let items = match section {
            Some(Value::Sequence(items)) if !items.is_empty() => items,
            None | Some(Value::Null) | Some(Value::Sequence(_)) => return None,
            Some(_) => {
                self.report(ValidationIssue::error("rules must be a list", "rules"));
                return None;
            }
        };

        let mut kept = Vec::with_capacity(items.len());
        let mut terminal_seen = false;
        for (idx, item) in items.iter().enumerate() {
            let location = format!("rules[{}]", idx);
            let Some(line) = item.as_str() else {
                self.report(ValidationIssue::error("rule must be a string", location).fixed());
                continue;
            };
            if terminal_seen {
                self.report(
                    ValidationIssue::warning(
                        format!("rule '{}' is unreachable after MATCH", line),
                        location,
                    )
                    .fixed(),
                );
                continue;
            }
            let rule = match line.parse::<Rule>() {
                Ok(rule) => rule,
                Err(e) => {
                    self.report(ValidationIssue::error(format!("{:#}", e), location).fixed());
                    continue;
                }
            };
            if !scope.resolves(&rule.target) && !RULE_ONLY_TARGETS.contains(&rule.target.as_str()) {
                self.report(
                    ValidationIssue::error(
                        format!("rule '{}' targets unknown policy '{}'", line, rule.target),
                        location,
                    )
                    .with_field("target")
                    .fixed(),
                );
                continue;
            }
            terminal_seen = rule.is_match();
            kept.push(item.clone());
        }

        if !terminal_seen {
            self.report(ValidationIssue::error("rules have no terminal MATCH rule", "rules"));
        }
        Some(kept)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn non_empty_str<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a str> {
    mapping
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Group names in declaration order, first occurrence only
fn declared_group_names(section: Option<&Value>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let groups = section.and_then(Value::as_sequence).map(Vec::as_slice).unwrap_or_default();
    for group in groups {
        if let Some(name) = group.as_mapping().and_then(|m| non_empty_str(m, "name"))
            && !names.iter().any(|n| n == name)
        {
            names.push(name.to_string());
        }
    }
    names
}
