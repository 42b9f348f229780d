//! Macro switches and source-level specialisation of WGSL.
//!
//! Two textual passes run before naga sees a shader:
//!
//! - [`specialize`] replaces `${NAME}` placeholders, used by parametric
//!   effect families (e.g. a blur built for a given radius).
//! - [`preprocess`] evaluates line directives against a [`MacroSet`]:
//!
//! ```text
//! #if USE_NORMAL
//!     out.normal = input.normal;
//! #else
//!     out.normal = vec3<f32>(0.0, 0.0, 1.0);
//! #endif
//! ```
//!
//! `#if !NAME` negates. Switches a source tests but the effect does not
//! declare evaluate to false. Stripped lines are replaced by empty lines so
//! naga diagnostics keep pointing at the original line numbers.

use std::collections::BTreeMap;

/// Named boolean switches, ordered by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MacroSet(BTreeMap<String, bool>);

impl MacroSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.set(name, enabled);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.0.insert(name.into(), enabled);
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }

    /// This set with `overrides` applied on top.
    pub fn overlaid(&self, overrides: &MacroSet) -> MacroSet {
        let mut merged = self.clone();
        for (name, enabled) in overrides.iter() {
            merged.set(name, enabled);
        }
        merged
    }

    /// Canonical variant key, e.g. `USE_NORMAL=1,USE_TEXCOORD_0=0`.
    pub fn key(&self) -> String {
        self.iter()
            .map(|(name, enabled)| format!("{name}={}", u8::from(enabled)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for MacroSet {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        let mut set = MacroSet::new();
        for (name, enabled) in iter {
            set.set(name, enabled);
        }
        set
    }
}

/// Replace every `${NAME}` placeholder with its value.
///
/// Fails with the first placeholder that has no value.
pub fn specialize(source: &str, values: &[(&str, String)]) -> Result<String, String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| String::from("unterminated '${' placeholder"))?;
        let name = &after[..end];
        let value = values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| format!("no value for placeholder '${{{name}}}'"))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[derive(Debug, Clone, Copy)]
struct Branch {
    /// Whether the enclosing branches are all taken.
    parent_active: bool,
    condition: bool,
    in_else: bool,
}

impl Branch {
    fn active(&self) -> bool {
        self.parent_active && (self.condition != self.in_else)
    }
}

/// Evaluate `#if`/`#else`/`#endif` directives against `macros`.
pub fn preprocess(source: &str, macros: &MacroSet) -> Result<String, String> {
    let mut out = String::with_capacity(source.len());
    let mut stack: Vec<Branch> = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();
        let active = stack.last().map_or(true, Branch::active);

        if !trimmed.starts_with('#') {
            if active {
                out.push_str(line);
            }
            out.push('\n');
            continue;
        }

        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let directive = parts.next().unwrap_or_default();
        let argument = parts.next().unwrap_or_default().trim();
        match directive {
            "#if" => {
                if argument.is_empty() {
                    return Err(format!("line {line_number}: '#if' without a switch name"));
                }
                let condition = match argument.strip_prefix('!') {
                    Some(name) => !macros.is_enabled(name.trim()),
                    None => macros.is_enabled(argument),
                };
                stack.push(Branch {
                    parent_active: active,
                    condition,
                    in_else: false,
                });
            }
            "#else" => {
                let branch = stack
                    .last_mut()
                    .ok_or_else(|| format!("line {line_number}: '#else' without '#if'"))?;
                if branch.in_else {
                    return Err(format!("line {line_number}: second '#else' for one '#if'"));
                }
                branch.in_else = true;
            }
            "#endif" => {
                stack
                    .pop()
                    .ok_or_else(|| format!("line {line_number}: '#endif' without '#if'"))?;
            }
            _ => return Err(format!("line {line_number}: unknown directive '{trimmed}'")),
        }
        out.push('\n');
    }

    if !stack.is_empty() {
        return Err(format!("{} unterminated '#if' block(s)", stack.len()));
    }
    Ok(out)
}
