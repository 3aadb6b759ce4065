//! Reference embedding in node text and the substitution pipeline (spec §4.8).

use crate::capabilities::Capabilities;
use crate::error::CannoliResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a [`Reference`] resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    Variable,
    Note,
    Floating,
    Selection,
    CreateNote,
}

/// A named reference embedded in a node (spec §3). Extraction flags control which
/// facets of a note are pulled in when `kind` is `Note`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: Option<ReferenceKind>,
    #[serde(default)]
    pub should_extract: bool,
    #[serde(default)]
    pub include_name: Option<bool>,
    #[serde(default)]
    pub include_properties: Option<bool>,
    #[serde(default)]
    pub include_link: Option<bool>,
    #[serde(default)]
    pub subpath: Option<String>,
}

fn default_kind() -> Option<ReferenceKind> {
    None
}

/// Inclusion flags parsed from a `<mods>` suffix: `#`/`!#` (title),
/// `^`/`!^` (properties), `@`/`!@` (link). Absent flags default to the engine's
/// standard policy (title+body included, properties and link excluded).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteMods {
    pub include_title: Option<bool>,
    pub include_properties: Option<bool>,
    pub include_link: Option<bool>,
}

pub fn parse_mods(raw: &str) -> NoteMods {
    let mut mods = NoteMods::default();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        let negate = c == '!';
        let flag = if negate { chars.next() } else { Some(c) };
        match flag {
            Some('#') => mods.include_title = Some(!negate),
            Some('^') => mods.include_properties = Some(!negate),
            Some('@') => mods.include_link = Some(!negate),
            _ => {}
        }
    }
    mods
}

/// Resolved inputs available while rendering a node's text: incoming variable
/// payloads, the current loop indices of enclosing loop groups (outermost first),
/// floating node values, and the caller's current note/selection.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext {
    /// name -> (value, is_reflexive). Variable conflict rule (spec §4.8): the
    /// reflexive edge wins; otherwise the first discovered wins. Populate in
    /// discovery order and mark the reflexive source so `resolve_variable` can
    /// prefer it regardless of position.
    pub variables: Vec<(String, String, bool)>,
    pub loop_indices: Vec<usize>,
    pub floating: HashMap<String, String>,
    pub current_note: Option<String>,
}

impl SubstitutionContext {
    fn resolve_variable(&self, name: &str) -> Option<&str> {
        let reflexive = self
            .variables
            .iter()
            .find(|(n, _, refl)| n == name && *refl);
        if let Some((_, v, _)) = reflexive {
            return Some(v.as_str());
        }
        self.variables
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, v, _)| v.as_str())
    }

    fn loop_index(&self, depth: usize) -> Option<usize> {
        // depth 1 = innermost ("#"), depth 2 = second-innermost ("##"), etc.
        let len = self.loop_indices.len();
        if depth == 0 || depth > len {
            return None;
        }
        self.loop_indices.get(len - depth).copied()
    }
}

/// A single `{{...}}` token discovered during step 1 of the pipeline.
enum Token {
    Variable(String),
    LoopIndex(usize),
    NoteFromVariable(String),
    NoteLiteral { name: String, mods: NoteMods },
    Floating(String),
    CurrentNote(NoteMods),
    Unresolved(String),
}

fn parse_token(inner: &str) -> Token {
    if inner.chars().all(|c| c == '#') && !inner.is_empty() {
        return Token::LoopIndex(inner.len());
    }
    if let Some(rest) = inner.strip_prefix('@') {
        return Token::NoteFromVariable(rest.to_string());
    }
    if let Some(rest) = inner.strip_prefix("[[") {
        if let Some(close) = rest.find("]]") {
            let name = rest[..close].to_string();
            let mods = parse_mods(&rest[close + 2..]);
            return Token::NoteLiteral { name, mods };
        }
    }
    if let Some(rest) = inner.strip_prefix('[') {
        if let Some(rest) = rest.strip_suffix(']') {
            return Token::Floating(rest.to_string());
        }
    }
    if let Some(rest) = inner.strip_prefix("NOTE") {
        return Token::CurrentNote(parse_mods(rest));
    }
    Token::Variable(inner.to_string())
}

fn format_note(name: &str, body: &str, mods: NoteMods) -> String {
    let include_title = mods.include_title.unwrap_or(true);
    let mut out = String::new();
    if include_title {
        out.push_str(&format!("# {}\n", name));
    }
    out.push_str(body);
    out
}

/// Resolves embedded note transclusions `![[...]]` by blockquoting the referenced
/// note's body (spec §4.8 step 2). Missing notes leave the transclusion literal and
/// are recorded as a warning.
async fn resolve_transclusions(
    text: &str,
    caps: &Capabilities,
    warnings: &mut Vec<String>,
) -> CannoliResult<String> {
    let re = Regex::new(r"!\[\[([^\]]+)\]\]").expect("static regex");
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        let name = &text[m.start() + 3..m.end() - 2];
        match caps.vault.read_note(name, None).await? {
            Some(body) => {
                let quoted = body
                    .lines()
                    .map(|l| format!("> {}", l))
                    .collect::<Vec<_>>()
                    .join("\n");
                out.push_str(&quoted);
            }
            None => {
                warnings.push(format!("embedded note not found: {}", name));
                out.push_str(&text[m.start()..m.end()]);
            }
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Renders `text` against `ctx`, resolving every `{{...}}` reference (spec §4.8).
///
/// Unresolved variable references and missing notes are left as the literal
/// placeholder and appended to `warnings` (soft warnings, spec §7); the run
/// continues.
pub async fn substitute(
    text: &str,
    ctx: &SubstitutionContext,
    caps: &Capabilities,
    warnings: &mut Vec<String>,
) -> CannoliResult<String> {
    // Step 1: index every {{...}} occurrence so later transclusion resolution
    // cannot re-match text that came out of a substitution.
    let token_re = Regex::new(r"\{\{([^{}]*)\}\}").expect("static regex");
    let mut tokens = Vec::new();
    let mut indexed = String::with_capacity(text.len());
    let mut last = 0;
    for m in token_re.find_iter(text) {
        indexed.push_str(&text[last..m.start()]);
        let inner = &text[m.start() + 2..m.end() - 2];
        let idx = tokens.len();
        tokens.push(parse_token(inner));
        indexed.push_str(&format!("\u{0}REF{}\u{0}", idx));
        last = m.end();
    }
    indexed.push_str(&text[last..]);

    // Step 2: resolve embedded note transclusions.
    let with_transclusions = resolve_transclusions(&indexed, caps, warnings).await?;

    // Step 3: substitute index placeholders with resolved content.
    let mut out = with_transclusions;
    for (idx, token) in tokens.into_iter().enumerate() {
        let placeholder = format!("\u{0}REF{}\u{0}", idx);
        let replacement = match token {
            Token::Variable(name) => match ctx.resolve_variable(&name) {
                Some(v) => v.to_string(),
                None => {
                    warnings.push(format!("unresolved variable reference: {}", name));
                    format!("{{{{{}}}}}", name)
                }
            },
            Token::LoopIndex(depth) => match ctx.loop_index(depth) {
                Some(i) => i.to_string(),
                None => {
                    warnings.push(format!("no enclosing loop at depth {}", depth));
                    "#".repeat(depth)
                }
            },
            Token::NoteFromVariable(var_name) => match ctx.resolve_variable(&var_name) {
                Some(note_name) => match caps.vault.read_note(note_name, None).await? {
                    Some(body) => format_note(note_name, &body, NoteMods::default()),
                    None => {
                        warnings.push(format!("note not found: {}", note_name));
                        format!("{{{{@{}}}}}", var_name)
                    }
                },
                None => {
                    warnings.push(format!("unresolved variable reference: {}", var_name));
                    format!("{{{{@{}}}}}", var_name)
                }
            },
            Token::NoteLiteral { name, mods } => match caps.vault.read_note(&name, None).await? {
                Some(body) => format_note(&name, &body, mods),
                None => {
                    warnings.push(format!("note not found: {}", name));
                    format!("{{{{[[{}]]}}}}", name)
                }
            },
            Token::Floating(name) => match ctx.floating.get(&name) {
                Some(v) => v.clone(),
                None => {
                    warnings.push(format!("unresolved floating reference: {}", name));
                    format!("{{{{[{}]}}}}", name)
                }
            },
            Token::CurrentNote(mods) => match &ctx.current_note {
                Some(body) => format_note("NOTE", body, mods),
                None => {
                    warnings.push("no current note in context".to_string());
                    "{{NOTE}}".to_string()
                }
            },
            Token::Unresolved(raw) => format!("{{{{{}}}}}", raw),
        };
        out = out.replace(&placeholder, &replacement);
    }

    // Step 4 (optional data-query replacement) is applied by the caller when a
    // DataProvider capability is present; a bare engine has nothing to query.
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mods_reads_each_flag_and_its_negation() {
        let mods = parse_mods("#^@");
        assert_eq!(mods.include_title, Some(true));
        assert_eq!(mods.include_properties, Some(true));
        assert_eq!(mods.include_link, Some(true));

        let negated = parse_mods("!#!^!@");
        assert_eq!(negated.include_title, Some(false));
        assert_eq!(negated.include_properties, Some(false));
        assert_eq!(negated.include_link, Some(false));

        let empty = parse_mods("");
        assert_eq!(empty.include_title, None);
        assert_eq!(empty.include_properties, None);
        assert_eq!(empty.include_link, None);
    }

    #[test]
    fn parse_token_recognizes_every_reference_shape() {
        assert!(matches!(parse_token("##"), Token::LoopIndex(2)));
        assert!(matches!(parse_token("@note-var"), Token::NoteFromVariable(n) if n == "note-var"));
        assert!(matches!(parse_token("[[My Note]]#"), Token::NoteLiteral { name, .. } if name == "My Note"));
        assert!(matches!(parse_token("[floating-name]"), Token::Floating(n) if n == "floating-name"));
        assert!(matches!(parse_token("NOTE#"), Token::CurrentNote(_)));
        assert!(matches!(parse_token("plain"), Token::Variable(n) if n == "plain"));
    }

    #[test]
    fn resolve_variable_prefers_the_reflexive_source_over_discovery_order() {
        let ctx = SubstitutionContext {
            variables: vec![
                ("total".to_string(), "first".to_string(), false),
                ("total".to_string(), "looped".to_string(), true),
            ],
            ..SubstitutionContext::default()
        };
        assert_eq!(ctx.resolve_variable("total"), Some("looped"));
        assert_eq!(ctx.resolve_variable("missing"), None);
    }

    #[test]
    fn loop_index_counts_hashes_from_the_innermost_group_outward() {
        let ctx = SubstitutionContext {
            loop_indices: vec![0, 2, 5],
            ..SubstitutionContext::default()
        };
        assert_eq!(ctx.loop_index(1), Some(5));
        assert_eq!(ctx.loop_index(2), Some(2));
        assert_eq!(ctx.loop_index(3), Some(0));
        assert_eq!(ctx.loop_index(4), None);
        assert_eq!(ctx.loop_index(0), None);
    }
}
