//! Pine Script template boundary.
//!
//! A template is an opaque script plus the parameter declarations parsed out
//! of its `input.int(...)` / `input.float(...)` calls. The core never
//! interprets the script body: the only operations are extracting a
//! [`ParamSpace`] (with declared defaults) and materializing a concrete
//! parameter set back into the text by rewriting `defval=` literals.

use std::fs;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DataError};
use crate::params::{ParamSet, ParamSpace, ParamSpec, ParamValue};

/// Numeric kind of a parsed input declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum InputKind {
    Int,
    Float,
}

/// One parsed `input.*` declaration.
#[derive(Debug, Clone)]
struct InputDecl {
    kind: InputKind,
    title: String,
    defval: Option<f64>,
    minval: Option<f64>,
    maxval: Option<f64>,
    step: Option<f64>,
    /// Byte range of the defval literal inside the script, for rewriting.
    defval_span: Option<Range<usize>>,
}

/// A loaded strategy template: name, script text, parameter space, defaults.
#[derive(Debug, Clone)]
pub struct StrategyTemplate {
    name: String,
    code: String,
    space: ParamSpace,
    defaults: ParamSet,
    inputs: Vec<InputDecl>,
}

impl StrategyTemplate {
    /// Parse a template from script text. Declarations without both
    /// `minval` and `maxval` contribute a default but no searchable
    /// dimension. Fails if a declared range is inconsistent.
    pub fn from_code(name: impl Into<String>, code: impl Into<String>) -> Result<Self, ConfigError> {
        let code = code.into();
        let inputs = parse_inputs(&code);

        let mut space = ParamSpace::new();
        let mut defaults = ParamSet::new();
        for decl in &inputs {
            if let Some(defval) = decl.defval {
                let value = match decl.kind {
                    InputKind::Int => ParamValue::Int(defval.round() as i64),
                    InputKind::Float => ParamValue::Real(defval),
                };
                defaults.insert(decl.title.clone(), value);
            }
            if let (Some(low), Some(high)) = (decl.minval, decl.maxval) {
                let spec = match decl.kind {
                    InputKind::Int => ParamSpec::Int {
                        low: low.round() as i64,
                        high: high.round() as i64,
                        step: decl.step.map(|s| s.round() as i64),
                    },
                    InputKind::Float => ParamSpec::Real {
                        low,
                        high,
                        step: decl.step,
                    },
                };
                space.insert(decl.title.clone(), spec);
            }
        }
        space.validate()?;

        Ok(Self {
            name: name.into(),
            code,
            space,
            defaults,
            inputs,
        })
    }

    /// Load one `.pine` file.
    pub fn load(path: &Path) -> Result<Self, TemplateLoadError> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let code = fs::read_to_string(path).map_err(DataError::Io)?;
        Ok(Self::from_code(name, code)?)
    }

    /// Load every `.pine` file in a directory. Files that fail to parse are
    /// skipped; their errors come back as warnings so a bad template never
    /// takes down a whole scan.
    pub fn load_dir(dir: &Path) -> Result<(Vec<StrategyTemplate>, Vec<String>), DataError> {
        let mut templates = Vec::new();
        let mut warnings = Vec::new();

        let mut entries: Vec<_> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("pine"))
                    .unwrap_or(false)
            })
            .collect();
        entries.sort();

        for path in entries {
            match Self::load(&path) {
                Ok(t) => templates.push(t),
                Err(e) => warnings.push(format!("{}: {e}", path.display())),
            }
        }
        Ok((templates, warnings))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn space(&self) -> &ParamSpace {
        &self.space
    }

    /// Parameter set built from the declared defaults. This is the explicit
    /// fallback used whenever a caller has no better assignment.
    pub fn default_set(&self) -> ParamSet {
        self.defaults.clone()
    }

    /// Rewrite `defval=` literals for every parameter present in `params`
    /// and return the resulting script text. Parameters the template does
    /// not declare are ignored; the core never inspects the output.
    pub fn materialize(&self, params: &ParamSet) -> String {
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        for decl in &self.inputs {
            let (Some(span), Some(value)) = (decl.defval_span.clone(), params.get(&decl.title))
            else {
                continue;
            };
            let text = match (decl.kind, value) {
                (InputKind::Int, v) => match v.as_i64() {
                    Some(i) => i.to_string(),
                    None => continue,
                },
                (InputKind::Float, v) => match v.as_f64() {
                    Some(f) => format_float(f),
                    None => continue,
                },
            };
            edits.push((span, text));
        }

        edits.sort_by_key(|(span, _)| span.start);
        let mut out = String::with_capacity(self.code.len());
        let mut cursor = 0;
        for (span, text) in edits {
            out.push_str(&self.code[cursor..span.start]);
            out.push_str(&text);
            cursor = span.end;
        }
        out.push_str(&self.code[cursor..]);
        out
    }
}

/// Errors from loading a single template file.
#[derive(Debug, thiserror::Error)]
pub enum TemplateLoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Render a float without scientific notation, keeping integral values bare.
fn format_float(f: f64) -> String {
    if f == f.trunc() && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

// ─── Declaration parser ─────────────────────────────────────────────

/// Scan the script for `input.int(...)` / `input.float(...)` calls.
/// Declarations that cannot be parsed are skipped silently; they simply
/// contribute nothing to the space.
fn parse_inputs(code: &str) -> Vec<InputDecl> {
    let bytes = code.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(found) = code[pos..].find("input.") {
        let start = pos + found + "input.".len();
        let kind = if code[start..].starts_with("int") {
            InputKind::Int
        } else if code[start..].starts_with("float") {
            InputKind::Float
        } else {
            pos = start;
            continue;
        };
        let mut cursor = start
            + match kind {
                InputKind::Int => 3,
                InputKind::Float => 5,
            };

        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() || bytes[cursor] != b'(' {
            pos = cursor;
            continue;
        }

        let Some(close) = matching_paren(code, cursor) else {
            break;
        };
        if let Some(decl) = parse_decl(code, kind, cursor + 1, close) {
            out.push(decl);
        }
        pos = close + 1;
    }
    out
}

/// Index of the `)` matching the `(` at `open`, quote-aware.
fn matching_paren(code: &str, open: usize) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 0;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Parse the argument list between `start` and `end` (exclusive).
fn parse_decl(code: &str, kind: InputKind, start: usize, end: usize) -> Option<InputDecl> {
    let mut decl = InputDecl {
        kind,
        title: String::new(),
        defval: None,
        minval: None,
        maxval: None,
        step: None,
        defval_span: None,
    };

    for (arg_start, arg_end) in split_top_level(code, start, end) {
        let arg = &code[arg_start..arg_end];
        let Some(eq) = arg.find('=') else { continue };
        let key = arg[..eq].trim();
        let raw = arg[eq + 1..].trim();

        // Byte span of the trimmed value inside the full script.
        let value_start = arg_start + eq + 1 + (arg[eq + 1..].len() - arg[eq + 1..].trim_start().len());
        let value_end = value_start + raw.len();

        match key {
            "title" => {
                decl.title = raw.trim_matches(|c| c == '\'' || c == '"').to_string();
            }
            "defval" => {
                decl.defval = parse_number(raw);
                if decl.defval.is_some() {
                    decl.defval_span = Some(value_start..value_end);
                }
            }
            "minval" => decl.minval = parse_number(raw),
            "maxval" => decl.maxval = parse_number(raw),
            "step" => decl.step = parse_number(raw),
            _ => {}
        }
    }

    if decl.title.is_empty() {
        return None;
    }
    Some(decl)
}

/// Split `[start, end)` on commas outside quotes and nested parens.
fn split_top_level(code: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    let bytes = code.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut quote: Option<u8> = None;
    let mut piece_start = start;

    for i in start..end {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth -= 1,
                b',' if depth == 0 => {
                    parts.push((piece_start, i));
                    piece_start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push((piece_start, end));
    parts
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<i64>()
        .map(|v| v as f64)
        .or_else(|_| raw.parse::<f64>())
        .ok()
}
