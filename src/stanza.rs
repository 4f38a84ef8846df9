//! The parser configuration mini-language the generator emits.
//!
//! Statements are block-structured: `verb { operation => { "key" => "value" } }`,
//! conditionals `if [key] { ... }`, and `json` / `date` plugin blocks. Output
//! is indented two spaces per nesting level and string literals are escaped,
//! so rendering is deterministic for a given statement list.

use std::fmt;

/// Target type of a `convert` mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertType {
    Integer,
    Float,
}

impl ConvertType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvertType::Integer => "integer",
            ConvertType::Float => "float",
        }
    }
}

impl fmt::Display for ConvertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamp formats understood by the `date` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Iso8601,
    /// Seconds since the Unix epoch.
    Unix,
    /// Milliseconds since the Unix epoch.
    UnixMs,
}

impl DateFormat {
    /// Every format a timestamp mapping tries, in match order.
    pub const ALL: [DateFormat; 3] = [DateFormat::Iso8601, DateFormat::Unix, DateFormat::UnixMs];

    pub fn as_str(self) -> &'static str {
        match self {
            DateFormat::Iso8601 => "ISO8601",
            DateFormat::Unix => "UNIX",
            DateFormat::UnixMs => "UNIX_MS",
        }
    }
}

/// A single `mutate` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Move a field, removing the original.
    Rename { from: String, to: String },
    /// Duplicate a field, keeping the original.
    Copy { from: String, to: String },
    /// Coerce a field's type in place.
    Convert { field: String, to: ConvertType },
    /// Assign a static or `%{field}`-templated value.
    Replace { field: String, value: String },
    /// Append `from` into the array or object at `into`.
    Merge { into: String, from: String },
    /// Delete fields.
    RemoveField(Vec<String>),
}

/// A statement inside the `filter { ... }` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Comment(String),
    Blank,
    Json {
        source: String,
        on_error: String,
    },
    Date {
        source: String,
        formats: Vec<DateFormat>,
        target: String,
        on_error: String,
    },
    Mutate(Mutation),
    If {
        field: String,
        body: Vec<Statement>,
    },
    /// Pre-authored text, re-indented line by line.
    Raw(String),
}

impl Statement {
    pub fn comment(text: impl Into<String>) -> Self {
        Statement::Comment(text.into())
    }

    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Statement::Mutate(Mutation::Rename {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn convert(field: impl Into<String>, to: ConvertType) -> Self {
        Statement::Mutate(Mutation::Convert {
            field: field.into(),
            to,
        })
    }

    pub fn replace(field: impl Into<String>, value: impl Into<String>) -> Self {
        Statement::Mutate(Mutation::Replace {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn merge(into: impl Into<String>, from: impl Into<String>) -> Self {
        Statement::Mutate(Mutation::Merge {
            into: into.into(),
            from: from.into(),
        })
    }

    pub fn remove_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Statement::Mutate(Mutation::RemoveField(
            fields.into_iter().map(Into::into).collect(),
        ))
    }

    /// Render this statement at `depth` levels of indentation.
    pub fn render_into(&self, out: &mut String, depth: usize) {
        let pad = indent(depth);
        match self {
            Statement::Comment(text) => {
                for line in text.lines() {
                    out.push_str(&format!("{pad}# {line}\n"));
                }
            }
            Statement::Blank => out.push('\n'),
            Statement::Json { source, on_error } => {
                out.push_str(&format!("{pad}json {{\n"));
                out.push_str(&format!("{pad}  source => {}\n", quote(source)));
                out.push_str(&format!("{pad}  on_error => {}\n", quote(on_error)));
                out.push_str(&format!("{pad}}}\n"));
            }
            Statement::Date {
                source,
                formats,
                target,
                on_error,
            } => {
                let matches = std::iter::once(quote(source))
                    .chain(formats.iter().map(|f| quote(f.as_str())))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!("{pad}date {{\n"));
                out.push_str(&format!("{pad}  match => [{matches}]\n"));
                out.push_str(&format!("{pad}  target => {}\n", quote(target)));
                out.push_str(&format!("{pad}  on_error => {}\n", quote(on_error)));
                out.push_str(&format!("{pad}}}\n"));
            }
            Statement::Mutate(mutation) => {
                out.push_str(&format!("{pad}mutate {{\n"));
                out.push_str(&format!("{pad}  {}\n", render_mutation(mutation)));
                out.push_str(&format!("{pad}}}\n"));
            }
            Statement::If { field, body } => {
                out.push_str(&format!("{pad}if {} {{\n", field_reference(field)));
                for statement in body {
                    statement.render_into(out, depth + 1);
                }
                out.push_str(&format!("{pad}}}\n"));
            }
            Statement::Raw(text) => {
                for line in text.lines() {
                    if line.trim().is_empty() {
                        out.push('\n');
                    } else {
                        out.push_str(&format!("{pad}{line}\n"));
                    }
                }
            }
        }
    }
}

fn render_mutation(mutation: &Mutation) -> String {
    match mutation {
        Mutation::Rename { from, to } => pair("rename", from, to),
        Mutation::Copy { from, to } => pair("copy", from, to),
        Mutation::Convert { field, to } => pair("convert", field, to.as_str()),
        Mutation::Replace { field, value } => pair("replace", field, value),
        Mutation::Merge { into, from } => pair("merge", into, from),
        Mutation::RemoveField(fields) => {
            let list = fields.iter().map(|f| quote(f)).collect::<Vec<_>>();
            format!("remove_field => [{}]", list.join(", "))
        }
    }
}

fn pair(operation: &str, key: &str, value: &str) -> String {
    format!("{operation} => {{ {} => {} }}", quote(key), quote(value))
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Double-quote a string literal, escaping backslashes and quotes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// A bracketed field reference for conditionals.
///
/// Brackets inside the key are percent-escaped (`%5B` / `%5D`) so the
/// reference stays a single well-formed `[...]` term.
pub fn field_reference(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 2);
    out.push('[');
    for c in key.chars() {
        match c {
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            c => out.push(c),
        }
    }
    out.push(']');
    out
}

/// Render statements as the body of a `filter { ... }` block.
pub fn render_filter(body: &[Statement]) -> String {
    let mut out = String::from("filter {\n");
    for statement in body {
        statement.render_into(&mut out, 1);
    }
    out.push_str("}\n");
    out
}
