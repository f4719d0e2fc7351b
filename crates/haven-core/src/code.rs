//! Identifying-code generation.
//!
//! Renders a configurable token template into a unique human-facing code for
//! a new record, retrying against a caller-supplied uniqueness check by
//! advancing whichever counters the template references.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from code generation.
#[derive(Debug, Error)]
pub enum CodeError<E> {
    /// The format references no counter token, so a collision can never be
    /// resolved by retrying.
    #[error("code format {format:?} has no counter token to resolve a collision")]
    FormatCannotResolve { format: String },

    /// The injected uniqueness check failed.
    #[error("code uniqueness check failed")]
    Uniqueness(#[source] E),
}

/// The configured code templates.
///
/// Token grammar (longest match, left to right, `\` escapes the next
/// character): `YYYY`/`YY` year, `MM` month, `DD` day,
/// `UUUUUUUUUU`/`UUUU` ever-counter, `NNN`/`NN` per-type-year counter,
/// `XXX`/`XX` per-year counter, `T`/`TT` animal type prefix, `S`/`SS`
/// species prefix, `E`/`EE` entry category prefix. Anything else is copied
/// literally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFormat {
    pub format: String,
    pub short_format: String,
}

impl Default for CodeFormat {
    fn default() -> Self {
        Self {
            format: "TYYYYNNN".to_string(),
            short_format: "NNT".to_string(),
        }
    }
}

impl CodeFormat {
    /// Either template references the ever-counter family (`U`).
    #[must_use]
    pub fn uses_ever(&self) -> bool {
        self.format.contains('U') || self.short_format.contains('U')
    }

    /// Either template references the per-year counter family (`X`).
    #[must_use]
    pub fn uses_year(&self) -> bool {
        self.format.contains('X') || self.short_format.contains('X')
    }

    /// Either template references the per-type-year counter family (`N`).
    #[must_use]
    pub fn uses_type_year(&self) -> bool {
        self.format.contains('N') || self.short_format.contains('N')
    }

    /// At least one counter family appears, so collisions are resolvable.
    #[must_use]
    pub fn has_counter(&self) -> bool {
        self.uses_ever() || self.uses_year() || self.uses_type_year()
    }
}

/// Lookup names substituted into type/species/entry-category tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeNames {
    pub animal_type: String,
    pub species: String,
    pub entry_category: String,
}

impl CodeNames {
    /// Builds the name set, cleaning each lookup value.
    #[must_use]
    pub fn new(animal_type: &str, species: &str, entry_category: &str) -> Self {
        Self {
            animal_type: clean_lookup(animal_type),
            species: clean_lookup(species),
            entry_category: clean_lookup(entry_category),
        }
    }
}

/// The three monotonically increasing counters a template may reference.
///
/// Seeded by the caller from the store's current maxima; each is only needed
/// when its token family appears in the template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeCounters {
    /// Next code across all time (trailing-year window).
    pub ever: i64,
    /// Next code for the intake year.
    pub year: i64,
    /// Next code for the animal type within the intake year.
    pub type_year: i64,
}

/// A generated code pair plus the counters that produced it.
///
/// The counters are persisted on the record so later renumbering passes can
/// continue the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    pub short_code: String,
    pub ever: i64,
    pub type_year: i64,
}

/// Strips whitespace and leading punctuation from a lookup name before its
/// first characters are substituted into a code.
#[must_use]
pub fn clean_lookup(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '(' | '[' | '{' | '.' | ',' | '!' | '"' | '\'' | '`'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn prefix(s: &str, len: usize) -> String {
    s.chars().take(len).collect()
}

/// Renders one template with the given counters and dates.
#[must_use]
pub fn render_template(
    template: &str,
    counters: CodeCounters,
    brought_in: NaiveDate,
    names: &CodeNames,
) -> String {
    let chars: Vec<char> = template.chars().collect();
    let matches_token = |at: usize, token: &str| {
        chars.len() - at >= token.len()
            && chars[at..at + token.len()].iter().copied().eq(token.chars())
    };

    let mut out = String::with_capacity(template.len());
    let mut x = 0;
    while x < chars.len() {
        if chars[x] == '\\' {
            x += 1;
            if let Some(c) = chars.get(x) {
                out.push(*c);
                x += 1;
            }
        } else if matches_token(x, "YYYY") {
            out.push_str(&format!("{:04}", brought_in.year()));
            x += 4;
        } else if matches_token(x, "YY") {
            out.push_str(&format!("{:02}", brought_in.year() - 2000));
            x += 2;
        } else if matches_token(x, "MM") {
            out.push_str(&format!("{:02}", brought_in.month()));
            x += 2;
        } else if matches_token(x, "DD") {
            out.push_str(&format!("{:02}", brought_in.day()));
            x += 2;
        } else if matches_token(x, "UUUUUUUUUU") {
            out.push_str(&format!("{:010}", counters.ever));
            x += 10;
        } else if matches_token(x, "UUUU") {
            out.push_str(&format!("{:04}", counters.ever));
            x += 4;
        } else if matches_token(x, "NNN") {
            out.push_str(&format!("{:03}", counters.type_year));
            x += 3;
        } else if matches_token(x, "NN") {
            out.push_str(&counters.type_year.to_string());
            x += 2;
        } else if matches_token(x, "XXX") {
            out.push_str(&format!("{:03}", counters.year));
            x += 3;
        } else if matches_token(x, "XX") {
            out.push_str(&counters.year.to_string());
            x += 2;
        } else if matches_token(x, "TT") {
            out.push_str(&prefix(&names.animal_type, 2));
            x += 2;
        } else if matches_token(x, "T") {
            out.push_str(&prefix(&names.animal_type, 1));
            x += 1;
        } else if matches_token(x, "SS") {
            out.push_str(&prefix(&names.species, 2));
            x += 2;
        } else if matches_token(x, "S") {
            out.push_str(&prefix(&names.species, 1));
            x += 1;
        } else if matches_token(x, "EE") {
            out.push_str(&prefix(&names.entry_category, 2));
            x += 2;
        } else if matches_token(x, "E") {
            out.push_str(&prefix(&names.entry_category, 1));
            x += 1;
        } else {
            out.push(chars[x]);
            x += 1;
        }
    }
    out
}

/// Generates a unique code pair for a new record.
///
/// `is_taken` is the store's uniqueness check for the primary code. On a
/// collision the counters the format references advance and rendering
/// retries; a collision with a counterless format is a configuration error
/// rather than a loop.
pub fn generate_code<E>(
    format: &CodeFormat,
    names: &CodeNames,
    brought_in: NaiveDate,
    mut counters: CodeCounters,
    mut is_taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<GeneratedCode, CodeError<E>> {
    loop {
        let code = render_template(&format.format, counters, brought_in, names);
        let short_code = render_template(&format.short_format, counters, brought_in, names);

        if !is_taken(&code).map_err(CodeError::Uniqueness)? {
            tracing::debug!(%code, %short_code, "generated code");
            return Ok(GeneratedCode {
                code,
                short_code,
                ever: counters.ever,
                type_year: counters.type_year,
            });
        }

        if !format.has_counter() {
            return Err(CodeError::FormatCannotResolve {
                format: format.format.clone(),
            });
        }

        if format.uses_ever() {
            counters.ever += 1;
        }
        if format.uses_type_year() {
            counters.type_year += 1;
        }
        if format.uses_year() {
            counters.year += 1;
        }
    }
}
