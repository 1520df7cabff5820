//! User-facing id templates and allocation.
//!
//! A template is printf-like: literal text around exactly one integer
//! conversion, such as `I%04d` or `F-%d-x`. Allocation walks a per-type
//! counter forward until it finds an id no object of that type carries.

use std::fmt;

use gendb_types::{GrampsId, ObjectType};

use crate::error::DbResult;

/// Widest numeric field a template may ask for.
pub const MAX_ID_WIDTH: usize = 32;

/// A parsed id template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdTemplate {
    prefix: String,
    suffix: String,
    width: usize,
    zero_pad: bool,
}

impl IdTemplate {
    /// Parse a template, or `None` if it has no single valid conversion.
    pub fn parse(template: &str) -> Option<Self> {
        let mut chars = template.char_indices().peekable();
        let mut prefix = String::new();
        while let Some((i, c)) = chars.next() {
            if c != '%' {
                prefix.push(c);
                continue;
            }
            if let Some((_, '%')) = chars.peek() {
                chars.next();
                prefix.push('%');
                continue;
            }
            let rest = &template[i + 1..];
            let (zero_pad, rest) = match rest.strip_prefix('0') {
                Some(r) => (true, r),
                None => (false, rest.strip_prefix(' ').unwrap_or(rest)),
            };
            let digits = rest.chars().take_while(char::is_ascii_digit).count();
            let width = if digits == 0 { 0 } else { rest[..digits].parse().ok()? };
            if width > MAX_ID_WIDTH {
                return None;
            }
            let rest = &rest[digits..];
            let mut conv = rest.chars();
            if !matches!(conv.next(), Some('d' | 'i' | 'u')) {
                return None;
            }
            let suffix = conv.as_str();
            if suffix.contains('%') && suffix.replace("%%", "").contains('%') {
                return None;
            }
            return Some(Self {
                prefix,
                suffix: suffix.replace("%%", "%"),
                width,
                zero_pad,
            });
        }
        None
    }

    /// The fallback template for a type: its letter and four zero-padded digits.
    pub fn fallback(object_type: ObjectType) -> Self {
        Self {
            prefix: object_type.id_letter().unwrap_or('X').to_string(),
            suffix: String::new(),
            width: 4,
            zero_pad: true,
        }
    }

    /// Validate a user-supplied template.
    ///
    /// A template without any `%` gets `%d` appended; an empty or malformed
    /// one is replaced by [`fallback`](Self::fallback).
    pub fn validated(template: &str, object_type: ObjectType) -> Self {
        if template.is_empty() {
            return Self::fallback(object_type);
        }
        if !template.contains('%') {
            return Self {
                prefix: template.to_string(),
                suffix: String::new(),
                width: 0,
                zero_pad: false,
            };
        }
        Self::parse(template).unwrap_or_else(|| Self::fallback(object_type))
    }

    /// Render `n` through this template.
    pub fn format(&self, n: u64) -> GrampsId {
        let number = if self.zero_pad {
            format!("{n:0width$}", width = self.width)
        } else {
            format!("{n:>width$}", width = self.width)
        };
        GrampsId::new(format!("{}{number}{}", self.prefix, self.suffix))
    }

    /// Rewrite an imported id into this template's width.
    ///
    /// Only ids made of this template's prefix followed by digits are
    /// changed (`I12` becomes `I0012` under `I%04d`); anything else is
    /// returned as given. Templates with a suffix never rewrite.
    pub fn normalize(&self, id: &str) -> GrampsId {
        if self.suffix.is_empty() && self.width > 0 {
            if let Some(digits) = id.strip_prefix(self.prefix.as_str()) {
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(n) = digits.parse::<u64>() {
                        return self.format(n);
                    }
                }
            }
        }
        GrampsId::new(id)
    }
}

impl fmt::Display for IdTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let escape = |s: &str| s.replace('%', "%%");
        write!(f, "{}%", escape(&self.prefix))?;
        if self.zero_pad {
            f.write_str("0")?;
        }
        if self.width > 0 {
            write!(f, "{}", self.width)?;
        }
        write!(f, "d{}", escape(&self.suffix))
    }
}

/// Per-type templates and counters.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    templates: Vec<IdTemplate>,
    cursors: [u64; 10],
    dirty: bool,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            templates: ObjectType::ALL.into_iter().map(IdTemplate::fallback).collect(),
            cursors: [0; 10],
            dirty: false,
        }
    }
}

impl IdAllocator {
    /// Template in use for a type.
    pub fn template(&self, object_type: ObjectType) -> &IdTemplate {
        &self.templates[object_type.index()]
    }

    pub fn set_template(&mut self, object_type: ObjectType, template: IdTemplate) {
        self.templates[object_type.index()] = template;
        self.dirty = true;
    }

    /// Next number allocation will try for a type.
    pub fn cursor(&self, object_type: ObjectType) -> u64 {
        self.cursors[object_type.index()]
    }

    pub fn set_cursor(&mut self, object_type: ObjectType, cursor: u64) {
        self.cursors[object_type.index()] = cursor;
        self.dirty = true;
    }

    /// Allocate the next free id.
    ///
    /// Starting at the type's counter, candidates are formatted until
    /// `in_use` reports one free. The counter is left one past the id
    /// returned, so ids are never handed out twice in a session even if the
    /// caller discards them.
    pub fn next_id<F>(&mut self, object_type: ObjectType, mut in_use: F) -> DbResult<GrampsId>
    where
        F: FnMut(&GrampsId) -> DbResult<bool>,
    {
        let i = object_type.index();
        let mut n = self.cursors[i];
        let mut id = self.templates[i].format(n);
        while in_use(&id)? {
            n += 1;
            id = self.templates[i].format(n);
        }
        self.cursors[i] = n + 1;
        self.dirty = true;
        Ok(id)
    }

    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
