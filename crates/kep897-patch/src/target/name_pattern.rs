//! Translation of shell-style name patterns into [`glob::Pattern`] syntax.
//!
//! Target names follow the pattern syntax of Go's `filepath.Match`:
//!
//! - `*` matches any run of characters except `/`, repeated stars act as one
//! - `?` matches one character except `/`
//! - `[...]` matches one character of a class, `[^...]` negates the class
//! - `\` escapes the following character, both inside and outside classes
//!
//! The `glob` crate negates with `[!...]`, has no escape character and rejects
//! `**` outside of whole path components, so patterns are rewritten before
//! being compiled. Classes are emitted in a normalized form, because `glob`
//! only accepts `]` as the first member and reads `!` at that position as a
//! negation.
//!
//! Patterns `filepath.Match` rejects as malformed are rejected here as well.
use std::{iter::Peekable, ops::RangeInclusive, str::Chars};

/// Characters with a special meaning in `glob` class members.
const CLASS_SPECIAL: [char; 3] = [']', '-', '!'];

/// Rewrites `pattern` into an equivalent `glob` pattern.
///
/// Returns [`None`] if the pattern is malformed or can never match anything.
pub(super) fn to_glob(pattern: &str) -> Option<String> {
    let mut chars = pattern.chars().peekable();
    let mut glob = String::with_capacity(pattern.len());

    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                while chars.next_if_eq(&'*').is_some() {}
                glob.push('*');
            }
            '?' => glob.push('?'),
            '\\' => push_literal(&mut glob, chars.next()?),
            '[' => {
                let class = Class::parse(&mut chars)?;
                class.push_glob(&mut glob)?;
            }
            literal => push_literal(&mut glob, literal),
        }
    }

    Some(glob)
}

fn push_literal(glob: &mut String, ch: char) {
    if matches!(ch, '*' | '?' | '[') {
        glob.extend(['[', ch, ']']);
    } else {
        glob.push(ch);
    }
}

/// A parsed `[...]` character class.
#[derive(Debug)]
struct Class {
    negated: bool,
    ranges: Vec<RangeInclusive<char>>,
}

impl Class {
    /// Parses a class, with the opening `[` already consumed.
    fn parse(chars: &mut Peekable<Chars<'_>>) -> Option<Self> {
        let negated = chars.next_if_eq(&'^').is_some();
        let mut ranges = Vec::new();

        loop {
            if !ranges.is_empty() && chars.next_if_eq(&']').is_some() {
                break;
            }

            let low = class_member(chars)?;
            let high = match chars.next_if_eq(&'-') {
                Some(_) => class_member(chars)?,
                None => low,
            };
            ranges.push(low..=high);
        }

        Some(Self { negated, ranges })
    }

    /// Appends the class in `glob` syntax. Returns [`None`] if the class can
    /// never match.
    fn push_glob(&self, glob: &mut String) -> Option<()> {
        let mut ranges: Vec<RangeInclusive<char>> =
            self.ranges.iter().filter(|range| !range.is_empty()).cloned().collect();
        let [bracket, dash, bang] = CLASS_SPECIAL.map(|special| {
            let contained = ranges.iter().any(|range| range.contains(&special));
            ranges = ranges
                .drain(..)
                .flat_map(|range| split_off(range, special))
                .collect();
            contained
        });

        if ranges.is_empty() && !bracket && !dash {
            match (self.negated, bang) {
                // Inverted ranges only, matching nothing
                (false, false) => return None,
                (true, false) => {
                    glob.push('?');
                    return Some(());
                }
                (false, true) => {
                    glob.push('!');
                    return Some(());
                }
                (true, true) => {}
            }
        }

        glob.push('[');
        if self.negated {
            glob.push('!');
        }
        if bracket {
            glob.push(']');
        }
        for range in &ranges {
            glob.extend([*range.start(), '-', *range.end()]);
        }
        // A leading `!` would negate the class
        let leading = !self.negated && !bracket && ranges.is_empty();
        match (bang, dash, leading) {
            (true, true, true) => glob.push_str("-!"),
            (true, true, false) => glob.push_str("!-"),
            (true, false, _) => glob.push('!'),
            (false, true, _) => glob.push('-'),
            (false, false, _) => {}
        }
        glob.push(']');

        Some(())
    }
}

/// Reads a single, possibly escaped, class member.
fn class_member(chars: &mut Peekable<Chars<'_>>) -> Option<char> {
    match chars.next()? {
        '-' | ']' => None,
        '\\' => chars.next(),
        ch => Some(ch),
    }
}

/// Removes `special` from `range`, leaving up to two ranges.
fn split_off(range: RangeInclusive<char>, special: char) -> Vec<RangeInclusive<char>> {
    if !range.contains(&special) {
        return vec![range];
    }

    // The specials are ASCII, so their neighbours are valid chars
    let before = char::from_u32(u32::from(special) - 1);
    let after = char::from_u32(u32::from(special) + 1);

    [
        before.map(|before| *range.start()..=before),
        after.map(|after| after..=*range.end()),
    ]
    .into_iter()
    .flatten()
    .filter(|range| !range.is_empty())
    .collect()
}
