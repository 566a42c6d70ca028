//! Search filter resolution
//!
//! Filter templates are normalized at load time; here only the per-request
//! placeholders are filled in. Every value is escaped before it is inserted,
//! and substitution is a single pass over the template so inserted text is
//! never scanned for placeholders again.

use crate::ldap::types::UserProfile;
use ldap3::ldap_escape;
use std::borrow::Cow;
use warden_core::config::{PLACEHOLDER_DN, PLACEHOLDER_INPUT, PLACEHOLDER_USERNAME};

/// Escape raw user input for use inside a filter.
///
/// Each character gets RFC 4515 escaping (`\`, `*`, `(`, `)` and NUL become
/// `\xx`) or, when listed in `special`, a backslash prefix. Both are decided
/// on the input character, so hex escapes are never rewritten.
pub fn escape_input(input: &str, special: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut buf = [0u8; 4];

    for c in input.chars() {
        match ldap_escape(&*c.encode_utf8(&mut buf)) {
            Cow::Owned(escaped) => out.push_str(&escaped),
            Cow::Borrowed(_) if special.contains(c) => {
                out.push('\\');
                out.push(c);
            }
            Cow::Borrowed(plain) => out.push_str(plain),
        }
    }
    out
}

pub fn resolve_users_filter(template: &str, input: &str, special: &str) -> String {
    let input = escape_input(input, special);
    substitute(template, &[(PLACEHOLDER_INPUT, input.as_str())])
}

/// `{username}` and `{dn}` are only filled in when a profile is known.
pub fn resolve_groups_filter(
    template: &str,
    input: &str,
    profile: Option<&UserProfile>,
    special: &str,
) -> String {
    let input = escape_input(input, special);

    match profile {
        Some(profile) => {
            let username = ldap_escape(profile.username.as_str());
            let dn = ldap_escape(profile.dn.as_str());
            substitute(
                template,
                &[
                    (PLACEHOLDER_INPUT, input.as_str()),
                    (PLACEHOLDER_USERNAME, &*username),
                    (PLACEHOLDER_DN, &*dn),
                ],
            )
        }
        None => substitute(template, &[(PLACEHOLDER_INPUT, input.as_str())]),
    }
}

fn substitute(template: &str, replacements: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    'scan: while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        for (placeholder, value) in replacements {
            if let Some(tail) = rest.strip_prefix(placeholder) {
                out.push_str(value);
                rest = tail;
                continue 'scan;
            }
        }

        out.push('{');
        rest = &rest[1..];
    }

    out.push_str(rest);
    out
}
