//! Text rendering for error messages.
//!
//! Build failures are reported as a breadcrumb trail followed by the
//! cause, and unknown identifiers come with "did you mean?" candidates.
//! Everything here is pure string work, shared by the container crates.

/// Separator placed between the hops of a rendered chain.
pub const CHAIN_SEPARATOR: &str = " => ";

/// Joins breadcrumbs, outermost first.
///
/// # Examples
/// ```
/// use autowire_support::rendering::render_chain;
///
/// let chain = vec!["'Newsletter'", "Mailer $mailer", "Logger $logger"];
/// assert_eq!(render_chain(&chain), "'Newsletter' => Mailer $mailer => Logger $logger");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    let mut rendered = String::new();
    for (position, crumb) in chain.iter().enumerate() {
        if position > 0 {
            rendered.push_str(CHAIN_SEPARATOR);
        }
        rendered.push_str(crumb.as_ref());
    }
    rendered
}

/// Turns a standalone message into a clause that can follow a colon:
/// first letter lower-cased, exactly one trailing period.
///
/// ```
/// use autowire_support::rendering::sentence;
///
/// assert_eq!(sentence("Class 'Foo' is not instantiable"), "class 'Foo' is not instantiable.");
/// assert_eq!(sentence("Already terminated."), "already terminated.");
/// ```
pub fn sentence(message: &str) -> String {
    let trimmed = message.trim().trim_end_matches('.');
    let mut chars = trimmed.chars();
    let mut result = String::with_capacity(trimmed.len() + 1);

    if let Some(first) = chars.next() {
        result.extend(first.to_lowercase());
        result.push_str(chars.as_str());
    }

    result.push('.');
    result
}

/// Drops module paths from a Rust type name, keeping generics readable.
///
/// ```
/// use autowire_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::mail::Mailer"), "Mailer");
/// assert_eq!(shorten_type_name("alloc::sync::Arc<dyn my_app::Logger>"), "Arc<dyn Logger>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut short = String::with_capacity(full_name.len());
    let mut start = 0;

    for (index, ch) in full_name.char_indices() {
        if matches!(ch, '<' | '>' | ',' | ' ' | '&' | '(' | ')' | '[' | ']' | ';') {
            short.push_str(last_segment(&full_name[start..index]));
            short.push(ch);
            start = index + ch.len_utf8();
        }
    }

    short.push_str(last_segment(&full_name[start..]));
    short
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Picks the known names closest to `requested`, best first.
///
/// A name qualifies when one contains the other (ignoring case) or when
/// their edit distance is small for the length of `requested`. Ties are
/// broken alphabetically. The requested name itself is never suggested.
///
/// ```
/// use autowire_support::rendering::suggest_similar;
///
/// let known = ["Mailer", "Logger", "Newsletter"];
/// assert_eq!(suggest_similar("Mailr", &known, 3), vec!["Mailer"]);
/// ```
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let wanted = requested.to_lowercase();
    let tolerance = (wanted.chars().count() / 3).max(2);

    let mut ranked: Vec<(usize, &str)> = available
        .iter()
        .copied()
        .filter_map(|name| {
            let candidate = name.to_lowercase();
            if candidate == wanted {
                return None;
            }

            let distance = edit_distance(&wanted, &candidate);
            let overlaps = candidate.contains(&wanted) || wanted.contains(&candidate);
            (distance <= tolerance || overlaps).then_some((distance, name))
        })
        .collect();

    ranked.sort_unstable();
    ranked.dedup_by(|a, b| a.1 == b.1);
    ranked
        .into_iter()
        .take(max_suggestions)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_of_one_has_no_separator() {
        assert_eq!(render_chain(&["'Mailer'"]), "'Mailer'");
        assert_eq!(render_chain(&Vec::<String>::new()), "");
    }

    #[test]
    fn sentence_normalises_punctuation_and_case() {
        assert_eq!(sentence("Boom"), "boom.");
        assert_eq!(sentence("Boom..."), "boom.");
        assert_eq!(sentence("  Spaced out  "), "spaced out.");
        assert_eq!(sentence(""), ".");
    }

    #[test]
    fn shorten_keeps_unqualified_names() {
        assert_eq!(shorten_type_name("String"), "String");
        assert_eq!(shorten_type_name("App\\Mailer"), "App\\Mailer");
    }

    #[test]
    fn shorten_nested_generics_and_references() {
        assert_eq!(
            shorten_type_name("core::option::Option<&alloc::vec::Vec<my_app::Job>>"),
            "Option<&Vec<Job>>"
        );
        assert_eq!(
            shorten_type_name("std::collections::HashMap<alloc::string::String, i64>"),
            "HashMap<String, i64>"
        );
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("mailer", "mailer"), 0);
        assert_eq!(edit_distance("mailr", "mailer"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn suggestions_rank_closest_first() {
        let available = ["App\\UserRepository", "App\\UserServices", "App\\UserService", "App\\Logger"];

        let suggestions = suggest_similar("App\\UserServise", &available, 2);
        assert_eq!(suggestions, vec!["App\\UserService", "App\\UserServices"]);
    }

    #[test]
    fn suggestions_include_containing_names() {
        let suggestions = suggest_similar("mailer", &["mailer", "mailer.queue", "cache"], 3);
        assert_eq!(suggestions, vec!["mailer.queue".to_string()]);
    }

    #[test]
    fn suggestions_respect_the_limit() {
        assert!(suggest_similar("XyzAbcDef", &["App\\Database"], 3).is_empty());
        assert!(suggest_similar("Mailr", &["Mailer"], 0).is_empty());
    }
}
