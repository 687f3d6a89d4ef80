use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Handlebars keywords and literals that never name a row column.
const RESERVED: &[&str] = &["this", "else", "as", "true", "false", "null", "undefined"];

/// Built-in helpers whose first token is the helper, not a variable.
const HELPERS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "log", "raw", "eq", "ne", "gt", "gte", "lt", "lte",
    "and", "or", "not", "len",
];

fn mustache() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\{\{\{?~?(.*?)~?\}?\}\}").unwrap_or_else(|e| panic!("invalid regex: {e}"))
    })
}

/// Collect the top-level variable names a template refers to, without
/// evaluating it. Never fails: unrecognisable expressions are skipped.
pub fn extract_placeholder_names(template: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut block_params = BTreeSet::new();

    for cap in mustache().captures_iter(template) {
        let inner = cap.get(1).map_or("", |m| m.as_str()).trim();
        let Some(first) = inner.chars().next() else {
            continue;
        };
        let expression = match first {
            // comments, closers, partials, raw-block and inline-partial markers
            '!' | '/' | '>' | '{' | '*' => continue,
            '#' | '^' => inner[1..].trim_start(),
            _ => inner,
        };
        if expression.starts_with(['>', '*']) {
            continue;
        }

        // [segment literal] may contain spaces, so it cannot go through the tokenizer
        if let Some(rest) = expression.strip_prefix('[') {
            if let Some(end) = rest.find(']') {
                if rest[end + 1..].trim().is_empty() || rest[end + 1..].starts_with(['.', '/']) {
                    push_name(&expression[..end + 2], &mut names);
                    continue;
                }
            }
        }

        let expression = collect_block_params(expression, &mut block_params);
        let mut tokens = expression.split_whitespace().peekable();
        let Some(head) = tokens.next() else {
            continue;
        };
        let head = head.trim_start_matches('(');

        let is_call = tokens.peek().is_some() || HELPERS.contains(&head) || head == "else";
        if !is_call {
            push_name(head, &mut names);
            continue;
        }
        for token in tokens {
            // hash arguments: key=value, only the value can reference a column
            let token = token.split_once('=').map_or(token, |(_, v)| v);
            let token = token.trim_matches(|c| c == '(' || c == ')');
            if HELPERS.contains(&token) {
                continue;
            }
            push_name(token, &mut names);
        }
    }

    names.retain(|n| !block_params.contains(n));
    names
}

/// Strip an `as |a b|` clause, remembering the declared names.
fn collect_block_params<'a>(expression: &'a str, params: &mut BTreeSet<String>) -> &'a str {
    let Some(pos) = expression.find(" as |") else {
        return expression;
    };
    let declared = &expression[pos + 5..];
    let declared = declared.split('|').next().unwrap_or("");
    params.extend(declared.split_whitespace().map(String::from));
    &expression[..pos]
}

fn push_name(token: &str, names: &mut BTreeSet<String>) {
    if token.is_empty()
        || token.starts_with('"')
        || token.starts_with('\'')
        || token.starts_with('@')
        || token.starts_with("../")
        || token.starts_with(|c: char| c.is_ascii_digit() || c == '-')
    {
        return;
    }
    let token = token.strip_prefix("./").unwrap_or(token);

    let name = if let Some(rest) = token.strip_prefix('[') {
        rest.split(']').next().unwrap_or("")
    } else {
        token.split(['.', '/']).next().unwrap_or("")
    };

    if name.is_empty() || RESERVED.contains(&name) {
        return;
    }
    names.insert(name.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(template: &str) -> Vec<String> {
        extract_placeholder_names(template).into_iter().collect()
    }

    #[test]
    fn test_simple_variables() {
        assert_eq!(names("Hi {{name}}, from {{ city }}"), vec!["city", "name"]);
    }

    #[test]
    fn test_no_placeholders() {
        assert!(names("Plain subject line").is_empty());
    }

    #[test]
    fn test_deduplication() {
        assert_eq!(names("{{a}} {{a}} {{ a }}"), vec!["a"]);
    }

    #[test]
    fn test_triple_stash_and_whitespace_control() {
        assert_eq!(names("{{{html_part}}} {{~trimmed~}}"), vec!["html_part", "trimmed"]);
    }

    #[test]
    fn test_block_helpers() {
        assert_eq!(
            names("{{#if vip}}Dear {{name}}{{else}}Hi{{/if}}"),
            vec!["name", "vip"]
        );
        assert_eq!(names("{{#unless opted_out}}x{{/unless}}"), vec!["opted_out"]);
    }

    #[test]
    fn test_each_with_this_and_block_params() {
        assert_eq!(names("{{#each items}}{{this}} {{@index}}{{/each}}"), vec!["items"]);
        assert_eq!(
            names("{{#each orders as |order|}}{{order.id}}{{/each}}"),
            vec!["orders"]
        );
    }

    #[test]
    fn test_comments_and_partials_ignored() {
        assert!(names("{{! a comment with {{name}} }}{{> footer}}").is_empty());
        assert!(names("{{!-- long comment --}}").is_empty());
    }

    #[test]
    fn test_helper_arguments() {
        assert_eq!(names("{{lookup prices product}}"), vec!["prices", "product"]);
        assert_eq!(names("{{#if (eq status \"paid\")}}ok{{/if}}"), vec!["status"]);
    }

    #[test]
    fn test_dotted_path_uses_first_segment() {
        assert_eq!(names("{{customer.first_name}}"), vec!["customer"]);
    }

    #[test]
    fn test_segment_literal_with_spaces() {
        assert_eq!(names("{{[first name]}}"), vec!["first name"]);
    }

    #[test]
    fn test_literals_ignored() {
        assert!(names("{{#if true}}{{/if}}{{log \"x\" 3}}").is_empty());
    }

    #[test]
    fn test_unclosed_braces_do_not_fail() {
        assert_eq!(names("Hello {{name"), Vec::<String>::new());
    }
}
