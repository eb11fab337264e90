//! Host helper primitives.
//!
//! Runtime support modules bind these into a context with
//! `native soy.$$name = builtin`; generated templates reach them through
//! print directives (`{$x|truncate:10}` resolves `soy.$$truncate`).

use percent_encoding::{AsciiSet, CONTROLS, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;

/// Everything but the RFC 3986 unreserved characters.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Characters never legal in a URI; reserved delimiters and `%` are kept.
const URI_ILLEGAL: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A helper primitive: receives the printed value and directive arguments.
pub type NativeFn = fn(&Value, &[Value]) -> Result<Value, String>;

const BUILTINS: &[(&str, NativeFn)] = &[
    // string
    ("truncate", truncate),
    ("changeNewlineToBr", change_newline_to_br),
    ("insertWordBreaks", insert_word_breaks),
    // html
    ("escapeHtml", escape_html),
    ("escapeHtmlAttribute", escape_html_attribute),
    ("noAutoescape", no_autoescape),
    ("filterNormalizeUri", filter_normalize_uri),
    ("escapeUri", escape_uri),
    // array
    ("join", join),
    ("length", length),
    // i18n
    ("formatNum", format_num),
    ("bidiMark", bidi_mark),
];

/// Find a builtin by the name used in `native` statements.
pub fn lookup(name: &str) -> Option<NativeFn> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, f)| *f)
}

/// String form of a value as printed by a template.
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn int_arg(args: &[Value], index: usize, directive: &str) -> Result<Option<usize>, String> {
    match args.get(index) {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| format!("|{directive} expects a non-negative integer")),
        Some(other) => Err(format!("|{directive} expects an integer, got {other}")),
    }
}

fn truncate(value: &Value, args: &[Value]) -> Result<Value, String> {
    let max = int_arg(args, 0, "truncate")?.ok_or("|truncate needs a maximum length")?;
    let ellipsis = !matches!(args.get(1), Some(Value::Bool(false)));

    let text = to_display(value);
    if text.chars().count() <= max {
        return Ok(Value::String(text));
    }
    let truncated = if ellipsis && max > 3 {
        let kept: String = text.chars().take(max - 3).collect();
        format!("{kept}...")
    } else {
        text.chars().take(max).collect()
    };
    Ok(Value::String(truncated))
}

fn change_newline_to_br(value: &Value, _: &[Value]) -> Result<Value, String> {
    let text = to_display(value).replace("\r\n", "<br>").replace(['\r', '\n'], "<br>");
    Ok(Value::String(text))
}

fn insert_word_breaks(value: &Value, args: &[Value]) -> Result<Value, String> {
    let limit = int_arg(args, 0, "insertWordBreaks")?.ok_or("|insertWordBreaks needs a length")?;
    if limit == 0 {
        return Err("|insertWordBreaks length must be positive".into());
    }

    let mut out = String::new();
    let mut run = 0;
    for c in to_display(value).chars() {
        if c.is_whitespace() || c == '<' || c == '>' {
            run = 0;
        } else {
            if run == limit {
                out.push_str("<wbr>");
                run = 0;
            }
            run += 1;
        }
        out.push(c);
    }
    Ok(Value::String(out))
}

pub(crate) fn escape_html_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_html(value: &Value, _: &[Value]) -> Result<Value, String> {
    Ok(Value::String(escape_html_str(&to_display(value))))
}

fn escape_html_attribute(value: &Value, _: &[Value]) -> Result<Value, String> {
    let escaped = escape_html_str(&to_display(value))
        .replace('`', "&#96;")
        .replace('=', "&#61;");
    Ok(Value::String(escaped))
}

fn no_autoescape(value: &Value, _: &[Value]) -> Result<Value, String> {
    Ok(value.clone())
}

fn filter_normalize_uri(value: &Value, _: &[Value]) -> Result<Value, String> {
    let text = to_display(value);
    let scheme = text
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .filter(|scheme| !scheme.contains(['/', '?', '#']));
    let allowed = match scheme.as_deref() {
        None => true,
        Some(s) => matches!(s, "http" | "https" | "mailto"),
    };
    if allowed {
        Ok(Value::String(utf8_percent_encode(&text, URI_ILLEGAL).to_string()))
    } else {
        Ok(Value::String("#zSoyz".into()))
    }
}

fn escape_uri(value: &Value, _: &[Value]) -> Result<Value, String> {
    let text = to_display(value);
    Ok(Value::String(utf8_percent_encode(&text, URI_COMPONENT).to_string()))
}

fn join(value: &Value, args: &[Value]) -> Result<Value, String> {
    let separator = args.first().map(to_display).unwrap_or_else(|| ",".into());
    match value {
        Value::Array(items) => Ok(Value::String(
            items.iter().map(to_display).collect::<Vec<_>>().join(&separator),
        )),
        other => Err(format!("|join expects a list, got {other}")),
    }
}

fn length(value: &Value, _: &[Value]) -> Result<Value, String> {
    match value {
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        other => Err(format!("|length expects a list, got {other}")),
    }
}

fn format_num(value: &Value, _: &[Value]) -> Result<Value, String> {
    let Value::Number(n) = value else {
        return Ok(value.clone());
    };
    let text = n.to_string();
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let formatted = match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    };
    Ok(Value::String(formatted))
}

fn bidi_mark(_: &Value, _: &[Value]) -> Result<Value, String> {
    Ok(Value::String("\u{200E}".into()))
}
