//! Runtime support modules, executed once per context before any template.

/// `(name, source)` in execution order.
pub const SUPPORT_MODULES: &[(&str, &str)] = &[
    ("soyutils/base", BASE),
    ("soyutils/string", STRING),
    ("soyutils/html", HTML),
    ("soyutils/array", ARRAY),
    ("soyutils/i18n", I18N),
];

const BASE: &str = r#"
provide goog
provide soy
provide soydata
set soy.$$VERSION = "soyloader"
"#;

const STRING: &str = r#"
require soy
native soy.$$truncate = truncate
native soy.$$changeNewlineToBr = changeNewlineToBr
native soy.$$insertWordBreaks = insertWordBreaks
"#;

const HTML: &str = r#"
require soy
native soy.$$escapeHtml = escapeHtml
native soy.$$escapeHtmlAttribute = escapeHtmlAttribute
native soy.$$noAutoescape = noAutoescape
native soy.$$filterNormalizeUri = filterNormalizeUri
native soy.$$escapeUri = escapeUri
"#;

const ARRAY: &str = r#"
require soy
native soy.$$join = join
native soy.$$length = length
"#;

const I18N: &str = r#"
require soy
native soy.$$formatNum = formatNum
native soy.$$bidiMark = bidiMark
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::module::{Statement, parse};
    use crate::sandbox::natives;

    #[test]
    fn test_support_modules_parse_and_bind_known_builtins() {
        for (name, source) in SUPPORT_MODULES {
            let statements = parse(source).unwrap_or_else(|e| panic!("{name}: {e}"));
            for statement in statements {
                if let Statement::Native { builtin, .. } = statement {
                    assert!(natives::lookup(&builtin).is_some(), "{name}: {builtin}");
                }
            }
        }
    }
}
