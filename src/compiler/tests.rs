//! Compiler integration tests.
//!
//! The external compiler is replaced by a small `sh` script that copies each
//! input file to its `--outputPathFormat` location, substituting `@LOCALE@`,
//! and appends one `run <files...>` line per invocation to a log.

#![cfg(unix)]

use super::*;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

use crate::watch::PassOutcome;

const FAKE_COMPILER: &str = r#"
log="$1"; shift
format=""; locales=""; files=""
while [ $# -gt 0 ]; do
  case "$1" in
    --outputPathFormat) format="$2"; shift 2 ;;
    --locales) locales="$2"; shift 2 ;;
    --pluginModules|--cssHandlingScheme|--messageFilePathFormat|--protoFileDescriptors) shift 2 ;;
    --*) shift ;;
    *) files="$files $1"; shift ;;
  esac
done
echo "run$files" >> "$log"
for f in $files; do
  case "$f" in *bad*) echo "parse error in $f" >&2; exit 1 ;; esac
done
[ -z "$locales" ] && locales="-"
for f in $files; do
  dir=$(dirname "$f"); name=$(basename "$f")
  [ "$dir" = "." ] && dir=""
  for loc in $(echo "$locales" | tr ',' ' '); do
    l="$loc"; [ "$l" = "-" ] && l=""
    out=$(printf '%s' "$format" | sed -e "s|{LOCALE}|$l|g" -e "s|{INPUT_DIRECTORY}|$dir|g" -e "s|{INPUT_FILE_NAME}|$name|g")
    mkdir -p "$(dirname "$out")"
    sed "s|@LOCALE@|$l|g" "$f" > "$out"
  done
done
"#;

const LETTERS: &str = r#"
provide mail.letters
require soy
template mail.letters.hello kind="text"
  Hello {$name}
end
template mail.letters.localized kind="text"
  Hello {$name} (@LOCALE@)
end
"#;

const NOTES: &str = r#"
provide mail.notes
require soy
template mail.notes.short
  <b>{$text}</b>
end
"#;

/// Scratch layout: `src/` sources, `out/` output, fake compiler and its log.
struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/mail")).unwrap();
        std::fs::write(dir.path().join("soyc.sh"), FAKE_COMPILER).unwrap();
        let env = Self { dir };
        env.write("mail/letters.soy", LETTERS);
        env.write("notes.soy", NOTES);
        env
    }

    fn src(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn write(&self, name: &str, text: &str) {
        std::fs::write(self.src().join(name), text).unwrap();
    }

    fn options(&self) -> CompileOptions {
        CompileOptions {
            input_dir: self.src(),
            output_dir: Some(self.out()),
            unique_dir: false,
            compiler_program: Some(vec![
                "sh".into(),
                self.dir.path().join("soyc.sh").to_string_lossy().into_owned(),
                self.dir.path().join("soyc.log").to_string_lossy().into_owned(),
            ]),
            debounce_ms: 10,
            ..Default::default()
        }
    }

    /// Compiler invocations so far.
    fn runs(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("soyc.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn hello(compiler: &Compiler, locale: Option<&str>) -> Result<String> {
    compiler.render("mail.letters.hello", &json!({"name": "World"}), &Value::Null, locale)
}

#[tokio::test]
async fn test_compile_and_render() {
    let env = Env::new();
    let compiler = Compiler::new(env.options());
    compiler.compile_templates(&env.src()).await.unwrap();

    assert_eq!(env.runs(), vec!["run mail/letters.soy notes.soy"]);
    assert!(env.out().join("mail/letters.soy.js").is_file());
    assert_eq!(hello(&compiler, None).unwrap(), "Hello World");
    assert_eq!(
        compiler
            .render("mail.notes.short", &json!({"text": "<hi>"}), &Value::Null, None)
            .unwrap(),
        "<b>&lt;hi&gt;</b>"
    );
    assert_eq!(compiler.output_root(), Some(env.out()));
}

#[tokio::test]
async fn test_compile_multiple_locales() {
    let env = Env::new();
    let compiler = Compiler::new(CompileOptions {
        locales: vec!["en".into(), "pt-BR".into()],
        ..env.options()
    });
    compiler.compile_templates(&env.src()).await.unwrap();

    assert!(env.out().join("en/mail/letters.soy.js").is_file());
    assert!(env.out().join("pt-BR/mail/letters.soy.js").is_file());

    let data = json!({"name": "Ana"});
    let render = |locale| {
        compiler.render("mail.letters.localized", &data, &Value::Null, Some(locale))
    };
    assert_eq!(render("en").unwrap(), "Hello Ana (en)");
    assert_eq!(render("pt-BR").unwrap(), "Hello Ana (pt-BR)");

    // No default context when locales are configured.
    assert!(matches!(
        hello(&compiler, None).unwrap_err(),
        Error::UnknownTemplate { .. }
    ));
}

#[tokio::test]
async fn test_precompiled_output_is_reused() {
    let env = Env::new();
    let options = CompileOptions {
        precompiled_dir: Some(env.out()),
        ..env.options()
    };

    Compiler::new(options.clone())
        .compile_templates(&env.src())
        .await
        .unwrap();
    let compiler = Compiler::new(options);
    compiler.compile_templates(&env.src()).await.unwrap();

    assert_eq!(env.runs().len(), 1);
    assert_eq!(hello(&compiler, None).unwrap(), "Hello World");
}

#[tokio::test]
async fn test_precompiled_artifacts_are_copied() {
    let env = Env::new();
    let prebuilt = env.dir.path().join("prebuilt");
    Compiler::new(CompileOptions {
        output_dir: Some(prebuilt.clone()),
        ..env.options()
    })
    .compile_templates(&env.src())
    .await
    .unwrap();

    // Only the new file needs compiling.
    env.write("fresh.soy", "provide fresh\n");
    let compiler = Compiler::new(CompileOptions {
        precompiled_dir: Some(prebuilt),
        ..env.options()
    });
    compiler.compile_templates(&env.src()).await.unwrap();

    assert_eq!(env.runs().last().unwrap(), "run fresh.soy");
    assert!(env.out().join("notes.soy.js").is_file());
    assert_eq!(hello(&compiler, None).unwrap(), "Hello World");
}

#[tokio::test]
async fn test_compiler_failure_carries_stderr() {
    let env = Env::new();
    env.write("bad.soy", "{template}");
    let compiler = Compiler::new(env.options());

    let err = compiler.compile_templates(&env.src()).await.unwrap_err();
    assert!(err.is_compile_failure());
    match err {
        Error::CompileProcess { program, stderr, .. } => {
            assert_eq!(program, "sh");
            assert!(stderr.contains("parse error in bad.soy"), "{stderr}");
        }
        other => panic!("unexpected error: {other}"),
    }
    // Nothing was loaded.
    assert!(compiler.with_context(None, |_| ()).is_none());
}

#[tokio::test]
async fn test_missing_compiler_is_spawn_error() {
    let env = Env::new();
    let compiler = Compiler::new(CompileOptions {
        compiler_program: Some(vec!["/no/such/soyloader-compiler".into()]),
        ..env.options()
    });

    let err = compiler.compile_templates(&env.src()).await.unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }), "{err}");
}

#[tokio::test]
async fn test_concat_output_per_locale() {
    let env = Env::new();
    let compiler = Compiler::new(CompileOptions {
        locales: vec!["en".into(), "de".into()],
        concat_output: true,
        concat_file_name: "bundle".into(),
        ..env.options()
    });
    compiler.compile_templates(&env.src()).await.unwrap();

    let bundle = std::fs::read_to_string(env.out().join("bundle_de.soy.concat.js")).unwrap();
    assert!(bundle.contains("provide mail.letters"));
    assert!(bundle.contains("provide mail.notes"));
    assert!(bundle.contains("(de)"));
    assert!(env.out().join("bundle_en.soy.concat.js").is_file());
}

#[tokio::test]
async fn test_loading_disabled() {
    let env = Env::new();
    let compiler = Compiler::new(CompileOptions {
        load_compiled_templates: false,
        ..env.options()
    });
    compiler.compile_templates(&env.src()).await.unwrap();

    assert!(env.out().join("notes.soy.js").is_file());
    assert!(compiler.with_context(None, |_| ()).is_none());
    assert!(matches!(
        hello(&compiler, None).unwrap_err(),
        Error::Config(ConfigError::LoadingDisabled)
    ));
    assert!(matches!(
        compiler.get_template_fn("mail.letters.hello", None).unwrap_err(),
        Error::Config(ConfigError::LoadingDisabled)
    ));
}

#[tokio::test]
async fn test_unique_dir_removed_on_cleanup() {
    let env = Env::new();
    let compiler = Compiler::new(CompileOptions {
        unique_dir: true,
        erase_temporary_files: true,
        ..env.options()
    });
    compiler.compile_templates(&env.src()).await.unwrap();

    let root = compiler.output_root().unwrap();
    assert_eq!(root.parent(), Some(env.out().as_path()));
    assert!(root.join("notes.soy.js").is_file());

    compiler.cleanup().await.unwrap();
    assert!(!root.exists());
    assert!(compiler.output_root().is_none());
    // Loaded templates outlive the files.
    assert_eq!(hello(&compiler, None).unwrap(), "Hello World");
}

#[tokio::test]
async fn test_cleanup_keeps_fixed_output_dir() {
    let env = Env::new();
    let compiler = Compiler::new(CompileOptions {
        erase_temporary_files: true,
        ..env.options()
    });
    compiler.compile_templates(&env.src()).await.unwrap();
    compiler.cleanup().await.unwrap();
    assert!(env.out().join("notes.soy.js").is_file());
}

#[test]
fn test_set_options_rejects_invalid_merge() {
    let compiler = Compiler::new(CompileOptions::default());
    let err = compiler
        .set_options(OptionsPatch {
            should_provide_require_js_functions: Some(true),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Validation(_))));
    assert!(!compiler.options().should_provide_require_js_functions);

    compiler
        .set_options(OptionsPatch {
            locales: Some(vec!["en".into()]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(compiler.options().locales, vec!["en".to_string()]);
}

#[tokio::test]
async fn test_file_outside_input_dir_rejected() {
    let env = Env::new();
    let compiler = Compiler::new(env.options());
    let err = compiler
        .compile_template_files(&env.src(), &[PathBuf::from("/elsewhere/x.soy")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Validation(_))));
    assert!(env.runs().is_empty());
}

#[tokio::test]
async fn test_context_paths_are_support_modules() {
    let env = Env::new();
    let helpers = env.dir.path().join("helpers.js");
    std::fs::write(&helpers, "provide app.helpers\n").unwrap();
    env.write("uses_helpers.soy", "require app.helpers\nprovide app.page\n");

    let err = Compiler::new(env.options())
        .compile_templates(&env.src())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("could not find: app.helpers"), "{err}");

    let compiler = Compiler::new(CompileOptions {
        context_paths: vec![helpers],
        ..env.options()
    });
    compiler.compile_templates(&env.src()).await.unwrap();
    assert_eq!(hello(&compiler, None).unwrap(), "Hello World");
}

#[tokio::test]
async fn test_watch_recompiles_changed_file() {
    let env = Env::new();
    let compiler = Compiler::new(CompileOptions {
        allow_dynamic_recompile: true,
        ..env.options()
    });
    let mut events = compiler.subscribe();
    compiler.compile_templates(&env.src()).await.unwrap();
    assert_eq!(hello(&compiler, None).unwrap(), "Hello World");

    env.write("mail/letters.soy", &LETTERS.replace("Hello {$name}\n", "Goodbye {$name}\n"));

    let outcome: PassOutcome = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("watch pass in time")
        .unwrap();
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(
        outcome.files,
        vec![crate::utils::path::normalize_path(&env.src().join("mail/letters.soy"))]
    );

    let runs = env.runs();
    assert_eq!(runs[0], "run mail/letters.soy notes.soy");
    assert_eq!(runs[1], "run mail/letters.soy");
    assert_eq!(hello(&compiler, None).unwrap(), "Goodbye World");
    // Unchanged templates were reloaded too.
    assert!(compiler.get_template_fn("mail.notes.short", None).is_ok());

    compiler.cleanup().await.unwrap();
}

async fn next_pass(events: &mut tokio::sync::broadcast::Receiver<PassOutcome>) -> PassOutcome {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("watch pass in time")
        .unwrap()
}

#[tokio::test]
async fn test_watch_keeps_each_compile_call_separate() {
    let env = Env::new();
    let other = env.dir.path().join("other");
    std::fs::create_dir_all(&other).unwrap();
    std::fs::write(
        other.join("other.soy"),
        "provide other\nrequire soy\ntemplate other.hi kind=\"text\"\n  Hi {$name}\nend\n",
    )
    .unwrap();

    let compiler = Compiler::new(CompileOptions {
        allow_dynamic_recompile: true,
        unique_dir: true,
        ..env.options()
    });
    let mut events = compiler.subscribe();
    compiler.compile_templates(&env.src()).await.unwrap();
    let first_root = compiler.output_root().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    compiler.compile_templates(&other).await.unwrap();
    assert_ne!(compiler.output_root().unwrap(), first_root);

    // A file of the first call recompiles against its own dir and root.
    env.write("mail/letters.soy", &LETTERS.replace("Hello {$name}\n", "Goodbye {$name}\n"));
    let outcome = next_pass(&mut events).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(env.runs().last().unwrap(), "run mail/letters.soy");
    assert_eq!(hello(&compiler, None).unwrap(), "Goodbye World");
    assert!(
        std::fs::read_to_string(first_root.join("mail/letters.soy.js"))
            .unwrap()
            .contains("Goodbye")
    );

    // A file of the second call only reloads the second call's files.
    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::write(
        other.join("other.soy"),
        "provide other\nrequire soy\ntemplate other.hi kind=\"text\"\n  Hey {$name}\nend\n",
    )
    .unwrap();
    let outcome = next_pass(&mut events).await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(env.runs().last().unwrap(), "run other.soy");
    assert_eq!(
        compiler
            .render("other.hi", &json!({"name": "Ana"}), &Value::Null, None)
            .unwrap(),
        "Hey Ana"
    );

    compiler.cleanup().await.unwrap();
}

const FORMLETTER_EN: &str = r#"
provide examples.formletter
require soy
template examples.formletter.letter kind="text"
  Dear {$title} {$surname}: With the amount of junk mail you receive,
  I'm sure you'll appreciate this!
end
"#;

const FORMLETTER_PT_BR: &str = r#"
provide examples.formletter
require soy
template examples.formletter.letter kind="text"
  Querido {$title} {$surname}: Com a quantidade de lixo eletrônico que você recebe,
  tenho certeza de que vai gostar disso!
end
"#;

#[tokio::test]
async fn test_load_precompiled_templates_explicitly() {
    let dir = TempDir::new().unwrap();
    for (locale, text) in [("en", FORMLETTER_EN), ("pt-BR", FORMLETTER_PT_BR)] {
        let locale_dir = dir.path().join(locale).join("examples");
        std::fs::create_dir_all(&locale_dir).unwrap();
        std::fs::write(locale_dir.join("formletter.soy.js"), text).unwrap();
    }

    let compiler = Compiler::new(CompileOptions::default());
    compiler
        .load_compiled_templates(&dir.path().join("en"), Some("en"))
        .await
        .unwrap();
    compiler
        .load_compiled_templates(&dir.path().join("pt-BR"), Some("pt-BR"))
        .await
        .unwrap();

    let data = json!({"title": "Mr.", "surname": "Pupius"});
    let letter = |locale| {
        compiler
            .get_template_fn("examples.formletter.letter", Some(locale))
            .unwrap()
    };
    let en = letter("en");
    let rendered = compiler
        .with_context(Some("en"), |context| en.call(context, &data, &Value::Null))
        .unwrap()
        .unwrap();
    assert_eq!(
        rendered.to_string(),
        "Dear Mr. Pupius: With the amount of junk mail you receive, I'm sure you'll appreciate this!"
    );
    assert_eq!(
        compiler
            .render("examples.formletter.letter", &data, &Value::Null, Some("pt-BR"))
            .unwrap(),
        "Querido Mr. Pupius: Com a quantidade de lixo eletrônico que você recebe, \
         tenho certeza de que vai gostar disso!"
    );
    assert_eq!(letter("pt-BR").name(), "examples.formletter.letter");
}

#[tokio::test]
async fn test_load_missing_file_fails() {
    let compiler = Compiler::new(CompileOptions::default());
    let err = compiler
        .load_compiled_template_files(&[PathBuf::from("/no/such/a.soy.js")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Load { .. }), "{err}");
}

#[test]
fn test_render_without_context() {
    let compiler = Compiler::new(CompileOptions::default());
    match hello(&compiler, Some("fr")).unwrap_err() {
        Error::UnknownTemplate { name, reason } => {
            assert_eq!(name, "mail.letters.hello");
            assert!(reason.contains("locale `fr`"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_replace_context() {
    let compiler = Compiler::new(CompileOptions::default());
    let mut context = SandboxContext::new(Some("fr".into()));
    context
        .load_sources(&[ModuleSource::new("letters.soy.js", LETTERS)])
        .unwrap();

    assert!(compiler.replace_context(context).is_none());
    assert_eq!(hello(&compiler, Some("fr")).unwrap(), "Hello World");
    assert_eq!(
        compiler.with_context(Some("fr"), |c| c.locale().map(str::to_string)),
        Some(Some("fr".to_string()))
    );

    let replaced = compiler.replace_context(SandboxContext::new(Some("fr".into())));
    assert!(replaced.is_some_and(|c| c.is_initialized()));
    assert!(hello(&compiler, Some("fr")).is_err());
}
