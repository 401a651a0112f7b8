use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::info;

/// Errors from configuration handling (language list, credentials).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("languages '{0}' and '{1}' both map to slug '{2}'")]
    DuplicateSlug(String, String, String),

    #[error("access token not provided. Pass --token or set GITHUB_TOKEN.")]
    TokenMissing,

    #[error("failed to read access token from file '{path}': {source}")]
    TokenRead {
        path: String,
        source: std::io::Error,
    },

    #[error("access token is empty")]
    TokenEmpty,
}

/// A configured language: the name used in the search query, the canonical
/// display name, and the filesystem-safe slug derived from the display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub api_name: String,
    pub name: String,
    pub slug: String,
}

impl Language {
    pub fn new(api_name: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let slug = slugify(&name);
        Self {
            api_name: api_name.into(),
            name,
            slug,
        }
    }
}

/// Derives a filesystem-safe slug from a canonical language name.
///
/// Lowercase, with runs of non-alphanumeric characters collapsed to a single
/// `_`. Names whose general derivation would be ambiguous ("C++" and "C"
/// would both yield `c`) carry explicit overrides.
pub fn slugify(name: &str) -> String {
    match name {
        "C++" => return "cpp".to_string(),
        "C#" => return "csharp".to_string(),
        "Objective-C" => return "objective_c".to_string(),
        _ => {}
    }

    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// The default language set, as `(api_name, display_name)` pairs.
const DEFAULT_LANGUAGES: &[(&str, &str)] = &[
    ("ActionScript", "ActionScript"),
    ("C", "C"),
    ("CSharp", "C#"),
    ("CPP", "C++"),
    ("Clojure", "Clojure"),
    ("CoffeeScript", "CoffeeScript"),
    ("CSS", "CSS"),
    ("Dart", "Dart"),
    ("DM", "DM"),
    ("Elixir", "Elixir"),
    ("Go", "Go"),
    ("Groovy", "Groovy"),
    ("Haskell", "Haskell"),
    ("HTML", "HTML"),
    ("Java", "Java"),
    ("JavaScript", "JavaScript"),
    ("Julia", "Julia"),
    ("Kotlin", "Kotlin"),
    ("Lua", "Lua"),
    ("MATLAB", "MATLAB"),
    ("Objective-C", "Objective-C"),
    ("Perl", "Perl"),
    ("PHP", "PHP"),
    ("PowerShell", "PowerShell"),
    ("Python", "Python"),
    ("R", "R"),
    ("Ruby", "Ruby"),
    ("Rust", "Rust"),
    ("Scala", "Scala"),
    ("Shell", "Shell"),
    ("Swift", "Swift"),
    ("TeX", "TeX"),
    ("TypeScript", "TypeScript"),
    ("Vim-script", "Vim script"),
];

/// Builds the language list from CLI input, falling back to the default set.
///
/// CLI entries use the form `api_name:display_name`; a bare `api_name` is
/// used as its own display name. Rejects lists where two display names
/// collapse to the same slug, since both would write the same output files.
pub fn parse_languages(args: Option<Vec<String>>) -> Result<Vec<Language>, ConfigError> {
    let languages: Vec<Language> = match args {
        Some(list) => list
            .into_iter()
            .map(|entry| match entry.split_once(':') {
                Some((api, display)) => Language::new(api, display),
                None => Language::new(entry.clone(), entry),
            })
            .collect(),
        None => DEFAULT_LANGUAGES
            .iter()
            .map(|(api, display)| Language::new(*api, *display))
            .collect(),
    };

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for lang in &languages {
        if let Some(prev) = seen.insert(lang.slug.as_str(), lang.name.as_str()) {
            return Err(ConfigError::DuplicateSlug(
                prev.to_string(),
                lang.name.clone(),
                lang.slug.clone(),
            ));
        }
    }

    info!("configured {} languages", languages.len());
    Ok(languages)
}

/// Resolves the GitHub access token from a CLI value that may be either a
/// file path or the token itself. clap already falls back to `GITHUB_TOKEN`.
pub fn resolve_token(input: Option<String>) -> Result<String, ConfigError> {
    let raw = input.ok_or(ConfigError::TokenMissing)?;
    let token = if Path::new(&raw).is_file() {
        info!("reading access token from file: {raw}");
        fs::read_to_string(&raw).map_err(|source| ConfigError::TokenRead { path: raw, source })?
    } else {
        raw
    };
    let token = token.trim();
    if token.is_empty() {
        return Err(ConfigError::TokenEmpty);
    }
    Ok(token.to_string())
}
