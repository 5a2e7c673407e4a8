//! Built-in language table.
//!
//! A small extension and filename index used by the in-process classifier.
//! Names follow the spelling the external classifier reports, so records
//! produced by either classifier agree after lower-casing.

use std::collections::HashMap;

lazy_static::lazy_static! {
    static ref EXTENSION_INDEX: HashMap<&'static str, &'static str> = {
        let table: &[(&str, &[&str])] = &[
            ("C", &["c", "h"]),
            ("C#", &["cs", "csx"]),
            ("C++", &["cc", "cpp", "cxx", "c++", "hh", "hpp", "hxx", "h++", "ino"]),
            ("CSS", &["css"]),
            ("Clojure", &["clj", "cljs", "cljc", "edn"]),
            ("CoffeeScript", &["coffee"]),
            ("Dart", &["dart"]),
            ("Elixir", &["ex", "exs"]),
            ("Erlang", &["erl", "hrl"]),
            ("Go", &["go"]),
            ("Groovy", &["groovy", "gradle"]),
            ("HTML", &["html", "htm", "xhtml"]),
            ("Haskell", &["hs", "lhs"]),
            ("JSON", &["json"]),
            ("Java", &["java"]),
            ("JavaScript", &["js", "mjs", "cjs", "jsx"]),
            ("Julia", &["jl"]),
            ("Jupyter Notebook", &["ipynb"]),
            ("Kotlin", &["kt", "kts"]),
            ("Lua", &["lua"]),
            ("Markdown", &["md", "markdown"]),
            ("Objective-C", &["m"]),
            ("OCaml", &["ml", "mli"]),
            ("PHP", &["php", "phtml"]),
            ("Perl", &["pl", "pm"]),
            ("PowerShell", &["ps1", "psm1"]),
            ("Python", &["py", "pyw", "pyi"]),
            ("R", &["r"]),
            ("Ruby", &["rb", "rake", "gemspec"]),
            ("Rust", &["rs"]),
            ("SCSS", &["scss"]),
            ("SQL", &["sql"]),
            ("Scala", &["scala", "sc"]),
            ("Shell", &["sh", "bash", "zsh"]),
            ("Swift", &["swift"]),
            ("TOML", &["toml"]),
            ("TypeScript", &["ts", "tsx"]),
            ("Vue", &["vue"]),
            ("XML", &["xml", "xsd", "xsl"]),
            ("YAML", &["yml", "yaml"]),
        ];

        let mut index = HashMap::new();
        for (language, extensions) in table {
            for extension in extensions.iter() {
                index.insert(*extension, *language);
            }
        }
        index
    };

    static ref FILENAME_INDEX: HashMap<&'static str, &'static str> = {
        [
            ("Makefile", "Makefile"),
            ("GNUmakefile", "Makefile"),
            ("CMakeLists.txt", "CMake"),
            ("Dockerfile", "Dockerfile"),
            ("Rakefile", "Ruby"),
            ("Gemfile", "Ruby"),
            ("Jenkinsfile", "Groovy"),
            ("BUILD.bazel", "Starlark"),
            (".bashrc", "Shell"),
            (".zshrc", "Shell"),
        ]
        .into_iter()
        .collect()
    };
}

/// Look up a language by exact file name (e.g. `Makefile`)
pub fn find_by_filename(file_name: &str) -> Option<&'static str> {
    FILENAME_INDEX.get(file_name).copied()
}

/// Look up a language by extension, without the leading dot, case-insensitively
pub fn find_by_extension(extension: &str) -> Option<&'static str> {
    EXTENSION_INDEX
        .get(extension)
        .or_else(|| EXTENSION_INDEX.get(extension.to_lowercase().as_str()))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_extension() {
        assert_eq!(find_by_extension("rs"), Some("Rust"));
        assert_eq!(find_by_extension("PY"), Some("Python"));
        assert_eq!(find_by_extension("ipynb"), Some("Jupyter Notebook"));
        assert_eq!(find_by_extension("hpp"), Some("C++"));
        assert_eq!(find_by_extension("nope"), None);
    }

    #[test]
    fn test_find_by_filename() {
        assert_eq!(find_by_filename("Makefile"), Some("Makefile"));
        assert_eq!(find_by_filename("Dockerfile"), Some("Dockerfile"));
        assert_eq!(find_by_filename("makefile.bak"), None);
    }
}
